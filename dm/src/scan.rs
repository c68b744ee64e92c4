//! Binding devices from the hardware topology.

use alloc::boxed::Box;
use dt::NodeId;
use log::{debug, warn};

use crate::{
    catalog::DriverFlags,
    device::DeviceId,
    error::{DmError, DmResult},
    manager::DeviceManager,
};

impl DeviceManager {
    /// Bind the first catalog driver matching `node` under `parent`.
    ///
    /// Returns `None` for disabled nodes, nodes no driver accepts, and in pre-relocation mode
    /// for drivers not usable that early.
    pub fn bind_node(&mut self, parent: DeviceId, node: NodeId) -> DmResult<Option<DeviceId>> {
        let tree = self.tree.clone().ok_or(DmError::InvalidArgument)?;
        let Some(info) = tree.node(node) else {
            return Err(DmError::InvalidArgument);
        };
        if !tree.is_enabled(node) {
            debug!("Node {} disabled, skipped", info.full_name);
            return Ok(None);
        }
        for compatible in tree.compatible(node) {
            let Some((driver, of_match)) = self.catalog.match_compatible(compatible) else {
                continue;
            };
            if self.config.pre_reloc_only
                && !driver.flags.contains(DriverFlags::PRE_RELOC)
                && !tree.has_property(node, "bootph-all")
                && !tree.has_property(node, "bootph-pre-ram")
            {
                debug!("Node {} only bound after relocation", info.full_name);
                return Ok(None);
            }
            let name: Box<str> = info.full_name.clone();
            let id = self
                .bind(parent, driver, name, None, of_match.data, Some(node))
                .inspect_err(|err| warn!("Binding {} to '{}' failed: {}", info.full_name, driver.name, err))?;
            return Ok(Some(id));
        }
        debug!("No driver for node {}", info.full_name);
        Ok(None)
    }

    /// Bind every subnode of `parent`'s topology node. Continues past failures and
    /// returns the first one.
    pub fn scan_children(&mut self, parent: DeviceId) -> DmResult<()> {
        let Some(node) = self.device(parent)?.node() else {
            return Ok(());
        };
        let tree = self.tree.clone().ok_or(DmError::InvalidArgument)?;
        let mut result = Ok(());
        for child in tree.get_children(node) {
            if let Err(err) = self.bind_node(parent, child) {
                result = result.and(Err(err));
            }
        }
        result
    }

    /// Bind the whole topology below the root, then activate the devices that ask for it.
    pub fn scan_tree(&mut self) -> DmResult<()> {
        let mut result = self.scan_children(self.root());
        let eager: alloc::vec::Vec<DeviceId> = self
            .devices()
            .filter(|(_, d)| d.driver().flags.contains(DriverFlags::ACTIVATE_AFTER_BIND))
            .map(|(id, _)| id)
            .collect();
        for id in eager {
            if let Err(err) = self.activate(id) {
                warn!("Eager activation of {} failed: {}", id, err);
                result = result.and(Err(err));
            }
        }
        result
    }
}
