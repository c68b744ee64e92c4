//! Binding drivers to new devices and unbinding them again.

use dt::NodeId;
use log::{debug, warn};
use utils::types::MaybeOwnedStr;

use crate::{
    catalog::{CategoryFlags, Driver},
    debug_ex,
    device::{Device, DeviceId, Phase, StorageKind},
    error::{DmError, DmResult},
    manager::DeviceManager,
    rollback::{Rollback, Undo},
    storage::Slot,
};

impl DeviceManager {
    /// Bind `driver` to a new device under `parent`.
    ///
    /// `config` is a caller-owned configuration block that replaces the driver's own
    /// allocation. On any failure the device is gone and all its storage is released.
    pub fn bind(
        &mut self,
        parent: DeviceId,
        driver: &'static Driver,
        name: impl Into<MaybeOwnedStr>,
        config: Option<&'static mut [u8]>,
        driver_data: usize,
        node: Option<NodeId>,
    ) -> DmResult<DeviceId> {
        self.device(parent)?;
        self.bind_common(Some(parent), driver, name.into(), config, driver_data, node)
    }

    /// Bind a device described only by a static configuration block.
    pub fn bind_static(
        &mut self,
        parent: DeviceId,
        driver: &'static Driver,
        name: impl Into<MaybeOwnedStr>,
        config: &'static mut [u8],
    ) -> DmResult<DeviceId> {
        self.bind(parent, driver, name, Some(config), 0, None)
    }

    /// Bind the catalog driver called `driver_name`.
    pub fn bind_by_driver_name(
        &mut self,
        parent: DeviceId,
        driver_name: &str,
        name: impl Into<MaybeOwnedStr>,
        node: Option<NodeId>,
    ) -> DmResult<DeviceId> {
        let driver = self.catalog.driver(driver_name)?;
        self.bind(parent, driver, name, None, 0, node)
    }

    pub(crate) fn bind_common(
        &mut self,
        parent: Option<DeviceId>,
        driver: &'static Driver,
        name: MaybeOwnedStr,
        config: Option<&'static mut [u8]>,
        driver_data: usize,
        node: Option<NodeId>,
    ) -> DmResult<DeviceId> {
        if name.is_empty() {
            return Err(DmError::InvalidArgument);
        }
        let category = self.catalog.category(driver.category).inspect_err(|_| {
            debug!("Missing category {:?} for driver '{}'", driver.category, driver.name)
        })?;

        let mut tx = Rollback::new(self);
        tx.nodes.try_reserve(1).map_err(|_| DmError::OutOfMemory)?;
        let id = DeviceId::from_index(tx.nodes.len());
        tx.nodes
            .push(Some(Device::new(name, driver, category, parent, driver_data, node)));
        tx.record(Undo::ReleaseNode(id));

        match config {
            Some(block) if tx.config.static_config && block.len() < driver.config_size => {
                // The driver expects more than the embedded block provides.
                tx.allocate_slot(id, StorageKind::Config)?;
                let dev = tx.device_mut(id)?;
                if let Some(dst) = dev.slot_mut(StorageKind::Config).bytes_mut() {
                    dst[..block.len()].copy_from_slice(block);
                }
                dev.config_from_static = true;
            }
            Some(block) => {
                *tx.device_mut(id)?.slot_mut(StorageKind::Config) = Slot::External(block);
            }
            None => tx.allocate_slot(id, StorageKind::Config)?,
        }
        tx.allocate_slot(id, StorageKind::CategoryConfig)?;
        tx.allocate_slot(id, StorageKind::ParentConfig)?;

        let seq = tx.choose_seq(id)?;
        tx.device_mut(id)?.seq = seq;

        if let Some(parent) = parent {
            let parent_dev = tx.device_mut(parent)?;
            parent_dev.children.try_reserve(1).map_err(|_| DmError::OutOfMemory)?;
            parent_dev.children.push(id);
            tx.record(Undo::Unlink(id));
        }

        tx.register_member(category.id, id)?;
        let parent_hooks = |dm: &DeviceManager| {
            parent.and_then(|p| dm.device(p).ok()).map(|p| (p.driver(), p.category()))
        };
        if let Some(hook) = parent_hooks(&*tx).and_then(|(_, cat)| cat.child_post_bind) {
            if let Err(err) = hook(&mut tx, id) {
                tx.unregister_member(category.id, id);
                return Err(err);
            }
        }
        tx.record(Undo::Unregister(id, category.id));

        if let Some(hook) = driver.bind {
            hook(&mut tx, id)?;
        }
        if driver.unbind.is_some() {
            tx.record(Undo::DriverUnbind(id));
        }
        if let Some(hook) = parent_hooks(&*tx).and_then(|(drv, _)| drv.child_post_bind) {
            hook(&mut tx, id)?;
        }
        if let Some(hook) = category.post_bind {
            hook(&mut tx, id)?;
        }

        tx.device_mut(id)?.phase = Phase::Bound;
        tx.commit();
        debug_ex!("Bound {} to driver '{}'", id, driver.name);
        Ok(id)
    }

    /// Pick the sequence number of a device being bound.
    fn choose_seq(&self, id: DeviceId) -> DmResult<Option<u32>> {
        let dev = self.device(id)?;
        let category = dev.category();
        if self.config.seq_alias && category.flags.contains(CategoryFlags::SEQ_ALIAS) {
            let alias = match (self.tree.as_deref(), dev.node()) {
                (Some(tree), Some(node)) => tree.alias_seq(category.name, node),
                _ => None,
            };
            if let Some(seq) = alias {
                if !self.seq_in_use(category.id, seq) {
                    return Ok(Some(seq));
                }
                warn!("Alias {}{} of '{}' already in use", category.name, seq, dev.name());
            }
        }
        if category.flags.contains(CategoryFlags::NO_AUTO_SEQ) {
            return Ok(None);
        }
        self.next_free_seq(category.id).map(Some)
    }

    /// Destroy a device that is not active, together with all of its descendants.
    ///
    /// Children are unbound newest first. Teardown continues past failures and the first
    /// error is reported.
    pub fn unbind(&mut self, id: DeviceId) -> DmResult<()> {
        match self.phase(id) {
            Phase::Active => return Err(DmError::Busy),
            Phase::Unbound | Phase::Removed => return Err(DmError::InvalidArgument),
            _ => {}
        }
        let mut result = Ok(());
        let children = self.device(id)?.children.clone();
        for child in children.into_iter().rev() {
            if let Err(err) = self.unbind(child) {
                warn!("Failed to unbind child {} of {}: {}", child, id, err);
                result = result.and(Err(err));
            }
        }

        let (driver, category) = {
            let dev = self.device(id)?;
            (dev.driver(), dev.category())
        };
        if let Some(hook) = driver.unbind {
            if let Err(err) = hook(self, id) {
                result = result.and(Err(err));
            }
        }
        if let Some(hook) = category.pre_unbind {
            if let Err(err) = hook(self, id) {
                result = result.and(Err(err));
            }
        }

        self.unlink(id);
        self.unregister_member(category.id, id);
        if let Some(mut dev) = self.nodes.get_mut(id.index()).and_then(Option::take) {
            for kind in StorageKind::ALL {
                self.heap.release(dev.slot_mut(kind));
            }
            debug_ex!("Unbound '{}'", dev.name());
        }
        result
    }
}
