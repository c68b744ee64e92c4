//! Lookups over the device tree.
//!
//! `find_*` never changes a device's phase. `get_*` finds and then activates, so the caller
//! either receives an active device or an error.

use dt::NodeId;

use crate::{
    catalog::CategoryId,
    device::{Device, DeviceId},
    error::{DmError, DmResult},
    manager::DeviceManager,
};

impl DeviceManager {
    pub fn children(&self, parent: DeviceId) -> DmResult<&[DeviceId]> {
        Ok(self.device(parent)?.children())
    }

    pub fn first_child(&self, parent: DeviceId) -> DmResult<Option<DeviceId>> {
        Ok(self.children(parent)?.first().copied())
    }

    /// The sibling bound right after `id`, if any.
    pub fn next_sibling(&self, id: DeviceId) -> DmResult<Option<DeviceId>> {
        let Some(parent) = self.device(id)?.parent() else {
            return Ok(None);
        };
        let siblings = self.children(parent)?;
        Ok(siblings
            .iter()
            .position(|c| *c == id)
            .and_then(|pos| siblings.get(pos + 1))
            .copied())
    }

    pub fn child_count(&self, parent: DeviceId) -> DmResult<usize> {
        Ok(self.children(parent)?.len())
    }

    pub fn has_children(&self, parent: DeviceId) -> DmResult<bool> {
        Ok(!self.children(parent)?.is_empty())
    }

    pub fn has_active_children(&self, parent: DeviceId) -> DmResult<bool> {
        Ok(self.children(parent)?.iter().any(|c| self.is_active(*c)))
    }

    pub fn is_last_sibling(&self, id: DeviceId) -> DmResult<bool> {
        Ok(self.next_sibling(id)?.is_none())
    }

    fn find_child_by(
        &self,
        parent: DeviceId,
        pred: impl Fn(&Device) -> bool,
    ) -> DmResult<DeviceId> {
        self.children(parent)?
            .iter()
            .copied()
            .find(|c| self.device(*c).is_ok_and(&pred))
            .ok_or(DmError::NotFound)
    }

    pub fn find_child_by_index(&self, parent: DeviceId, index: usize) -> DmResult<DeviceId> {
        self.children(parent)?
            .get(index)
            .copied()
            .ok_or(DmError::NotFound)
    }

    pub fn get_child_by_index(&mut self, parent: DeviceId, index: usize) -> DmResult<DeviceId> {
        let child = self.find_child_by_index(parent, index)?;
        self.activate(child)?;
        Ok(child)
    }

    pub fn find_child_by_seq(&self, parent: DeviceId, seq: u32) -> DmResult<DeviceId> {
        self.find_child_by(parent, |d| d.seq() == Some(seq))
    }

    pub fn get_child_by_seq(&mut self, parent: DeviceId, seq: u32) -> DmResult<DeviceId> {
        let child = self.find_child_by_seq(parent, seq)?;
        self.activate(child)?;
        Ok(child)
    }

    pub fn find_child_by_name(&self, parent: DeviceId, name: &str) -> DmResult<DeviceId> {
        self.find_child_by(parent, |d| d.name() == name)
    }

    pub fn get_child_by_name(&mut self, parent: DeviceId, name: &str) -> DmResult<DeviceId> {
        let child = self.find_child_by_name(parent, name)?;
        self.activate(child)?;
        Ok(child)
    }

    pub fn find_child_by_node(&self, parent: DeviceId, node: NodeId) -> DmResult<DeviceId> {
        self.find_child_by(parent, |d| d.node() == Some(node))
    }

    pub fn get_child_by_node(&mut self, parent: DeviceId, node: NodeId) -> DmResult<DeviceId> {
        let child = self.find_child_by_node(parent, node)?;
        self.activate(child)?;
        Ok(child)
    }

    /// Child bound to the topology node at raw arena `offset`.
    pub fn find_child_by_offset(&self, parent: DeviceId, offset: usize) -> DmResult<DeviceId> {
        self.find_child_by_node(parent, NodeId::from_index(offset))
    }

    pub fn get_child_by_offset(&mut self, parent: DeviceId, offset: usize) -> DmResult<DeviceId> {
        self.get_child_by_node(parent, NodeId::from_index(offset))
    }

    /// Depth-first search of the whole tree for the device bound to `node`.
    pub fn find_global_by_node(&self, node: NodeId) -> DmResult<DeviceId> {
        let mut stack = alloc::vec![self.root()];
        while let Some(id) = stack.pop() {
            let dev = self.device(id)?;
            if dev.node() == Some(node) {
                return Ok(id);
            }
            stack.extend(dev.children().iter().rev());
        }
        Err(DmError::NotFound)
    }

    pub fn get_global_by_node(&mut self, node: NodeId) -> DmResult<DeviceId> {
        let dev = self.find_global_by_node(node)?;
        self.activate(dev)?;
        Ok(dev)
    }

    pub fn find_first_child_by_category(
        &self,
        parent: DeviceId,
        category: CategoryId,
    ) -> DmResult<DeviceId> {
        self.find_child_by(parent, |d| d.category().id == category)
    }

    pub fn find_first_inactive_child(&self, parent: DeviceId) -> DmResult<DeviceId> {
        self.find_child_by(parent, |d| !d.is_active())
    }

    /// Member of `category` numbered `seq`.
    pub fn find_device_by_seq(&self, category: CategoryId, seq: u32) -> DmResult<DeviceId> {
        self.category_devices(category)
            .iter()
            .copied()
            .find(|id| self.device(*id).is_ok_and(|d| d.seq() == Some(seq)))
            .ok_or(DmError::NotFound)
    }

    pub fn get_device_by_seq(&mut self, category: CategoryId, seq: u32) -> DmResult<DeviceId> {
        let dev = self.find_device_by_seq(category, seq)?;
        self.activate(dev)?;
        Ok(dev)
    }
}
