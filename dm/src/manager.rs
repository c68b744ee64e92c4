//! The device manager: owner of every device record, the storage heap and the topology.

use alloc::{collections::btree_map::BTreeMap, sync::Arc, vec::Vec};
use dt::DeviceTree;
use log::info;

use crate::{
    builtin::ROOT_DRIVER,
    catalog::{Catalog, CategoryFlags, CategoryId},
    config::DmConfig,
    device::{Device, DeviceId, Phase, StorageKind},
    error::{DmError, DmResult},
    platform::Platform,
    storage::{AllocStats, StorageAllocator},
};

pub struct DeviceManager {
    pub(crate) catalog: &'static Catalog,
    pub(crate) platform: Arc<dyn Platform>,
    pub(crate) tree: Option<Arc<DeviceTree>>,
    pub(crate) config: DmConfig,
    pub(crate) heap: StorageAllocator,
    /// Device arena. Unbound devices leave a `None` behind so stale handles never alias.
    pub(crate) nodes: Vec<Option<Device>>,
    /// Category members in bind order.
    pub(crate) members: BTreeMap<CategoryId, Vec<DeviceId>>,
    root: DeviceId,
}

impl core::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("config", &self.config)
            .field("heap", &self.heap)
            .field("devices", &self.devices().count())
            .finish_non_exhaustive()
    }
}

impl DeviceManager {
    /// Create a manager and bring up its root device.
    ///
    /// The root binds [ROOT_DRIVER] to the topology root when a tree is given, so the
    /// catalog must contain the root category (see [crate::catalog::CatalogBuilder::with_builtins]).
    pub fn new(
        catalog: &'static Catalog,
        platform: Arc<dyn Platform>,
        tree: Option<Arc<DeviceTree>>,
        heap: StorageAllocator,
        config: DmConfig,
    ) -> DmResult<DeviceManager> {
        if !config.is_valid() || heap.dma_align() != config.dma_align {
            return Err(DmError::InvalidArgument);
        }
        let mut dm = DeviceManager {
            catalog,
            platform,
            tree,
            config,
            heap,
            nodes: Vec::new(),
            members: BTreeMap::new(),
            root: DeviceId::from_index(0),
        };
        let root_node = dm.tree.as_ref().map(|t| t.root());
        dm.root = dm.bind_common(None, &ROOT_DRIVER, "root_driver".into(), None, 0, root_node)?;
        dm.activate(dm.root)?;
        info!("Device model ready");
        Ok(dm)
    }

    /// Deactivate and unbind every device, consuming the manager.
    pub fn uninit(mut self) -> DmResult<()> {
        let root = self.root;
        self.deactivate(root, crate::lifecycle::RemoveFlags::NORMAL)?;
        self.unbind(root)?;
        info!("Device model shut down");
        Ok(())
    }

    pub fn root(&self) -> DeviceId {
        self.root
    }

    pub fn config(&self) -> &DmConfig {
        &self.config
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    pub fn topology(&self) -> Option<&DeviceTree> {
        self.tree.as_deref()
    }

    pub fn stats(&self) -> AllocStats {
        self.heap.stats()
    }

    pub fn device(&self, id: DeviceId) -> DmResult<&Device> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(DmError::InvalidArgument)
    }

    pub(crate) fn device_mut(&mut self, id: DeviceId) -> DmResult<&mut Device> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(DmError::InvalidArgument)
    }

    /// Phase of `id`, [Phase::Removed] once it has been unbound.
    pub fn phase(&self, id: DeviceId) -> Phase {
        self.device(id).map_or(Phase::Removed, Device::phase)
    }

    pub fn is_active(&self, id: DeviceId) -> bool {
        self.phase(id) == Phase::Active
    }

    pub fn storage(&self, id: DeviceId, kind: StorageKind) -> DmResult<&[u8]> {
        self.device(id)?.slot(kind).bytes().ok_or(DmError::NotFound)
    }

    pub fn storage_mut(&mut self, id: DeviceId, kind: StorageKind) -> DmResult<&mut [u8]> {
        self.device_mut(id)?
            .slot_mut(kind)
            .bytes_mut()
            .ok_or(DmError::NotFound)
    }

    /// Live devices in bind order.
    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &Device)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.as_ref().map(|d| (DeviceId::from_index(i), d)))
    }

    /// Members of `category` in bind order.
    pub fn category_devices(&self, category: CategoryId) -> &[DeviceId] {
        self.members.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Lowest sequence number above both the highest alias of the category and every
    /// number already taken.
    pub(crate) fn next_free_seq(&self, category: CategoryId) -> DmResult<u32> {
        let cat = self.catalog.category(category)?;
        let mut next = match (self.config.seq_alias, self.tree.as_deref()) {
            (true, Some(tree))
                if cat.flags.contains(CategoryFlags::SEQ_ALIAS) && !cat.name.is_empty() =>
            {
                tree.alias_highest_id(cat.name).map_or(0, |id| id + 1)
            }
            _ => 0,
        };
        for id in self.category_devices(category) {
            if let Some(seq) = self.device(*id)?.seq() {
                next = next.max(seq + 1);
            }
        }
        Ok(next)
    }

    pub(crate) fn seq_in_use(&self, category: CategoryId, seq: u32) -> bool {
        self.category_devices(category)
            .iter()
            .any(|id| self.device(*id).is_ok_and(|d| d.seq() == Some(seq)))
    }

    pub(crate) fn register_member(&mut self, category: CategoryId, id: DeviceId) -> DmResult<()> {
        let list = self.members.entry(category).or_default();
        list.try_reserve(1).map_err(|_| DmError::OutOfMemory)?;
        list.push(id);
        Ok(())
    }

    pub(crate) fn unregister_member(&mut self, category: CategoryId, id: DeviceId) {
        if let Some(list) = self.members.get_mut(&category) {
            list.retain(|m| *m != id);
        }
    }

    /// Detach `id` from its parent's child list.
    pub(crate) fn unlink(&mut self, id: DeviceId) {
        let Some(parent) = self.device(id).ok().and_then(Device::parent) else {
            return;
        };
        if let Ok(parent) = self.device_mut(parent) {
            parent.children.retain(|c| *c != id);
        }
    }
}
