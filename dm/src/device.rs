//! Device records kept by the manager

use alloc::vec::Vec;
use utils::{define_handle, types::MaybeOwnedStr};

use crate::{
    catalog::{Category, Driver},
    storage::Slot,
};
use dt::NodeId;

define_handle!(
    /// Stable handle of a device bound in a [crate::manager::DeviceManager].
    DeviceId
);

/// Lifecycle phase of a device. Phases only move forward except that
/// deactivation returns an active device to [Phase::ConfigResolved].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Record exists but binding has not completed.
    Unbound,
    Bound,
    ConfigResolved,
    Active,
    /// Handle refers to a device that has been unbound.
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Config,
    CategoryConfig,
    ParentConfig,
    Private,
    CategoryPrivate,
    ParentPrivate,
}

impl StorageKind {
    pub const ALL: [StorageKind; 6] = [
        StorageKind::Config,
        StorageKind::CategoryConfig,
        StorageKind::ParentConfig,
        StorageKind::Private,
        StorageKind::CategoryPrivate,
        StorageKind::ParentPrivate,
    ];
    /// Allocated at bind time.
    pub const CONFIG: [StorageKind; 3] = [
        StorageKind::Config,
        StorageKind::CategoryConfig,
        StorageKind::ParentConfig,
    ];
    /// Allocated on first need during resolution or activation, released on deactivation.
    pub const PRIVATE: [StorageKind; 3] = [
        StorageKind::Private,
        StorageKind::CategoryPrivate,
        StorageKind::ParentPrivate,
    ];

    pub(crate) const fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug)]
pub struct Device {
    pub(crate) name: MaybeOwnedStr,
    pub(crate) driver: &'static Driver,
    pub(crate) category: &'static Category,
    pub(crate) parent: Option<DeviceId>,
    pub(crate) children: Vec<DeviceId>,
    pub(crate) seq: Option<u32>,
    pub(crate) driver_data: usize,
    pub(crate) node: Option<NodeId>,
    pub(crate) phase: Phase,
    pub(crate) dma_offset: u64,
    /// Config was copied out of an undersized static block into owned storage.
    pub(crate) config_from_static: bool,
    pub(crate) slots: [Slot; 6],
}

impl Device {
    pub(crate) fn new(
        name: MaybeOwnedStr,
        driver: &'static Driver,
        category: &'static Category,
        parent: Option<DeviceId>,
        driver_data: usize,
        node: Option<NodeId>,
    ) -> Device {
        Device {
            name,
            driver,
            category,
            parent,
            children: Vec::new(),
            seq: None,
            driver_data,
            node,
            phase: Phase::Unbound,
            dma_offset: 0,
            config_from_static: false,
            slots: core::array::from_fn(|_| Slot::Unallocated),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver(&self) -> &'static Driver {
        self.driver
    }

    pub fn category(&self) -> &'static Category {
        self.category
    }

    pub fn parent(&self) -> Option<DeviceId> {
        self.parent
    }

    /// Children in bind order.
    pub fn children(&self) -> &[DeviceId] {
        &self.children
    }

    pub fn seq(&self) -> Option<u32> {
        self.seq
    }

    pub fn driver_data(&self) -> usize {
        self.driver_data
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Offset between CPU and bus addresses for DMA, set on activation.
    pub fn dma_offset(&self) -> u64 {
        self.dma_offset
    }

    pub fn config_from_static(&self) -> bool {
        self.config_from_static
    }

    pub fn slot(&self, kind: StorageKind) -> &Slot {
        &self.slots[kind.slot()]
    }

    pub(crate) fn slot_mut(&mut self, kind: StorageKind) -> &mut Slot {
        &mut self.slots[kind.slot()]
    }
}
