//! Undo log for multi-step lifecycle operations.
//!
//! Operations record the inverse of each completed step. Dropping the guard without
//! [Rollback::commit] replays the inverses newest first, restoring the state the
//! operation started from.

use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};
use log::warn;

use crate::{
    catalog::CategoryId,
    device::{DeviceId, Phase, StorageKind},
    lifecycle::{RemoveFlags, RemoveMode},
    manager::DeviceManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Undo {
    /// Drop a partially bound device record.
    ReleaseNode(DeviceId),
    FreeStorage(DeviceId, StorageKind),
    /// Detach the device from its parent's child list.
    Unlink(DeviceId),
    /// Remove the device from its category's member list.
    Unregister(DeviceId, CategoryId),
    /// Run the driver's unbind hook.
    DriverUnbind(DeviceId),
    /// Return a device marked resolved to the bound phase.
    ClearResolution(DeviceId),
    /// Return a device marked active to the resolved phase.
    ClearActivation(DeviceId),
    /// Run the full deactivation path for a device whose driver activated it.
    Deactivate(DeviceId),
}

pub(crate) struct Rollback<'a> {
    dm: &'a mut DeviceManager,
    steps: Vec<Undo>,
}

impl<'a> Rollback<'a> {
    pub fn new(dm: &'a mut DeviceManager) -> Self {
        Rollback { dm, steps: Vec::new() }
    }

    pub fn record(&mut self, undo: Undo) {
        self.steps.push(undo);
    }

    /// Keep every step done so far.
    pub fn commit(mut self) {
        self.steps.clear();
    }
}

impl Deref for Rollback<'_> {
    type Target = DeviceManager;

    fn deref(&self) -> &Self::Target {
        self.dm
    }
}

impl DerefMut for Rollback<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dm
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        while let Some(step) = self.steps.pop() {
            self.dm.undo(step);
        }
    }
}

impl DeviceManager {
    fn undo(&mut self, step: Undo) {
        match step {
            Undo::ReleaseNode(id) => {
                // Devices a bind hook created below this one go first.
                let children = self.device(id).map(|d| d.children.clone()).unwrap_or_default();
                for child in children.into_iter().rev() {
                    if let Err(err) = self.unbind(child) {
                        warn!("Unbind of {} failed during rollback: {}", child, err);
                    }
                }
                if let Some(slot) = self.nodes.get_mut(id.index()) {
                    if let Some(mut dev) = slot.take() {
                        for kind in StorageKind::ALL {
                            self.heap.release(dev.slot_mut(kind));
                        }
                    }
                }
            }
            Undo::FreeStorage(id, kind) => {
                if let Some(dev) = self.nodes.get_mut(id.index()).and_then(Option::as_mut) {
                    self.heap.release(dev.slot_mut(kind));
                }
            }
            Undo::Unlink(id) => self.unlink(id),
            Undo::Unregister(id, category) => self.unregister_member(category, id),
            Undo::DriverUnbind(id) => {
                let Ok(dev) = self.device(id) else { return };
                if let Some(unbind) = dev.driver().unbind {
                    if let Err(err) = unbind(self, id) {
                        warn!("Unbind of {} failed during rollback: {}", id, err);
                    }
                }
            }
            Undo::ClearResolution(id) => {
                if let Some(dev) = self.nodes.get_mut(id.index()).and_then(Option::as_mut) {
                    if dev.phase == Phase::ConfigResolved {
                        dev.phase = Phase::Bound;
                    }
                }
            }
            Undo::ClearActivation(id) => {
                // Children activated by a failed activation hook go down with their parent.
                self.force_children_down(id);
                if let Some(dev) = self.nodes.get_mut(id.index()).and_then(Option::as_mut) {
                    if dev.phase == Phase::Active {
                        dev.phase = Phase::ConfigResolved;
                    }
                    for kind in StorageKind::PRIVATE {
                        self.heap.release(dev.slot_mut(kind));
                    }
                }
            }
            Undo::Deactivate(id) => self.force_down(id),
        }
    }

    /// Take `id` and its subtree down, running every hook but ignoring their failures.
    fn force_down(&mut self, id: DeviceId) {
        self.force_children_down(id);
        if let Err(err) = self.remove_one(id, RemoveMode::Forced) {
            warn!("Deactivation of {} failed during rollback: {}", id, err);
        }
    }

    fn force_children_down(&mut self, id: DeviceId) {
        let children = self.device(id).map(|d| d.children.clone()).unwrap_or_default();
        for child in children.into_iter().rev() {
            if let Err(err) = self.deactivate(child, RemoveFlags::NORMAL) {
                warn!("Deactivation of {} failed during rollback: {}", child, err);
                self.force_down(child);
            }
        }
    }
}
