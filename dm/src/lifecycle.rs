//! Phase transitions of bound devices: configuration, activation and deactivation.
//!
//! Forward transitions are idempotent and always bring the parent up first. Each forward step
//! that fails is rolled back through [Rollback], leaving the device in the phase it started in.

use bitflags::bitflags;
use log::{debug, warn};

use crate::{
    catalog::{CategoryId, DriverFlags},
    debug_ex,
    device::{DeviceId, Phase, StorageKind},
    error::{DmError, DmResult},
    manager::DeviceManager,
    rollback::{Rollback, Undo},
};

bitflags! {
    pub struct RemoveFlags: u32 {
        /// Remove every device.
        const NORMAL = 1 << 0;
        /// Remove devices whose driver has DMA in flight.
        const ACTIVE_DMA = 1 << 1;
        /// Remove devices that must be quiesced before OS handoff.
        const OS_PREPARE = 1 << 2;
        /// Leave `VITAL` devices active.
        const NON_VITAL = 1 << 3;
    }
}

/// Outcome of [DeviceManager::deactivate].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// The device, or one of its descendants, did not qualify and stays active.
    Kept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoveMode {
    /// Stop at the first failing hook.
    Strict,
    /// Run every step regardless of hook failures.
    Forced,
}

/// Whether a forward transition to `target` still has to run.
fn pending(phase: Phase, target: Phase) -> DmResult<bool> {
    match phase {
        Phase::Unbound | Phase::Removed => Err(DmError::InvalidArgument),
        phase => Ok(phase < target),
    }
}

impl DeviceManager {
    /// Bring the configuration of `id` and all its ancestors up to date.
    pub fn resolve_configuration(&mut self, id: DeviceId) -> DmResult<()> {
        if !pending(self.phase(id), Phase::ConfigResolved)? {
            return Ok(());
        }
        if let Some(parent) = self.device(id)?.parent() {
            self.resolve_configuration(parent)?;
            // Resolving the parent may have resolved us.
            if !pending(self.phase(id), Phase::ConfigResolved)? {
                return Ok(());
            }
        }

        let mut tx = Rollback::new(self);
        tx.allocate_private(id)?;
        // Marked first so that the hook may resolve descendants re-entrantly.
        tx.device_mut(id)?.phase = Phase::ConfigResolved;
        tx.record(Undo::ClearResolution(id));
        let dev = tx.device(id)?;
        if let Some(hook) = dev.driver().resolve_config {
            if tx.config.static_config || dev.node().is_some() {
                hook(&mut tx, id)?;
            }
        }
        tx.commit();
        Ok(())
    }

    /// Activate `id`, activating its ancestors first.
    ///
    /// The device is marked active before any hook runs, so hooks that re-enter activation of
    /// the same device see it as already active.
    pub fn activate(&mut self, id: DeviceId) -> DmResult<()> {
        if !pending(self.phase(id), Phase::Active)? {
            return Ok(());
        }
        if let Some(parent) = self.device(id)?.parent() {
            self.activate(parent)?;
            if !pending(self.phase(id), Phase::Active)? {
                return Ok(());
            }
        }
        self.resolve_configuration(id)?;
        if !pending(self.phase(id), Phase::Active)? {
            return Ok(());
        }

        let platform = self.platform.clone();
        let mut tx = Rollback::new(self);
        tx.allocate_private(id)?;
        tx.device_mut(id)?.phase = Phase::Active;
        tx.record(Undo::ClearActivation(id));

        let dev = tx.device(id)?;
        let (driver, category, parent, node) = (dev.driver(), dev.category(), dev.parent(), dev.node());
        let is_pinctrl = category.id == CategoryId::Pinctrl;

        if parent.is_some() && !is_pinctrl {
            if let Err(err) = platform.select_pin_state(&mut tx, id, "default") {
                debug!("Default pin state of {} not applied: {}", id, err);
            }
        }
        if parent.is_some()
            && category.id != CategoryId::PowerDomain
            && !driver.flags.contains(DriverFlags::SKIP_POWER_DOMAIN)
        {
            platform.power_domain_on(&mut tx, id)?;
        }

        let dma_offset = match (tx.tree.as_deref(), node) {
            (Some(tree), Some(node)) => match tree.dma_range(node) {
                Ok(Some(window)) => window.cpu.wrapping_sub(window.bus),
                Ok(None) => 0,
                Err(err) => {
                    debug!("No DMA translation for {}: {}", id, err);
                    0
                }
            },
            _ => 0,
        };
        tx.device_mut(id)?.dma_offset = dma_offset;

        if let Some(hook) = category.pre_activate {
            hook(&mut tx, id)?;
        }
        if let Some(parent) = parent {
            let parent_dev = tx.device(parent)?;
            let (drv_hook, cat_hook) = (
                parent_dev.driver().child_pre_activate,
                parent_dev.category().child_pre_activate,
            );
            if let Some(hook) = cat_hook {
                hook(&mut tx, id)?;
            }
            if let Some(hook) = drv_hook {
                hook(&mut tx, id)?;
            }
        }
        if node.is_some() {
            platform.apply_clock_defaults(&mut tx, id)?;
        }

        if let Some(hook) = driver.activate {
            hook(&mut tx, id)?;
        }
        tx.record(Undo::Deactivate(id));

        if let Some(hook) = category.post_activate {
            hook(&mut tx, id)?;
        }
        if is_pinctrl {
            if let Err(err) = platform.select_pin_state(&mut tx, id, "default") {
                debug!("Pin controller {} did not apply its own state: {}", id, err);
            }
        }
        tx.commit();
        debug_ex!("Activated {} ({})", id, driver.name);
        Ok(())
    }

    /// Deactivate `id` and its descendants as selected by `flags`.
    ///
    /// Children go first, newest first. A device is kept active when it does not qualify for
    /// removal under `flags` or when any child was kept.
    pub fn deactivate(&mut self, id: DeviceId, flags: RemoveFlags) -> DmResult<Removal> {
        let dev = self.device(id)?;
        if !dev.is_active() {
            return Ok(Removal::Removed);
        }
        let children = dev.children.clone();
        let driver_flags = dev.driver().flags;

        let mut outcome = Removal::Removed;
        for child in children.into_iter().rev() {
            if self.deactivate(child, flags)? == Removal::Kept {
                outcome = Removal::Kept;
            }
        }
        if outcome == Removal::Kept || !qualifies(flags, driver_flags) {
            return Ok(Removal::Kept);
        }
        self.remove_one(id, RemoveMode::Strict)?;
        Ok(Removal::Removed)
    }

    /// Deactivate every device below the root, as done before handing over to an OS.
    pub fn deactivate_all(&mut self, flags: RemoveFlags) -> DmResult<Removal> {
        let mut outcome = Removal::Removed;
        let children = self.device(self.root())?.children.clone();
        for child in children.into_iter().rev() {
            if self.deactivate(child, flags)? == Removal::Kept {
                outcome = Removal::Kept;
            }
        }
        Ok(outcome)
    }

    /// Deactivate a single device whose children are already inactive.
    pub(crate) fn remove_one(&mut self, id: DeviceId, mode: RemoveMode) -> DmResult<()> {
        let dev = self.device(id)?;
        if !dev.is_active() {
            return Ok(());
        }
        let (driver, category, parent) = (dev.driver(), dev.category(), dev.parent());

        if let Some(hook) = category.pre_deactivate {
            match hook(self, id) {
                Err(err) if mode == RemoveMode::Strict => return Err(err),
                Err(err) => warn!("Category pre-deactivate of {} failed: {}", id, err),
                Ok(()) => {}
            }
        }
        if let Some(hook) = driver.deactivate {
            match hook(self, id) {
                Err(err) if mode == RemoveMode::Strict => {
                    // The device stays active, so the category gets it back.
                    let undo = category.pre_deactivate.and(category.post_activate);
                    if let Some(post) = undo {
                        if let Err(err) = post(self, id) {
                            warn!("Category post-activate of {} failed: {}", id, err);
                        }
                    }
                    return Err(err);
                }
                Err(err) => warn!("Deactivate hook of {} failed: {}", id, err),
                Ok(()) => {}
            }
        }
        if let Some(hook) = parent
            .and_then(|p| self.device(p).ok())
            .and_then(|p| p.driver().child_post_deactivate)
        {
            if let Err(err) = hook(self, id) {
                warn!("Parent of {} failed post-deactivate: {}", id, err);
            }
        }
        if parent.is_some()
            && category.id != CategoryId::PowerDomain
            && !driver.flags.contains(DriverFlags::SKIP_POWER_DOMAIN)
        {
            let platform = self.platform.clone();
            if let Err(err) = platform.power_domain_off(self, id) {
                warn!("Power domain of {} not switched off: {}", id, err);
            }
        }

        let dev = self
            .nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(DmError::InvalidArgument)?;
        dev.phase = Phase::ConfigResolved;
        dev.dma_offset = 0;
        for kind in StorageKind::PRIVATE {
            self.heap.release(dev.slot_mut(kind));
        }
        debug_ex!("Deactivated {} ({})", id, driver.name);
        Ok(())
    }
}

fn qualifies(flags: RemoveFlags, driver_flags: DriverFlags) -> bool {
    if flags.contains(RemoveFlags::NON_VITAL) && driver_flags.contains(DriverFlags::VITAL) {
        return false;
    }
    flags.contains(RemoveFlags::NORMAL)
        || (flags.contains(RemoveFlags::ACTIVE_DMA) && driver_flags.contains(DriverFlags::ACTIVE_DMA))
        || (flags.contains(RemoveFlags::OS_PREPARE) && driver_flags.contains(DriverFlags::OS_PREPARE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::Driver, config::DmConfig, testing::*};
    use alloc::{format, vec};

    fn bus_with_device(dm: &mut DeviceManager) -> (DeviceId, DeviceId) {
        let bus = dm.bind(dm.root(), &TEST_BUS_DRIVER, "bus", None, 0, None).unwrap();
        let dev = dm.bind(bus, &TEST_DRIVER, "dev", None, 0, None).unwrap();
        (bus, dev)
    }

    #[test]
    fn activation_runs_parent_first_in_order() {
        let (mut dm, _platform) = manager();
        let (bus, dev) = bus_with_device(&mut dm);
        reset();
        dm.activate(dev).unwrap();
        assert_eq!(
            trace(),
            vec![
                "pins_default:bus",
                "power_on:bus",
                "activate:bus",
                "pins_default:dev",
                "power_on:dev",
                "pre_activate:dev",
                "cat_child_pre_activate:dev",
                "child_pre_activate:dev",
                "activate:dev",
                "post_activate:dev",
            ]
        );
        assert!(dm.is_active(bus) && dm.is_active(dev));
        assert_eq!(dm.storage(dev, StorageKind::Private).unwrap().len(), 64);
        assert_eq!(dm.storage(dev, StorageKind::ParentPrivate).unwrap().len(), 16);
    }

    #[test]
    fn activation_is_idempotent() {
        let (mut dm, _platform) = manager();
        let (bus, dev) = bus_with_device(&mut dm);
        dm.activate(dev).unwrap();
        dm.activate(dev).unwrap();
        dm.activate(bus).unwrap();
        assert_eq!(count("activate:dev"), 1);
        assert_eq!(count("activate:bus"), 1);
    }

    fn check_private(dm: &mut DeviceManager, id: DeviceId) -> DmResult<()> {
        let len = dm.storage(id, StorageKind::Private)?.len();
        let zeroed = dm.storage(id, StorageKind::Private)?.iter().all(|b| *b == 0);
        rec(dm, id, &format!("activate_{}_{}", len, zeroed))
    }

    static CHECKING_PHY: Driver = Driver {
        name: "checking_phy",
        category: CategoryId::Misc,
        activate: Some(check_private),
        private_size: 64,
        ..Driver::EMPTY
    };

    #[test]
    fn child_activation_brings_up_unresolved_parent() {
        let (mut dm, _platform) = manager();
        let bus = dm.bind(dm.root(), &PLAIN_BUS_DRIVER, "bus@0", None, 0, None).unwrap();
        let phy = dm.bind(bus, &CHECKING_PHY, "phy@0", None, 0, None).unwrap();
        assert_eq!(dm.phase(bus), Phase::Bound);
        let before = dm.stats();

        dm.activate(phy).unwrap();

        assert_eq!(events("activate"), vec!["activate:bus@0", "activate_64_true:phy@0"]);
        let after = dm.stats();
        assert_eq!(after.live_blocks, before.live_blocks + 1);
        assert_eq!(after.live_dma_blocks, 0);
        assert_eq!(after.user_bytes, before.user_bytes + 64);
        assert!(dm.is_active(bus) && dm.is_active(phy));
    }

    #[test]
    fn failure_after_driver_activate_deactivates_once() {
        let (mut dm, _platform) = manager();
        let (bus, dev) = bus_with_device(&mut dm);
        let before = dm.stats();
        fail("post_activate:dev");

        assert_eq!(dm.activate(dev), Err(INJECTED));

        assert_eq!(count("activate:dev"), 1);
        assert_eq!(count("deactivate:dev"), 1);
        assert_eq!(count("power_off:dev"), 1);
        assert!(!dm.is_active(dev));
        assert_eq!(dm.phase(dev), Phase::ConfigResolved);
        assert_eq!(dm.storage(dev, StorageKind::Private), Err(DmError::NotFound));
        assert_eq!(dm.stats().live_blocks, before.live_blocks);
        // Only the failing subtree is affected.
        assert!(dm.is_active(bus));
    }

    #[test]
    fn failure_in_driver_activate_skips_deactivate() {
        let (mut dm, _platform) = manager();
        let (bus, dev) = bus_with_device(&mut dm);
        let before = dm.stats();
        fail("activate:dev");

        assert_eq!(dm.activate(dev), Err(INJECTED));

        assert_eq!(count("deactivate:dev"), 0);
        assert_eq!(count("post_activate:dev"), 0);
        assert_eq!(dm.phase(dev), Phase::ConfigResolved);
        assert_eq!(dm.stats().live_blocks, before.live_blocks);
        assert!(dm.is_active(bus));

        reset();
        dm.activate(dev).unwrap();
        assert!(dm.is_active(dev));
    }

    #[test]
    fn power_domain_failure_aborts_but_pin_failure_does_not() {
        let (mut dm, _platform) = manager();
        let (_bus, dev) = bus_with_device(&mut dm);
        fail("power_on:dev");
        assert_eq!(dm.activate(dev), Err(INJECTED));
        assert_eq!(count("activate:dev"), 0);

        reset();
        fail("pins_default:dev");
        dm.activate(dev).unwrap();
        assert!(dm.is_active(dev));
    }

    #[test]
    fn pin_controllers_configure_themselves_last() {
        let (mut dm, _platform) = manager();
        let pc = dm.bind(dm.root(), &PINCTRL_DRIVER, "pc", None, 0, None).unwrap();
        let pd = dm.bind(dm.root(), &POWER_DRIVER, "pd", None, 0, None).unwrap();
        let quiet = dm.bind(dm.root(), &QUIET_DRIVER, "quiet", None, 0, None).unwrap();
        reset();
        dm.activate(pc).unwrap();
        assert_eq!(trace(), vec!["power_on:pc", "activate:pc", "pins_default:pc"]);

        reset();
        dm.activate(pd).unwrap();
        dm.activate(quiet).unwrap();
        assert_eq!(trace(), vec!["pins_default:pd", "pins_default:quiet"]);
    }

    #[test]
    fn self_enumerating_bus_does_not_repeat_work() {
        let platform = alloc::sync::Arc::new(RecordingPlatform::default());
        let config = DmConfig { static_config: true, ..DmConfig::default() };
        let mut dm = manager_with(platform, None, config);
        let bus = dm.bind(dm.root(), &ENUM_BUS_DRIVER, "ebus", None, 0, None).unwrap();
        let a = dm.bind(bus, &TEST_DRIVER, "a", None, 0, None).unwrap();
        let b = dm.bind(bus, &TEST_DRIVER, "b", None, 0, None).unwrap();

        dm.activate(a).unwrap();

        assert_eq!(count("resolve:ebus"), 1);
        assert_eq!(count("resolve:a"), 1);
        assert_eq!(count("resolve:b"), 1);
        assert_eq!(count("activate:a"), 1);
        assert_eq!(count("activate:b"), 1);
        assert!(dm.is_active(b));
        let order = trace();
        let pos = |tag: &str| order.iter().position(|e| e == tag).unwrap();
        assert!(pos("resolve:ebus") < pos("resolve:a"));
        assert!(pos("activate:ebus") < pos("activate:a"));
    }

    fn enum_bus_fails_late(dm: &mut DeviceManager, id: DeviceId) -> DmResult<()> {
        for child in dm.children(id)?.to_vec() {
            dm.activate(child)?;
        }
        rec(dm, id, "activate")
    }

    static FLAKY_BUS: Driver = Driver {
        name: "flaky_bus",
        category: CategoryId::TestBus,
        activate: Some(enum_bus_fails_late),
        ..Driver::EMPTY
    };

    #[test]
    fn failed_bus_activation_takes_enumerated_children_down() {
        let (mut dm, _platform) = manager();
        let bus = dm.bind(dm.root(), &FLAKY_BUS, "flaky", None, 0, None).unwrap();
        let dev = dm.bind(bus, &TEST_DRIVER, "dev", None, 0, None).unwrap();
        fail("activate:flaky");

        assert_eq!(dm.activate(bus), Err(INJECTED));

        assert!(!dm.is_active(bus));
        assert!(!dm.is_active(dev));
        assert_eq!(count("activate:dev"), 1);
        assert_eq!(count("deactivate:dev"), 1);
    }

    #[test]
    fn failed_bus_activation_forces_down_a_stuck_child() {
        let (mut dm, _platform) = manager();
        let bus = dm.bind(dm.root(), &FLAKY_BUS, "flaky", None, 0, None).unwrap();
        let dev = dm.bind(bus, &TEST_DRIVER, "dev", None, 0, None).unwrap();
        fail("activate:flaky");
        fail("deactivate:dev");

        assert_eq!(dm.activate(bus), Err(INJECTED));

        assert!(!dm.is_active(bus));
        assert!(!dm.is_active(dev));
        assert_eq!(dm.phase(dev), Phase::ConfigResolved);
        assert!(dm.storage(dev, StorageKind::Private).is_err());
        // Strict attempt, then the forced one.
        assert_eq!(count("deactivate:dev"), 2);
    }

    #[test]
    fn resolving_a_child_resolves_its_parent() {
        let platform = alloc::sync::Arc::new(RecordingPlatform::default());
        let config = DmConfig { static_config: true, ..DmConfig::default() };
        let mut dm = manager_with(platform, None, config);
        let (bus, dev) = bus_with_device(&mut dm);

        dm.resolve_configuration(dev).unwrap();

        assert_eq!(dm.phase(bus), Phase::ConfigResolved);
        assert_eq!(dm.phase(dev), Phase::ConfigResolved);
        assert_eq!(count("resolve:dev"), 1);
        assert_eq!(count("activate:bus"), 0);
        assert_eq!(dm.storage(dev, StorageKind::Private).unwrap().len(), 64);
    }

    #[test]
    fn resolve_hook_needs_node_or_static_config() {
        let (mut dm, _platform) = manager();
        let (_bus, dev) = bus_with_device(&mut dm);
        dm.resolve_configuration(dev).unwrap();
        assert_eq!(count("resolve:dev"), 0);
    }

    #[test]
    fn failed_resolution_releases_storage() {
        let platform = alloc::sync::Arc::new(RecordingPlatform::default());
        let config = DmConfig { static_config: true, ..DmConfig::default() };
        let mut dm = manager_with(platform, None, config);
        let (_bus, dev) = bus_with_device(&mut dm);
        let before = dm.stats();
        fail("resolve:dev");

        assert_eq!(dm.activate(dev), Err(INJECTED));

        assert_eq!(dm.phase(dev), Phase::Bound);
        assert_eq!(dm.storage(dev, StorageKind::Private), Err(DmError::NotFound));
        assert_eq!(dm.stats().live_blocks, before.live_blocks);
    }

    static HUNGRY: Driver = Driver {
        name: "hungry",
        category: CategoryId::Misc,
        private_size: 1 << 20,
        ..Driver::EMPTY
    };

    #[test]
    fn exhausted_storage_is_reported() {
        let (mut dm, _platform) = manager();
        let dev = dm.bind(dm.root(), &HUNGRY, "hungry", None, 0, None).unwrap();
        assert_eq!(dm.activate(dev), Err(DmError::OutOfMemory));
        assert_eq!(dm.phase(dev), Phase::Bound);
    }

    #[test]
    fn dma_private_storage_is_aligned_and_flushed() {
        let (mut dm, platform) = manager();
        let dev = dm.bind(dm.root(), &DMA_DRIVER, "dma", None, 0, None).unwrap();
        dm.activate(dev).unwrap();
        assert_eq!(dm.storage(dev, StorageKind::Private).unwrap().len(), 64);
        let addr = dm.storage(dev, StorageKind::Private).unwrap().as_ptr() as usize;
        assert_eq!(addr % 64, 0);
        assert_eq!(platform.flushes(), vec![(addr, addr + 64)]);
        assert_eq!(dm.stats().live_dma_blocks, 1);
    }

    #[test]
    fn stale_handles_are_rejected() {
        let (mut dm, _platform) = manager();
        let dev = dm.bind(dm.root(), &PHY_DRIVER, "phy", None, 0, None).unwrap();
        dm.unbind(dev).unwrap();
        assert_eq!(dm.phase(dev), Phase::Removed);
        assert_eq!(dm.activate(dev), Err(DmError::InvalidArgument));
        assert_eq!(dm.resolve_configuration(dev), Err(DmError::InvalidArgument));
        assert_eq!(dm.deactivate(dev, RemoveFlags::NORMAL), Err(DmError::InvalidArgument));
    }

    #[test]
    fn deactivation_runs_children_first_and_frees_private() {
        let (mut dm, _platform) = manager();
        let (bus, dev) = bus_with_device(&mut dm);
        dm.activate(dev).unwrap();
        let idle = dm.stats();
        reset();

        assert_eq!(dm.deactivate(bus, RemoveFlags::NORMAL), Ok(Removal::Removed));

        assert_eq!(
            trace(),
            vec![
                "pre_deactivate:dev",
                "deactivate:dev",
                "child_post_deactivate:dev",
                "power_off:dev",
                "deactivate:bus",
                "power_off:bus",
            ]
        );
        assert_eq!(dm.phase(dev), Phase::ConfigResolved);
        assert_eq!(dm.phase(bus), Phase::ConfigResolved);
        assert_eq!(dm.stats().live_blocks, idle.live_blocks - 2);

        dm.activate(dev).unwrap();
        assert_eq!(count("activate:dev"), 1);
        assert!(dm.is_active(bus));
    }

    #[test]
    fn failing_deactivate_hook_keeps_device_active() {
        let (mut dm, _platform) = manager();
        let (_bus, dev) = bus_with_device(&mut dm);
        dm.activate(dev).unwrap();
        fail("deactivate:dev");
        assert_eq!(dm.deactivate(dev, RemoveFlags::NORMAL), Err(INJECTED));
        assert!(dm.is_active(dev));
        // The category hook that ran before the failure is undone.
        assert_eq!(count("pre_deactivate:dev"), 1);
        assert_eq!(count("post_activate:dev"), 2);
    }

    #[test]
    fn removal_flags_select_devices() {
        let (mut dm, _platform) = manager();
        let root = dm.root();
        let vital = dm.bind(root, &VITAL_DRIVER, "vital", None, 0, None).unwrap();
        let master = dm.bind(root, &BUSMASTER_DRIVER, "master", None, 0, None).unwrap();
        let bus = dm.bind(root, &PLAIN_BUS_DRIVER, "bus", None, 0, None).unwrap();
        let inner = dm.bind(bus, &VITAL_DRIVER, "inner", None, 0, None).unwrap();
        for dev in [vital, master, inner] {
            dm.activate(dev).unwrap();
        }

        assert_eq!(dm.deactivate_all(RemoveFlags::ACTIVE_DMA), Ok(Removal::Kept));
        assert!(!dm.is_active(master));
        assert!(dm.is_active(vital) && dm.is_active(inner) && dm.is_active(bus));

        assert_eq!(
            dm.deactivate_all(RemoveFlags::NORMAL | RemoveFlags::NON_VITAL),
            Ok(Removal::Kept)
        );
        assert!(dm.is_active(vital) && dm.is_active(inner));
        // A kept child keeps its parent up.
        assert!(dm.is_active(bus));

        assert_eq!(dm.deactivate_all(RemoveFlags::NORMAL), Ok(Removal::Removed));
        assert!(!dm.is_active(vital) && !dm.is_active(bus) && !dm.is_active(inner));
        assert!(dm.is_active(root));
    }

    #[test]
    fn uninit_tears_everything_down() {
        let (mut dm, _platform) = manager();
        let (_bus, dev) = bus_with_device(&mut dm);
        dm.activate(dev).unwrap();
        reset();
        dm.uninit().unwrap();
        let order = trace();
        let pos = |tag: &str| order.iter().position(|e| e == tag).unwrap();
        assert!(pos("deactivate:dev") < pos("deactivate:bus"));
        assert!(pos("deactivate:bus") < pos("unbind:dev"));
        assert!(pos("unbind:dev") < pos("unbind:bus"));
    }
}
