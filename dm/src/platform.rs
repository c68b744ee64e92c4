//! Services the device model consumes but does not implement.

use crate::{device::DeviceId, error::DmResult, manager::DeviceManager};

/// Board hooks for pin configuration, power domains, clocks and cache maintenance.
///
/// Every method defaults to a successful no-op, so a board only implements what it has.
pub trait Platform {
    /// Apply the pin configuration state named `state` to `dev`.
    fn select_pin_state(&self, dm: &mut DeviceManager, dev: DeviceId, state: &str) -> DmResult<()> {
        let _ = (dm, dev, state);
        Ok(())
    }

    fn power_domain_on(&self, dm: &mut DeviceManager, dev: DeviceId) -> DmResult<()> {
        let _ = (dm, dev);
        Ok(())
    }

    fn power_domain_off(&self, dm: &mut DeviceManager, dev: DeviceId) -> DmResult<()> {
        let _ = (dm, dev);
        Ok(())
    }

    /// Program the default clock rates and parents described for `dev`.
    fn apply_clock_defaults(&self, dm: &mut DeviceManager, dev: DeviceId) -> DmResult<()> {
        let _ = (dm, dev);
        Ok(())
    }

    /// Write back and invalidate data cache lines covering `[start, end)`.
    fn flush_dcache_range(&self, start: usize, end: usize) {
        let _ = (start, end);
    }
}

/// A board without any of the optional services.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlatform;

impl Platform for NoPlatform {}
