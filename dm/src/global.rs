//! The process-wide device manager used by firmware code that has no handle to pass around.

use alloc::sync::Arc;
use dt::DeviceTree;
use utils::sync::LocalCell;

use crate::{
    catalog,
    config::DmConfig,
    error::{DmError, DmResult},
    manager::DeviceManager,
    platform::Platform,
    storage::StorageAllocator,
};

// Only touched from the boot hart before secondary harts are released.
static DM_ROOT: LocalCell<Option<DeviceManager>> = unsafe { LocalCell::new(None) };

/// Create the global manager over the installed catalog.
///
/// Fails with `NotFound` before [catalog::install] and with `InvalidArgument` on a second call.
pub fn init(
    platform: Arc<dyn Platform>,
    tree: Option<Arc<DeviceTree>>,
    heap: StorageAllocator,
    config: DmConfig,
) -> DmResult<()> {
    let installed = catalog::installed().ok_or(DmError::NotFound)?;
    let mut slot = DM_ROOT.try_exclusive_access().ok_or(DmError::Busy)?;
    if slot.is_some() {
        return Err(DmError::InvalidArgument);
    }
    *slot = Some(DeviceManager::new(installed, platform, tree, heap, config)?);
    Ok(())
}

pub fn is_initialized() -> bool {
    DM_ROOT.try_exclusive_access().is_some_and(|slot| slot.is_some())
}

/// Run `f` against the global manager. Fails with `Busy` when called from inside another `with`.
pub fn with<R>(f: impl FnOnce(&mut DeviceManager) -> DmResult<R>) -> DmResult<R> {
    let mut slot = DM_ROOT.try_exclusive_access().ok_or(DmError::Busy)?;
    let dm = slot.as_mut().ok_or(DmError::InvalidArgument)?;
    f(dm)
}

/// Tear down every device and drop the global manager.
pub fn uninit() -> DmResult<()> {
    let dm = DM_ROOT
        .try_exclusive_access()
        .ok_or(DmError::Busy)?
        .take()
        .ok_or(DmError::InvalidArgument)?;
    dm.uninit()
}
