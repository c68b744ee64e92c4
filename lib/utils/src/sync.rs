//! Uniprocessor interior mutability primitives
use core::{
    cell::{RefCell, RefMut},
    fmt::Debug,
};

/// Wrap a static data structure inside it so that we are
/// able to access it from a `static` without a lock.
///
/// We should only use it on a single execution context. Firmware bring-up
/// runs on the boot hart alone, which is the only place this is used.
///
/// In order to get mutable reference of inner data, call
/// `try_exclusive_access`.
pub struct LocalCell<T> {
    /// inner data
    inner: RefCell<T>,
}

unsafe impl<T> Sync for LocalCell<T> {}

impl<T> LocalCell<T> {
    /// User is responsible to guarantee that inner struct is only used in
    /// a single execution context.
    pub const unsafe fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// Exclusive access that reports a conflicting borrow instead of panicking.
    pub fn try_exclusive_access(&self) -> Option<RefMut<'_, T>> {
        self.inner.try_borrow_mut().ok()
    }
}

impl<T: Debug> Debug for LocalCell<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalCell").field("inner", &self.inner).finish()
    }
}
