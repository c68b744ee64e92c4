//! This module defines some useful pointer types

use alloc::boxed::Box;
use core::{
    fmt::{Debug, Display},
    ops::Deref,
};

/// A "maybe" owned object.
///
/// - If the packed object is a [Box] pointer, it will be disposed as the life cycle of this pointer ends.
/// - If the packed object is static, it keeps alive permanently.
pub enum MaybeOwned<T: ?Sized + 'static> {
    /// Referencing a static value
    Static(&'static T),
    /// Functions as a boxed pointer
    Boxed(Box<T>),
}

impl<T: ?Sized> Deref for MaybeOwned<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        match self {
            MaybeOwned::Static(s) => s,
            MaybeOwned::Boxed(b) => b,
        }
    }
}

/// Packed type for [MaybeOwned<str>]
pub type MaybeOwnedStr = MaybeOwned<str>;

impl From<&'static str> for MaybeOwnedStr {
    fn from(value: &'static str) -> Self {
        MaybeOwned::Static(value)
    }
}

impl From<Box<str>> for MaybeOwnedStr {
    fn from(value: Box<str>) -> Self {
        MaybeOwned::Boxed(value)
    }
}

impl<T: ?Sized + Display> Display for MaybeOwned<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Boxed(bx) => Display::fmt(bx, f),
            Self::Static(st) => Display::fmt(st, f),
        }
    }
}

impl<T: ?Sized + Debug> Debug for MaybeOwned<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(&**self, f)
    }
}
