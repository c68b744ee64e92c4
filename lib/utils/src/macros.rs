//! Macros for defining packed index types.

/// Defines a copyable index newtype over `usize` used as a stable handle into an arena.
///
/// The generated type exposes `index()` and converts from/into `usize`.
#[macro_export]
macro_rules! define_handle {
    ($(#[$meta: meta])* $name: ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name {
            inner: usize,
        }

        impl $name {
            /// Wrap a raw arena index.
            pub const fn from_index(index: usize) -> Self {
                $name { inner: index }
            }

            /// The raw arena index.
            pub const fn index(self) -> usize {
                self.inner
            }
        }

        impl core::convert::From<usize> for $name {
            fn from(value: usize) -> Self {
                $name { inner: value }
            }
        }

        impl core::convert::From<$name> for usize {
            fn from(value: $name) -> usize {
                value.inner
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "#{}", self.inner)
            }
        }
    };
}
