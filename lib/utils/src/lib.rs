//! Small `no_std` helpers shared by the device model crates.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod macros;
pub mod num;
pub mod sync;
pub mod types;
