//! In-memory hardware topology description (device tree) used to drive device binding.
//!
//! The tree is an arena of [Node]s addressed by [NodeId]. Nodes and properties are added through
//! the builder methods on [DeviceTree]; readers query `compatible`, `status`, `reg`, `/aliases`
//! sequence hints and `ranges`/`dma-ranges` translation windows.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod node;
pub mod prop;

pub use node::{AddressWindow, DeviceTree, Node, NodeId};
pub use prop::{Property, PropertyError};
