//! Device model for firmware: binds drivers to devices described by the hardware topology,
//! resolves their configuration, activates them parent first and tears them down again.
//!
//! The [manager::DeviceManager] owns every device. Drivers and categories are static tables
//! collected in a [catalog::Catalog]; board services such as pin control and power domains are
//! reached through the [platform::Platform] trait.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod logging;

pub mod bind;
pub mod builtin;
pub mod catalog;
pub mod config;
pub mod device;
pub mod dump;
pub mod error;
pub mod global;
pub mod lifecycle;
pub mod manager;
pub mod navigate;
pub mod platform;
mod rollback;
pub mod scan;
pub mod storage;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, CatalogBuilder, Category, CategoryId, Driver};
pub use config::DmConfig;
pub use device::{Device, DeviceId, Phase, StorageKind};
pub use error::{DmError, DmResult};
pub use lifecycle::{Removal, RemoveFlags};
pub use manager::DeviceManager;
pub use platform::Platform;
