//! Static description of drivers and device categories.
//!
//! A [Catalog] is assembled once at start-up with [CatalogBuilder] and is read-only afterwards.
//! Drivers and categories carry optional hooks; every hook receives the manager and the device
//! it is invoked for, so it may bind, activate or inspect other devices re-entrantly.

use alloc::{collections::btree_map::BTreeMap, vec::Vec};
use bitflags::bitflags;
use core::fmt::Debug;
use log::warn;
use spin::Once;

use crate::{
    builtin,
    device::DeviceId,
    error::{DmError, DmResult},
    manager::DeviceManager,
};

/// Callback attached to a driver or a category.
pub type DeviceHook = fn(&mut DeviceManager, DeviceId) -> DmResult<()>;

/// Device categories (uclasses) known to the device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoryId {
    Root,
    SimpleBus,
    Pinctrl,
    PowerDomain,
    Clk,
    Gpio,
    Serial,
    I2c,
    Spi,
    Mmc,
    Eth,
    Pci,
    Phy,
    UsbPhy,
    Misc,
    Test,
    TestBus,
}

bitflags! {
    pub struct DriverFlags: u32 {
        /// Usable before relocation, bound during a pre-relocation scan.
        const PRE_RELOC = 1 << 0;
        /// Private storage must be suitable for DMA.
        const ALLOC_PRIV_DMA = 1 << 1;
        /// Do not switch on the device's power domain on activation.
        const SKIP_POWER_DOMAIN = 1 << 2;
        /// Device has DMA in flight and must be stopped before handoff.
        const ACTIVE_DMA = 1 << 3;
        /// Device must be quiesced before the OS takes over.
        const OS_PREPARE = 1 << 4;
        /// Device stays active unless a removal explicitly includes vital devices.
        const VITAL = 1 << 5;
        /// Activate the device straight after a topology scan.
        const ACTIVATE_AFTER_BIND = 1 << 6;
    }
}

bitflags! {
    pub struct CategoryFlags: u32 {
        /// Sequence numbers come from `/aliases` entries named after the category.
        const SEQ_ALIAS = 1 << 0;
        /// Devices get no automatic sequence number.
        const NO_AUTO_SEQ = 1 << 1;
    }
}

/// One `compatible` string a driver accepts, with a value handed to the bound device.
#[derive(Debug, Clone, Copy)]
pub struct OfMatch {
    pub compatible: &'static str,
    pub data: usize,
}

pub struct Driver {
    pub name: &'static str,
    pub category: CategoryId,
    pub of_match: &'static [OfMatch],
    pub bind: Option<DeviceHook>,
    /// Read the device's configuration from its topology node or static block.
    pub resolve_config: Option<DeviceHook>,
    pub activate: Option<DeviceHook>,
    pub deactivate: Option<DeviceHook>,
    pub unbind: Option<DeviceHook>,
    pub child_post_bind: Option<DeviceHook>,
    pub child_pre_activate: Option<DeviceHook>,
    pub child_post_deactivate: Option<DeviceHook>,
    pub config_size: usize,
    pub private_size: usize,
    pub per_child_config_size: usize,
    pub per_child_private_size: usize,
    pub flags: DriverFlags,
}

impl Driver {
    /// A driver with no hooks, no storage and no flags. Meant for struct update syntax.
    pub const EMPTY: Driver = Driver {
        name: "",
        category: CategoryId::Misc,
        of_match: &[],
        bind: None,
        resolve_config: None,
        activate: None,
        deactivate: None,
        unbind: None,
        child_post_bind: None,
        child_pre_activate: None,
        child_post_deactivate: None,
        config_size: 0,
        private_size: 0,
        per_child_config_size: 0,
        per_child_private_size: 0,
        flags: DriverFlags::empty(),
    };

    pub fn matches(&self, compatible: &str) -> Option<&OfMatch> {
        self.of_match.iter().find(|m| m.compatible == compatible)
    }
}

impl Debug for Driver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

pub struct Category {
    pub id: CategoryId,
    /// Also the stem of `/aliases` entries (`serial0`, `i2c1`, ...).
    pub name: &'static str,
    pub flags: CategoryFlags,
    pub post_bind: Option<DeviceHook>,
    pub pre_unbind: Option<DeviceHook>,
    pub pre_activate: Option<DeviceHook>,
    pub post_activate: Option<DeviceHook>,
    pub pre_deactivate: Option<DeviceHook>,
    pub child_post_bind: Option<DeviceHook>,
    pub child_pre_activate: Option<DeviceHook>,
    pub per_device_config_size: usize,
    pub per_device_private_size: usize,
    pub per_child_config_size: usize,
    pub per_child_private_size: usize,
}

impl Category {
    pub const EMPTY: Category = Category {
        id: CategoryId::Misc,
        name: "",
        flags: CategoryFlags::empty(),
        post_bind: None,
        pre_unbind: None,
        pre_activate: None,
        post_activate: None,
        pre_deactivate: None,
        child_post_bind: None,
        child_pre_activate: None,
        per_device_config_size: 0,
        per_device_private_size: 0,
        per_child_config_size: 0,
        per_child_private_size: 0,
    };
}

impl Debug for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Category")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    drivers: Vec<&'static Driver>,
    categories: BTreeMap<CategoryId, &'static Category>,
}

impl Catalog {
    pub fn category(&self, id: CategoryId) -> DmResult<&'static Category> {
        self.categories.get(&id).copied().ok_or(DmError::NotFound)
    }

    pub fn driver(&self, name: &str) -> DmResult<&'static Driver> {
        self.drivers
            .iter()
            .find(|d| d.name == name)
            .copied()
            .ok_or(DmError::NotFound)
    }

    /// First driver accepting `compatible`, in registration order.
    pub fn match_compatible(&self, compatible: &str) -> Option<(&'static Driver, &'static OfMatch)> {
        self.drivers
            .iter()
            .find_map(|d| d.matches(compatible).map(|m| (*d, m)))
    }

    pub fn drivers(&self) -> impl Iterator<Item = &'static Driver> + '_ {
        self.drivers.iter().copied()
    }
}

#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalog: Catalog,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the root and simple-bus drivers every manager needs.
    pub fn with_builtins() -> Self {
        Self::new()
            .category(&builtin::ROOT_CATEGORY)
            .driver(&builtin::ROOT_DRIVER)
            .category(&builtin::SIMPLE_BUS_CATEGORY)
            .driver(&builtin::SIMPLE_BUS_DRIVER)
    }

    pub fn driver(mut self, driver: &'static Driver) -> Self {
        if self.catalog.drivers.iter().any(|d| d.name == driver.name) {
            warn!("Driver '{}' registered twice, keeping the first", driver.name);
        } else {
            self.catalog.drivers.push(driver);
        }
        self
    }

    pub fn category(mut self, category: &'static Category) -> Self {
        if self.catalog.categories.contains_key(&category.id) {
            warn!("Category '{}' registered twice, keeping the first", category.name);
        } else {
            self.catalog.categories.insert(category.id, category);
        }
        self
    }

    pub fn build(self) -> Catalog {
        self.catalog
    }
}

static CATALOG: Once<Catalog> = Once::new();

/// Make `catalog` the process-wide catalog. Later calls return the first one.
pub fn install(catalog: Catalog) -> &'static Catalog {
    CATALOG.call_once(|| catalog)
}

pub fn installed() -> Option<&'static Catalog> {
    CATALOG.get()
}
