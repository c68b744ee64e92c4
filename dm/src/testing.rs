//! Fixtures shared by the unit tests: recording drivers, a recording platform and heap helpers.

use alloc::{boxed::Box, format, string::String, sync::Arc, vec, vec::Vec};
use core::cell::RefCell;
use dt::DeviceTree;
use std::sync::OnceLock;

use crate::{
    catalog::{Catalog, CatalogBuilder, Category, CategoryFlags, CategoryId, Driver, DriverFlags, OfMatch},
    config::DmConfig,
    device::DeviceId,
    error::{DmError, DmResult, Service},
    manager::DeviceManager,
    platform::Platform,
    storage::StorageAllocator,
};

std::thread_local! {
    static TRACE: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static FAIL: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub const INJECTED: DmError = DmError::collaborator(Service::Driver, -5);

pub fn reset() {
    TRACE.with_borrow_mut(Vec::clear);
    FAIL.with_borrow_mut(Vec::clear);
}

/// Make the event `tag` (`"<event>:<device name>"`) fail with [INJECTED].
pub fn fail(tag: &str) {
    FAIL.with_borrow_mut(|f| f.push(tag.into()));
}

pub fn trace() -> Vec<String> {
    TRACE.with_borrow(Clone::clone)
}

/// Events of the trace that start with `prefix`.
pub fn events(prefix: &str) -> Vec<String> {
    trace().into_iter().filter(|e| e.starts_with(prefix)).collect()
}

pub fn count(tag: &str) -> usize {
    trace().iter().filter(|e| *e == tag).count()
}

fn record(tag: String) -> DmResult<()> {
    TRACE.with_borrow_mut(|t| t.push(tag.clone()));
    if FAIL.with_borrow(|f| f.contains(&tag)) {
        Err(INJECTED)
    } else {
        Ok(())
    }
}

pub fn rec(dm: &DeviceManager, id: DeviceId, what: &str) -> DmResult<()> {
    let name = dm.device(id).map(|d| d.name()).unwrap_or("?");
    record(format!("{}:{}", what, name))
}

macro_rules! recording_hooks {
    ($($fn_name: ident => $what: literal),* $(,)?) => {
        $(
            pub fn $fn_name(dm: &mut DeviceManager, id: DeviceId) -> DmResult<()> {
                rec(dm, id, $what)
            }
        )*
    };
}

recording_hooks! {
    drv_bind => "bind",
    drv_resolve => "resolve",
    drv_activate => "activate",
    drv_deactivate => "deactivate",
    drv_unbind => "unbind",
    drv_child_post_bind => "child_post_bind",
    drv_child_pre_activate => "child_pre_activate",
    drv_child_post_deactivate => "child_post_deactivate",
    cat_post_bind => "post_bind",
    cat_pre_unbind => "pre_unbind",
    cat_pre_activate => "pre_activate",
    cat_post_activate => "post_activate",
    cat_pre_deactivate => "pre_deactivate",
    cat_child_post_bind => "cat_child_post_bind",
    cat_child_pre_activate => "cat_child_pre_activate",
}

pub static TEST_CATEGORY: Category = Category {
    id: CategoryId::Test,
    name: "test",
    post_bind: Some(cat_post_bind),
    pre_unbind: Some(cat_pre_unbind),
    pre_activate: Some(cat_pre_activate),
    post_activate: Some(cat_post_activate),
    pre_deactivate: Some(cat_pre_deactivate),
    ..Category::EMPTY
};

pub static TEST_BUS_CATEGORY: Category = Category {
    id: CategoryId::TestBus,
    name: "testbus",
    flags: CategoryFlags::SEQ_ALIAS,
    child_post_bind: Some(cat_child_post_bind),
    child_pre_activate: Some(cat_child_pre_activate),
    per_device_config_size: 8,
    per_child_private_size: 16,
    ..Category::EMPTY
};

pub static PINCTRL_CATEGORY: Category = Category {
    id: CategoryId::Pinctrl,
    name: "pinctrl",
    ..Category::EMPTY
};

pub static POWER_CATEGORY: Category = Category {
    id: CategoryId::PowerDomain,
    name: "power_domain",
    ..Category::EMPTY
};

pub static SERIAL_CATEGORY: Category = Category {
    id: CategoryId::Serial,
    name: "serial",
    flags: CategoryFlags::SEQ_ALIAS,
    ..Category::EMPTY
};

pub static MISC_CATEGORY: Category = Category {
    id: CategoryId::Misc,
    name: "misc",
    flags: CategoryFlags::NO_AUTO_SEQ,
    ..Category::EMPTY
};

/// Leaf driver with hooks everywhere, 16 bytes of config and 64 bytes of private storage.
pub static TEST_DRIVER: Driver = Driver {
    name: "test_drv",
    category: CategoryId::Test,
    of_match: &[OfMatch { compatible: "acme,test", data: 0x55 }],
    bind: Some(drv_bind),
    resolve_config: Some(drv_resolve),
    activate: Some(drv_activate),
    deactivate: Some(drv_deactivate),
    unbind: Some(drv_unbind),
    config_size: 16,
    private_size: 64,
    ..Driver::EMPTY
};

pub static TEST_BUS_DRIVER: Driver = Driver {
    name: "test_bus",
    category: CategoryId::TestBus,
    of_match: &[OfMatch { compatible: "acme,bus", data: 0 }],
    bind: Some(drv_bind),
    activate: Some(drv_activate),
    deactivate: Some(drv_deactivate),
    unbind: Some(drv_unbind),
    child_post_bind: Some(drv_child_post_bind),
    child_pre_activate: Some(drv_child_pre_activate),
    child_post_deactivate: Some(drv_child_post_deactivate),
    ..Driver::EMPTY
};

fn enum_bus_resolve(dm: &mut DeviceManager, id: DeviceId) -> DmResult<()> {
    rec(dm, id, "resolve")?;
    for child in dm.children(id)?.to_vec() {
        dm.resolve_configuration(child)?;
    }
    Ok(())
}

fn enum_bus_activate(dm: &mut DeviceManager, id: DeviceId) -> DmResult<()> {
    rec(dm, id, "activate")?;
    for child in dm.children(id)?.to_vec() {
        dm.activate(child)?;
    }
    Ok(())
}

/// A bus that resolves and activates its children from its own hooks.
pub static ENUM_BUS_DRIVER: Driver = Driver {
    name: "enum_bus",
    category: CategoryId::TestBus,
    resolve_config: Some(enum_bus_resolve),
    activate: Some(enum_bus_activate),
    deactivate: Some(drv_deactivate),
    ..Driver::EMPTY
};

/// Leaf without any category storage, used where block counts are checked.
pub static PHY_DRIVER: Driver = Driver {
    name: "phy_drv",
    category: CategoryId::Misc,
    activate: Some(drv_activate),
    deactivate: Some(drv_deactivate),
    private_size: 64,
    ..Driver::EMPTY
};

pub static PLAIN_BUS_DRIVER: Driver = Driver {
    name: "plain_bus",
    category: CategoryId::Misc,
    activate: Some(drv_activate),
    deactivate: Some(drv_deactivate),
    ..Driver::EMPTY
};

pub static DMA_DRIVER: Driver = Driver {
    name: "dma_drv",
    category: CategoryId::Misc,
    private_size: 10,
    flags: DriverFlags::ALLOC_PRIV_DMA,
    ..Driver::EMPTY
};

pub static VITAL_DRIVER: Driver = Driver {
    name: "vital_drv",
    category: CategoryId::Misc,
    deactivate: Some(drv_deactivate),
    flags: DriverFlags::VITAL,
    ..Driver::EMPTY
};

pub static BUSMASTER_DRIVER: Driver = Driver {
    name: "busmaster",
    category: CategoryId::Misc,
    deactivate: Some(drv_deactivate),
    flags: DriverFlags::ACTIVE_DMA,
    ..Driver::EMPTY
};

pub static PINCTRL_DRIVER: Driver = Driver {
    name: "pinctrl_drv",
    category: CategoryId::Pinctrl,
    of_match: &[OfMatch { compatible: "acme,pinctrl", data: 0 }],
    activate: Some(drv_activate),
    ..Driver::EMPTY
};

pub static POWER_DRIVER: Driver = Driver {
    name: "power_drv",
    category: CategoryId::PowerDomain,
    ..Driver::EMPTY
};

pub static QUIET_DRIVER: Driver = Driver {
    name: "quiet_drv",
    category: CategoryId::Misc,
    flags: DriverFlags::SKIP_POWER_DOMAIN,
    ..Driver::EMPTY
};

pub static UART_DRIVER: Driver = Driver {
    name: "uart",
    category: CategoryId::Serial,
    of_match: &[OfMatch { compatible: "acme,uart", data: 1 }],
    config_size: 32,
    ..Driver::EMPTY
};

/// Bound from the topology only before relocation when the node asks for it.
pub static LATE_DRIVER: Driver = Driver {
    name: "late_drv",
    category: CategoryId::Misc,
    of_match: &[OfMatch { compatible: "acme,late", data: 0 }],
    ..Driver::EMPTY
};

pub static EAGER_DRIVER: Driver = Driver {
    name: "eager_drv",
    category: CategoryId::Misc,
    of_match: &[OfMatch { compatible: "acme,eager", data: 0 }],
    activate: Some(drv_activate),
    flags: DriverFlags::ACTIVATE_AFTER_BIND.union(DriverFlags::PRE_RELOC),
    ..Driver::EMPTY
};

/// Its category is never registered.
pub static ORPHAN_DRIVER: Driver = Driver {
    name: "orphan_drv",
    category: CategoryId::Gpio,
    ..Driver::EMPTY
};

pub fn catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

/// Builtins plus every test category and driver.
pub fn build_catalog() -> Catalog {
    [
        &TEST_CATEGORY,
        &TEST_BUS_CATEGORY,
        &PINCTRL_CATEGORY,
        &POWER_CATEGORY,
        &SERIAL_CATEGORY,
        &MISC_CATEGORY,
    ]
    .into_iter()
    .fold(CatalogBuilder::with_builtins(), CatalogBuilder::category)
    .driver(&TEST_DRIVER)
    .driver(&TEST_BUS_DRIVER)
    .driver(&ENUM_BUS_DRIVER)
    .driver(&PHY_DRIVER)
    .driver(&PLAIN_BUS_DRIVER)
    .driver(&DMA_DRIVER)
    .driver(&VITAL_DRIVER)
    .driver(&BUSMASTER_DRIVER)
    .driver(&PINCTRL_DRIVER)
    .driver(&POWER_DRIVER)
    .driver(&QUIET_DRIVER)
    .driver(&UART_DRIVER)
    .driver(&LATE_DRIVER)
    .driver(&EAGER_DRIVER)
    .build()
}

/// Leak a zeroed region to back a test heap.
pub fn leak_region(size: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; size].into_boxed_slice())
}

/// Platform that appends its calls to the trace and remembers cache flushes.
#[derive(Default)]
pub struct RecordingPlatform {
    flushes: RefCell<Vec<(usize, usize)>>,
}

impl RecordingPlatform {
    pub fn flushes(&self) -> Vec<(usize, usize)> {
        self.flushes.borrow().clone()
    }
}

impl Platform for RecordingPlatform {
    fn select_pin_state(&self, dm: &mut DeviceManager, dev: DeviceId, state: &str) -> DmResult<()> {
        rec(dm, dev, &format!("pins_{}", state))
    }

    fn power_domain_on(&self, dm: &mut DeviceManager, dev: DeviceId) -> DmResult<()> {
        rec(dm, dev, "power_on")
    }

    fn power_domain_off(&self, dm: &mut DeviceManager, dev: DeviceId) -> DmResult<()> {
        rec(dm, dev, "power_off")
    }

    fn apply_clock_defaults(&self, dm: &mut DeviceManager, dev: DeviceId) -> DmResult<()> {
        rec(dm, dev, "clocks")
    }

    fn flush_dcache_range(&self, start: usize, end: usize) {
        self.flushes.borrow_mut().push((start, end));
    }
}

pub const HEAP_SIZE: usize = 64 * 1024;

pub fn manager_with(
    platform: Arc<dyn Platform>,
    tree: Option<DeviceTree>,
    config: DmConfig,
) -> DeviceManager {
    reset();
    let heap = StorageAllocator::from_region(leak_region(HEAP_SIZE), config.dma_align).unwrap();
    DeviceManager::new(catalog(), platform, tree.map(Arc::new), heap, config).unwrap()
}

/// A manager without topology on a recording platform; the platform is returned for inspection.
pub fn manager() -> (DeviceManager, Arc<RecordingPlatform>) {
    let platform = Arc::new(RecordingPlatform::default());
    let dm = manager_with(platform.clone(), None, DmConfig::default());
    (dm, platform)
}
