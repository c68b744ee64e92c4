//! Drivers every manager carries: the root device and the simple bus.

use dt::AddressWindow;

use crate::{
    catalog::{Category, CategoryId, Driver, DriverFlags, OfMatch},
    device::{DeviceId, StorageKind},
    error::DmResult,
    manager::DeviceManager,
};

pub static ROOT_CATEGORY: Category = Category {
    id: CategoryId::Root,
    name: "root",
    ..Category::EMPTY
};

pub static ROOT_DRIVER: Driver = Driver {
    name: "root_driver",
    category: CategoryId::Root,
    flags: DriverFlags::PRE_RELOC,
    ..Driver::EMPTY
};

pub static SIMPLE_BUS_CATEGORY: Category = Category {
    id: CategoryId::SimpleBus,
    name: "simple_bus",
    ..Category::EMPTY
};

const WINDOW_SIZE: usize = 3 * core::mem::size_of::<u64>();

/// Transparent memory-mapped bus. Binding it binds its subnodes.
pub static SIMPLE_BUS_DRIVER: Driver = Driver {
    name: "simple_bus",
    category: CategoryId::SimpleBus,
    of_match: &[
        OfMatch { compatible: "simple-bus", data: 0 },
        OfMatch { compatible: "simple-mfd", data: 0 },
    ],
    bind: Some(simple_bus_bind),
    resolve_config: Some(simple_bus_resolve),
    config_size: WINDOW_SIZE,
    flags: DriverFlags::PRE_RELOC,
    ..Driver::EMPTY
};

fn simple_bus_bind(dm: &mut DeviceManager, id: DeviceId) -> DmResult<()> {
    dm.scan_children(id)
}

fn simple_bus_resolve(dm: &mut DeviceManager, id: DeviceId) -> DmResult<()> {
    let window = match (dm.topology(), dm.device(id)?.node()) {
        (Some(tree), Some(node)) => tree.ranges(node)?,
        _ => None,
    };
    let Some(window) = window else {
        return Ok(());
    };
    let config = dm.storage_mut(id, StorageKind::Config)?;
    for (chunk, value) in config
        .chunks_exact_mut(8)
        .zip([window.cpu, window.bus, window.size])
    {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    Ok(())
}

/// Address translation recorded for a simple bus, if its node has a `ranges` entry.
pub fn simple_bus_window(dm: &DeviceManager, id: DeviceId) -> DmResult<Option<AddressWindow>> {
    let config = dm.storage(id, StorageKind::Config)?;
    let mut words = config
        .chunks_exact(8)
        .map(|c| c.iter().rev().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)));
    let (Some(cpu), Some(bus), Some(size)) = (words.next(), words.next(), words.next()) else {
        return Ok(None);
    };
    if size == 0 {
        return Ok(None);
    }
    Ok(Some(AddressWindow { cpu, bus, size }))
}
