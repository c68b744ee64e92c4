//! Zero-filled storage blocks for device configuration and private data.
//!
//! Blocks come from a buddy heap owned by the manager. A device slot either owns its block,
//! borrows a caller-supplied static block, or is empty. Only owned blocks are ever freed.

use buddy_system_allocator::Heap;
use core::{alloc::Layout, ptr::NonNull};
use log::warn;
use utils::num::AlignableTo;

use crate::{
    debug_ex,
    device::{DeviceId, StorageKind},
    error::{DmError, DmResult},
    manager::DeviceManager,
    platform::Platform,
    rollback::{Rollback, Undo},
};

const MIN_ALIGN: usize = core::mem::size_of::<usize>();

/// A zeroed heap allocation owned by exactly one device slot.
#[derive(Debug)]
pub struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
    dma: bool,
}

impl Block {
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub fn is_dma(&self) -> bool {
        self.dma
    }

    pub fn bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    External,
}

#[derive(Debug, Default)]
pub enum Slot {
    #[default]
    Unallocated,
    Owned(Block),
    /// Supplied by the caller at bind time and never freed by the manager.
    External(&'static mut [u8]),
}

impl Slot {
    pub fn ownership(&self) -> Option<Ownership> {
        match self {
            Slot::Unallocated => None,
            Slot::Owned(_) => Some(Ownership::Owned),
            Slot::External(_) => Some(Ownership::External),
        }
    }

    pub fn is_populated(&self) -> bool {
        !matches!(self, Slot::Unallocated)
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Slot::Unallocated => None,
            Slot::Owned(block) => Some(block.bytes()),
            Slot::External(data) => Some(data),
        }
    }

    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Slot::Unallocated => None,
            Slot::Owned(block) => Some(block.bytes_mut()),
            Slot::External(data) => Some(data),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Blocks currently owned by devices.
    pub live_blocks: usize,
    /// Of which DMA-capable.
    pub live_dma_blocks: usize,
    /// Bytes requested by live blocks after rounding.
    pub user_bytes: usize,
    pub failed: usize,
}

pub struct StorageAllocator {
    heap: Heap<32>,
    dma_align: usize,
    stats: AllocStats,
}

impl core::fmt::Debug for StorageAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StorageAllocator")
            .field("dma_align", &self.dma_align)
            .field("stats", &self.stats)
            .finish()
    }
}

impl StorageAllocator {
    /// Manage `region` as the device model heap. `dma_align` must be a power of two.
    pub fn from_region(region: &'static mut [u8], dma_align: usize) -> DmResult<StorageAllocator> {
        if !dma_align.is_power_of_two() {
            return Err(DmError::InvalidArgument);
        }
        let mut allocator = StorageAllocator {
            heap: Heap::<32>::empty(),
            dma_align,
            stats: AllocStats::default(),
        };
        let start = region.as_mut_ptr() as usize;
        unsafe {
            allocator.add_region(start, start + region.len());
        }
        Ok(allocator)
    }

    /// Hand `[start, end)` to the heap.
    ///
    /// # Safety
    /// The range must be valid, writable and unused for as long as the allocator lives.
    pub unsafe fn add_region(&mut self, start: usize, end: usize) {
        unsafe { self.heap.add_to_heap(start, end) };
    }

    pub fn dma_align(&self) -> usize {
        self.dma_align
    }

    pub fn stats(&self) -> AllocStats {
        self.stats
    }

    /// Allocate a zero-filled block of at least `size` bytes.
    ///
    /// DMA blocks are aligned to and padded to the DMA alignment, then flushed from the data
    /// cache so that no dirty line can later overwrite device-written data.
    pub fn allocate(&mut self, size: usize, dma: bool, platform: &dyn Platform) -> DmResult<Block> {
        if size == 0 {
            return Err(DmError::InvalidArgument);
        }
        let (size, align) = if dma {
            (size.align_up(self.dma_align), self.dma_align)
        } else {
            (size, MIN_ALIGN)
        };
        let layout = Layout::from_size_align(size, align).map_err(|_| DmError::InvalidArgument)?;
        let ptr = match self.heap.alloc(layout) {
            Ok(ptr) => ptr,
            Err(()) => {
                self.stats.failed += 1;
                warn!("Device storage exhausted allocating {} bytes", size);
                return Err(DmError::OutOfMemory);
            }
        };
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, size) };
        let block = Block { ptr, layout, dma };
        if dma {
            platform.flush_dcache_range(block.addr(), block.addr() + size);
        }
        self.stats.live_blocks += 1;
        self.stats.user_bytes += size;
        if dma {
            self.stats.live_dma_blocks += 1;
        }
        Ok(block)
    }

    pub fn free(&mut self, block: Block) {
        self.stats.live_blocks -= 1;
        self.stats.user_bytes -= block.len();
        if block.dma {
            self.stats.live_dma_blocks -= 1;
        }
        self.heap.dealloc(block.ptr, block.layout);
    }

    /// Free the block owned by `slot`, leaving it unallocated. External blocks are only detached.
    pub fn release(&mut self, slot: &mut Slot) {
        if let Slot::Owned(block) = core::mem::take(slot) {
            self.free(block);
        }
    }
}

impl DeviceManager {
    /// Size of the block `kind` needs for `id`, and whether it must be DMA-capable.
    pub(crate) fn storage_requirement(
        &self,
        id: DeviceId,
        kind: StorageKind,
    ) -> DmResult<(usize, bool)> {
        let dev = self.device(id)?;
        let parent = match dev.parent() {
            Some(parent) => Some(self.device(parent)?),
            None => None,
        };
        let per_child = |config: bool| {
            parent.map_or(0, |p| {
                let (drv, cat) = if config {
                    (p.driver().per_child_config_size, p.category().per_child_config_size)
                } else {
                    (p.driver().per_child_private_size, p.category().per_child_private_size)
                };
                if drv != 0 { drv } else { cat }
            })
        };
        Ok(match kind {
            StorageKind::Config => (dev.driver().config_size, false),
            StorageKind::CategoryConfig => (dev.category().per_device_config_size, false),
            StorageKind::ParentConfig => (per_child(true), false),
            StorageKind::Private => (
                dev.driver().private_size,
                dev.driver().flags.contains(crate::catalog::DriverFlags::ALLOC_PRIV_DMA),
            ),
            StorageKind::CategoryPrivate => (dev.category().per_device_private_size, false),
            StorageKind::ParentPrivate => (per_child(false), false),
        })
    }

    /// Allocate every private block `id` declares and does not have yet.
    ///
    /// Either all missing blocks are allocated or none are.
    pub fn allocate_device_storage(&mut self, id: DeviceId) -> DmResult<()> {
        let mut tx = Rollback::new(self);
        tx.allocate_private(id)?;
        tx.commit();
        Ok(())
    }
}

impl Rollback<'_> {
    /// Allocate one slot if it is declared and still empty. Records a free on rollback.
    pub(crate) fn allocate_slot(&mut self, id: DeviceId, kind: StorageKind) -> DmResult<()> {
        if self.device(id)?.slot(kind).is_populated() {
            return Ok(());
        }
        let (size, dma) = self.storage_requirement(id, kind)?;
        if size == 0 {
            return Ok(());
        }
        let dm: &mut DeviceManager = self;
        let block = dm.heap.allocate(size, dma, &*dm.platform)?;
        debug_ex!("{:?} storage of {} bytes for device {}", kind, block.len(), id);
        *dm.device_mut(id)?.slot_mut(kind) = Slot::Owned(block);
        self.record(Undo::FreeStorage(id, kind));
        Ok(())
    }

    pub(crate) fn allocate_private(&mut self, id: DeviceId) -> DmResult<()> {
        for kind in StorageKind::PRIVATE {
            self.allocate_slot(id, kind)?;
        }
        Ok(())
    }
}
