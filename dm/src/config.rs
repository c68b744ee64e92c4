//! Build and runtime configuration of the device model

/// Minimum alignment (and size granule) of storage that a DMA engine may write.
pub const ARCH_DMA_MINALIGN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmConfig {
    /// Number devices of `SEQ_ALIAS` categories from `/aliases` entries.
    pub seq_alias: bool,
    /// Configuration blocks are embedded in the build instead of resolved from topology nodes.
    pub static_config: bool,
    /// Alignment for DMA-capable private storage. Must be a power of two.
    pub dma_align: usize,
    /// Topology scans only bind drivers usable before relocation.
    pub pre_reloc_only: bool,
}

impl Default for DmConfig {
    fn default() -> Self {
        DmConfig {
            seq_alias: cfg!(feature = "seq-alias"),
            static_config: cfg!(feature = "of-platdata"),
            dma_align: ARCH_DMA_MINALIGN,
            pre_reloc_only: false,
        }
    }
}

impl DmConfig {
    pub fn is_valid(&self) -> bool {
        self.dma_align.is_power_of_two()
    }
}
