use ppc_core::{IcacheGeometry, MAX_INSNS};
use serde::{Deserialize, Serialize};

/// Tunables for the translation cache and dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitConfig {
    /// Upper bound on guest instructions per block.
    pub max_block_insns: u32,
    /// Code buffer size in host instructions.
    pub code_buffer_capacity: usize,
    /// Blocks compiled before the cache is considered exhausted.
    pub max_blocks: usize,
    /// Revalidate block checksums on every lookup hit.
    pub icache_check: bool,
    /// Honour breakpoints and single-step requests.
    pub enable_debugging: bool,
    /// Platform has extended RAM (Wii).
    pub extended_ram: bool,
    pub icache: IcacheGeometry,
    /// Longest timing slice between scheduler checks.
    pub max_slice_cycles: i32,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            max_block_insns: MAX_INSNS as u32,
            code_buffer_capacity: 1 << 20,
            max_blocks: 1 << 16,
            icache_check: true,
            enable_debugging: false,
            extended_ram: false,
            icache: IcacheGeometry::default(),
            max_slice_cycles: 20_000,
        }
    }
}
