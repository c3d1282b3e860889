use xxhash_rust::xxh3::Xxh3;

use crate::mode::AddressingMode;

/// A translated guest block.
///
/// Owned by the block cache; `host_offset`/`host_size` locate its
/// lowered code in the code buffer generation recorded in `generation`.
#[derive(Debug, Clone)]
pub struct CompiledBlock {
    /// Guest effective address of the first instruction.
    pub address: u32,
    /// Physical address of the first instruction, used for range
    /// invalidation.
    pub phys_address: u32,
    pub mode: AddressingMode,
    /// Original size in guest instructions.
    pub num_insns: u32,
    pub checksum: u64,
    pub host_offset: usize,
    pub host_size: usize,
    /// Downcount charged when the block runs to its final exit.
    pub cost: u32,
    pub generation: u64,
    pub invalid: bool,
}

impl CompiledBlock {
    /// Size of the guest range in bytes.
    pub fn guest_len(&self) -> u32 {
        self.num_insns * 4
    }

    /// Exclusive physical end of the guest range.
    pub fn phys_end(&self) -> u32 {
        self.phys_address.wrapping_add(self.guest_len())
    }

    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        self.phys_address < end && self.phys_end() > start
    }
}

/// Incremental checksum over fetched instruction words.
pub struct BlockChecksum(Xxh3);

impl Default for BlockChecksum {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockChecksum {
    pub fn new() -> Self {
        Self(Xxh3::new())
    }

    pub fn push(&mut self, word: u32) {
        self.0.update(&word.to_be_bytes());
    }

    pub fn finish(&self) -> u64 {
        self.0.digest()
    }
}

/// Checksum of a complete word sequence.
pub fn checksum_words(words: &[u32]) -> u64 {
    let mut h = BlockChecksum::new();
    for &w in words {
        h.push(w);
    }
    h.finish()
}
