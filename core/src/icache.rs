//! Instruction-cache tag tables: direct-mapped `pc -> block index` maps.
//!
//! Three regions are kept apart (main RAM, the virtual-memory window and
//! extended RAM), each indexed by `(pc & mask) >> 2`. Collisions
//! overwrite the slot; there is no chaining. Tables are paged and
//! allocated on first insert, so untouched address ranges cost nothing.

use serde::{Deserialize, Serialize};

/// Marker stored in an empty slot.
pub const NOT_FOUND: u32 = u32::MAX;

/// PC bit selecting the virtual-memory window table.
pub const VMEM_BIT: u32 = 0x2000_0000;
/// PC bit selecting the extended-RAM table (extended-RAM platforms only).
pub const EXRAM_BIT: u32 = 0x1000_0000;

const PAGE_SHIFT: u32 = 12;
const PAGE_ENTRIES: usize = 1 << PAGE_SHIFT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IcacheRegion {
    Ram = 0,
    Vmem = 1,
    ExRam = 2,
}

impl IcacheRegion {
    pub const ALL: [IcacheRegion; 3] = [Self::Ram, Self::Vmem, Self::ExRam];
}

/// Masks applied to a PC before indexing each region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcacheGeometry {
    pub ram_mask: u32,
    pub vmem_mask: u32,
    pub exram_mask: u32,
}

impl Default for IcacheGeometry {
    fn default() -> Self {
        Self {
            ram_mask: 0x01FF_FFFF,
            vmem_mask: 0x01FF_FFFF,
            exram_mask: 0x03FF_FFFF,
        }
    }
}

impl IcacheGeometry {
    pub fn mask(&self, region: IcacheRegion) -> u32 {
        match region {
            IcacheRegion::Ram => self.ram_mask,
            IcacheRegion::Vmem => self.vmem_mask,
            IcacheRegion::ExRam => self.exram_mask,
        }
    }
}

struct RegionTable {
    mask: u32,
    pages: Vec<Option<Box<[u32]>>>,
}

impl RegionTable {
    fn new(mask: u32) -> Self {
        let entries = ((mask >> 2) as usize) + 1;
        let npages = entries.div_ceil(PAGE_ENTRIES);
        Self {
            mask,
            pages: (0..npages).map(|_| None).collect(),
        }
    }

    #[inline]
    fn slot_of(&self, pc: u32) -> (usize, usize) {
        let idx = ((pc & self.mask) >> 2) as usize;
        (idx >> PAGE_SHIFT, idx & (PAGE_ENTRIES - 1))
    }

    fn get(&self, pc: u32) -> u32 {
        let (page, off) = self.slot_of(pc);
        match &self.pages[page] {
            Some(p) => p[off],
            None => NOT_FOUND,
        }
    }

    fn set(&mut self, pc: u32, val: u32) {
        let (page, off) = self.slot_of(pc);
        let p = self.pages[page]
            .get_or_insert_with(|| vec![NOT_FOUND; PAGE_ENTRIES].into_boxed_slice());
        p[off] = val;
    }

    fn clear_slot(&mut self, pc: u32) {
        let (page, off) = self.slot_of(pc);
        if let Some(p) = &mut self.pages[page] {
            p[off] = NOT_FOUND;
        }
    }

    fn reset(&mut self) {
        for p in &mut self.pages {
            *p = None;
        }
    }
}

/// The three-region tag table.
pub struct ICacheTagTable {
    regions: [RegionTable; 3],
    extended_ram: bool,
}

impl ICacheTagTable {
    pub fn new(geometry: IcacheGeometry, extended_ram: bool) -> Self {
        Self {
            regions: IcacheRegion::ALL.map(|r| RegionTable::new(geometry.mask(r))),
            extended_ram,
        }
    }

    /// Select the table for `pc`, or `None` when the address is not
    /// cacheable on this platform.
    pub fn region_of(&self, pc: u32) -> Option<IcacheRegion> {
        if pc & VMEM_BIT != 0 {
            Some(IcacheRegion::Vmem)
        } else if pc & EXRAM_BIT != 0 {
            self.extended_ram.then_some(IcacheRegion::ExRam)
        } else {
            Some(IcacheRegion::Ram)
        }
    }

    /// Slot index of `pc` inside its region.
    pub fn index_of(&self, pc: u32) -> Option<(IcacheRegion, u32)> {
        let region = self.region_of(pc)?;
        Some((region, (pc & self.regions[region as usize].mask) >> 2))
    }

    #[inline]
    pub fn lookup(&self, pc: u32) -> Option<u32> {
        let region = self.region_of(pc)?;
        match self.regions[region as usize].get(pc) {
            NOT_FOUND => None,
            idx => Some(idx),
        }
    }

    /// Point the slot for `pc` at `block`, overwriting any previous entry.
    pub fn insert(&mut self, pc: u32, block: u32) {
        if let Some(region) = self.region_of(pc) {
            self.regions[region as usize].set(pc, block);
        }
    }

    /// Clear the slot for `pc` only if it still references `block`.
    pub fn remove_if(&mut self, pc: u32, block: u32) -> bool {
        let Some(region) = self.region_of(pc) else {
            return false;
        };
        let table = &mut self.regions[region as usize];
        if table.get(pc) == block {
            table.clear_slot(pc);
            true
        } else {
            false
        }
    }

    /// Clear every slot covering `[start, start + len)`.
    pub fn invalidate(&mut self, start: u32, len: u32) {
        let first = start & !3;
        let end = start as u64 + len as u64;
        let mut pc = first as u64;
        while pc < end {
            let addr = pc as u32;
            if let Some(region) = self.region_of(addr) {
                self.regions[region as usize].clear_slot(addr);
            }
            pc += 4;
        }
    }

    pub fn reset(&mut self) {
        for r in &mut self.regions {
            r.reset();
        }
    }

    pub fn extended_ram(&self) -> bool {
        self.extended_ram
    }
}
