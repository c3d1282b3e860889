//! Guest memory and address translation.
//!
//! [`GuestMemory`] is the interface the translator, the backend and the
//! dispatcher use to reach guest storage. [`Memory`] implements the
//! GameCube/Wii physical map with a fixed-window fast path and a
//! host-installed page table for the `0x7E00_0000` window.

use std::collections::HashMap;

use ppc_core::AddressingMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default main RAM size: 24 MiB.
pub const DEFAULT_RAM_SIZE: usize = 0x0180_0000;
/// Default extended RAM size: 64 MiB.
pub const DEFAULT_EXRAM_SIZE: usize = 0x0400_0000;
/// Physical base of extended RAM.
pub const EXRAM_BASE: u32 = 0x1000_0000;

pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;
const PAGE_MASK: u32 = PAGE_SIZE - 1;

/// Page-table translated window.
pub const PAGED_WINDOW_START: u32 = 0x7E00_0000;
pub const PAGED_WINDOW_END: u32 = 0x8000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    Fetch,
}

impl Access {
    /// Whether translation is on for this access under `mode`.
    pub fn translated(self, mode: AddressingMode) -> bool {
        match self {
            Access::Fetch => mode.insn_translation(),
            Access::Read | Access::Write => mode.data_translation(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemFault {
    #[error("no translation for {access:?} at {addr:#010x}")]
    NoTranslation { addr: u32, access: Access },
    #[error("{access:?} of {size} bytes at physical {phys:#010x} is outside guest memory")]
    Unmapped { phys: u32, size: u32, access: Access },
}

impl MemFault {
    pub fn access(&self) -> Access {
        match *self {
            MemFault::NoTranslation { access, .. } | MemFault::Unmapped { access, .. } => access,
        }
    }
}

/// Guest memory as seen by the JIT.
///
/// All multi-byte accesses are big-endian. Addresses are effective
/// addresses, translated according to `mode`.
pub trait GuestMemory: Send {
    fn translate_address(
        &self,
        addr: u32,
        access: Access,
        mode: AddressingMode,
    ) -> Result<u32, MemFault>;

    fn read_u8(&self, addr: u32, mode: AddressingMode) -> Result<u8, MemFault>;
    fn read_u16(&self, addr: u32, mode: AddressingMode) -> Result<u16, MemFault>;
    fn read_u32(&self, addr: u32, mode: AddressingMode) -> Result<u32, MemFault>;

    fn write_u8(&mut self, addr: u32, val: u8, mode: AddressingMode) -> Result<(), MemFault>;
    fn write_u16(&mut self, addr: u32, val: u16, mode: AddressingMode) -> Result<(), MemFault>;
    fn write_u32(&mut self, addr: u32, val: u32, mode: AddressingMode) -> Result<(), MemFault>;

    /// Fetch one instruction word. Uses instruction translation.
    fn fetch_insn(&self, addr: u32, mode: AddressingMode) -> Result<u32, MemFault>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub ram_size: usize,
    pub exram_size: usize,
    pub extended_ram: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ram_size: DEFAULT_RAM_SIZE,
            exram_size: DEFAULT_EXRAM_SIZE,
            extended_ram: false,
        }
    }
}

/// Flat big-endian guest memory with the console address map.
pub struct Memory {
    ram: Vec<u8>,
    exram: Vec<u8>,
    /// Virtual page number -> physical page number.
    page_table: HashMap<u32, u32>,
}

impl Memory {
    pub fn new(config: &MemoryConfig) -> Self {
        let exram_size = if config.extended_ram {
            config.exram_size
        } else {
            0
        };
        Self {
            ram: vec![0; config.ram_size],
            exram: vec![0; exram_size],
            page_table: HashMap::new(),
        }
    }

    pub fn ram_size(&self) -> usize {
        self.ram.len()
    }

    pub fn has_extended_ram(&self) -> bool {
        !self.exram.is_empty()
    }

    /// Install a 4 KiB mapping in the paged window.
    pub fn map_page(&mut self, vaddr: u32, paddr: u32) {
        debug_assert!((PAGED_WINDOW_START..PAGED_WINDOW_END).contains(&vaddr));
        self.page_table
            .insert(vaddr >> PAGE_SHIFT, paddr >> PAGE_SHIFT);
    }

    pub fn unmap_page(&mut self, vaddr: u32) -> bool {
        self.page_table.remove(&(vaddr >> PAGE_SHIFT)).is_some()
    }

    /// Backing slice for `[phys, phys + len)`, if fully inside one region.
    fn phys_range(&self, phys: u32, len: u32) -> Option<&[u8]> {
        let (buf, off) = self.region(phys)?;
        buf.get(off..off.checked_add(len as usize)?)
    }

    fn phys_range_mut(&mut self, phys: u32, len: u32) -> Option<&mut [u8]> {
        let (is_ex, off) = if phys >= EXRAM_BASE {
            (true, (phys - EXRAM_BASE) as usize)
        } else {
            (false, phys as usize)
        };
        let buf = if is_ex { &mut self.exram } else { &mut self.ram };
        buf.get_mut(off..off.checked_add(len as usize)?)
    }

    fn region(&self, phys: u32) -> Option<(&[u8], usize)> {
        if phys >= EXRAM_BASE {
            Some((&self.exram, (phys - EXRAM_BASE) as usize))
        } else {
            Some((&self.ram, phys as usize))
        }
    }

    /// Copy `data` into physical memory.
    pub fn load(&mut self, phys: u32, data: &[u8]) -> Result<(), MemFault> {
        let dst = self
            .phys_range_mut(phys, data.len() as u32)
            .ok_or(MemFault::Unmapped {
                phys,
                size: data.len() as u32,
                access: Access::Write,
            })?;
        dst.copy_from_slice(data);
        Ok(())
    }

    /// Copy a sequence of big-endian words into physical memory.
    pub fn load_words(&mut self, phys: u32, words: &[u32]) -> Result<(), MemFault> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        self.load(phys, &bytes)
    }

    pub fn read_phys<const N: usize>(&self, phys: u32, access: Access) -> Result<[u8; N], MemFault> {
        let src = self.phys_range(phys, N as u32).ok_or(MemFault::Unmapped {
            phys,
            size: N as u32,
            access,
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(src);
        Ok(out)
    }

    pub fn write_phys<const N: usize>(&mut self, phys: u32, bytes: [u8; N]) -> Result<(), MemFault> {
        let dst = self
            .phys_range_mut(phys, N as u32)
            .ok_or(MemFault::Unmapped {
                phys,
                size: N as u32,
                access: Access::Write,
            })?;
        dst.copy_from_slice(&bytes);
        Ok(())
    }

    fn translate(&self, addr: u32, access: Access) -> Result<u32, MemFault> {
        match addr >> 28 {
            // Cached / uncached BAT windows.
            0x8 | 0x9 | 0xC | 0xD => Ok(addr & 0x3FFF_FFFF),
            _ if (PAGED_WINDOW_START..PAGED_WINDOW_END).contains(&addr) => self
                .page_table
                .get(&(addr >> PAGE_SHIFT))
                .map(|ppn| (ppn << PAGE_SHIFT) | (addr & PAGE_MASK))
                .ok_or(MemFault::NoTranslation { addr, access }),
            _ => Err(MemFault::NoTranslation { addr, access }),
        }
    }

    fn read_be<const N: usize>(
        &self,
        addr: u32,
        access: Access,
        mode: AddressingMode,
    ) -> Result<[u8; N], MemFault> {
        let phys = self.translate_address(addr, access, mode)?;
        self.read_phys::<N>(phys, access)
    }

    fn write_be<const N: usize>(
        &mut self,
        addr: u32,
        bytes: [u8; N],
        mode: AddressingMode,
    ) -> Result<(), MemFault> {
        let phys = self.translate_address(addr, Access::Write, mode)?;
        self.write_phys(phys, bytes)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(&MemoryConfig::default())
    }
}

impl GuestMemory for Memory {
    fn translate_address(
        &self,
        addr: u32,
        access: Access,
        mode: AddressingMode,
    ) -> Result<u32, MemFault> {
        if access.translated(mode) {
            self.translate(addr, access)
        } else {
            Ok(addr)
        }
    }

    fn read_u8(&self, addr: u32, mode: AddressingMode) -> Result<u8, MemFault> {
        Ok(self.read_be::<1>(addr, Access::Read, mode)?[0])
    }

    fn read_u16(&self, addr: u32, mode: AddressingMode) -> Result<u16, MemFault> {
        self.read_be(addr, Access::Read, mode).map(u16::from_be_bytes)
    }

    fn read_u32(&self, addr: u32, mode: AddressingMode) -> Result<u32, MemFault> {
        self.read_be(addr, Access::Read, mode).map(u32::from_be_bytes)
    }

    fn write_u8(&mut self, addr: u32, val: u8, mode: AddressingMode) -> Result<(), MemFault> {
        self.write_be(addr, [val], mode)
    }

    fn write_u16(&mut self, addr: u32, val: u16, mode: AddressingMode) -> Result<(), MemFault> {
        self.write_be(addr, val.to_be_bytes(), mode)
    }

    fn write_u32(&mut self, addr: u32, val: u32, mode: AddressingMode) -> Result<(), MemFault> {
        self.write_be(addr, val.to_be_bytes(), mode)
    }

    fn fetch_insn(&self, addr: u32, mode: AddressingMode) -> Result<u32, MemFault> {
        let word = self.read_be(addr & !3, Access::Fetch, mode).map(u32::from_be_bytes);
        if let Err(fault) = &word {
            tracing::trace!(%fault, "instruction fetch failed");
        }
        word
    }
}
