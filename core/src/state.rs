//! Architectural state of the Gekko integer core.
//!
//! `CpuState` is the single mutable context shared between the
//! dispatcher, translated blocks, timing callbacks and exception
//! delivery. Translated code addresses its fields through
//! [`GlobalReg`](crate::temp::GlobalReg).

use bitflags::bitflags;

use crate::temp::GlobalReg;

pub const NUM_GPRS: usize = 32;
pub const NUM_SPRS: usize = 1024;

// -- SPR numbers --
pub const SPR_XER: usize = 1;
pub const SPR_LR: usize = 8;
pub const SPR_CTR: usize = 9;
pub const SPR_DSISR: usize = 18;
pub const SPR_DAR: usize = 19;
pub const SPR_DEC: usize = 22;
pub const SPR_SRR0: usize = 26;
pub const SPR_SRR1: usize = 27;
pub const SPR_SPRG0: usize = 272;
pub const SPR_PVR: usize = 287;

/// Processor version register value reported by a Gekko.
pub const GEKKO_PVR: u32 = 0x0008_3214;

// -- XER bits --
pub const XER_SO: u32 = 0x8000_0000;
pub const XER_OV: u32 = 0x4000_0000;
pub const XER_CA: u32 = 0x2000_0000;

// -- MSR bits --
pub const MSR_ILE: u32 = 0x0001_0000;
pub const MSR_EE: u32 = 0x0000_8000;
pub const MSR_PR: u32 = 0x0000_4000;
pub const MSR_FP: u32 = 0x0000_2000;
pub const MSR_ME: u32 = 0x0000_1000;
pub const MSR_IP: u32 = 0x0000_0040;
pub const MSR_IR: u32 = 0x0000_0020;
pub const MSR_DR: u32 = 0x0000_0010;
pub const MSR_RI: u32 = 0x0000_0002;
pub const MSR_LE: u32 = 0x0000_0001;

// -- CR field bits (within a 4-bit field) --
pub const CR_LT: u32 = 0x8;
pub const CR_GT: u32 = 0x4;
pub const CR_EQ: u32 = 0x2;
pub const CR_SO: u32 = 0x1;

bitflags! {
    /// Pending exception causes, in the Gekko `Exceptions` word layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExceptionFlags: u32 {
        const DECREMENTER = 0x0001;
        const SYSCALL = 0x0002;
        const EXTERNAL_INT = 0x0004;
        const DSI = 0x0008;
        const ISI = 0x0010;
        const ALIGNMENT = 0x0020;
        const FPU_UNAVAILABLE = 0x0040;
        const PROGRAM = 0x0080;
        const PERFORMANCE_MONITOR = 0x0100;

        /// Causes delivered regardless of MSR.EE.
        const SYNCHRONOUS = Self::SYSCALL.bits()
            | Self::DSI.bits()
            | Self::ISI.bits()
            | Self::ALIGNMENT.bits()
            | Self::FPU_UNAVAILABLE.bits()
            | Self::PROGRAM.bits();
        /// Causes gated by MSR.EE.
        const EXTERNAL = Self::DECREMENTER.bits()
            | Self::EXTERNAL_INT.bits()
            | Self::PERFORMANCE_MONITOR.bits();
    }
}

/// Guest CPU register file plus dispatch bookkeeping.
#[derive(Clone, PartialEq, Eq)]
#[repr(C)]
pub struct CpuState {
    pub gpr: [u32; NUM_GPRS],
    pub pc: u32,
    pub npc: u32,
    pub cr: u32,
    pub msr: u32,
    pub spr: [u32; NUM_SPRS],
    pub exceptions: ExceptionFlags,
    /// Remaining cycles in the current timing slice.
    pub downcount: i32,
}

impl CpuState {
    pub fn new() -> Self {
        let mut spr = [0u32; NUM_SPRS];
        spr[SPR_PVR] = GEKKO_PVR;
        Self {
            gpr: [0; NUM_GPRS],
            pc: 0,
            npc: 0,
            cr: 0,
            msr: 0,
            spr,
            exceptions: ExceptionFlags::empty(),
            downcount: 0,
        }
    }

    /// Reset to the power-on state with execution at `pc`.
    pub fn reset(&mut self, pc: u32) {
        *self = Self::new();
        self.pc = pc;
        self.npc = pc;
    }

    pub fn lr(&self) -> u32 {
        self.spr[SPR_LR]
    }

    pub fn set_lr(&mut self, v: u32) {
        self.spr[SPR_LR] = v;
    }

    pub fn ctr(&self) -> u32 {
        self.spr[SPR_CTR]
    }

    pub fn set_ctr(&mut self, v: u32) {
        self.spr[SPR_CTR] = v;
    }

    pub fn xer(&self) -> u32 {
        self.spr[SPR_XER]
    }

    pub fn set_xer(&mut self, v: u32) {
        self.spr[SPR_XER] = v;
    }

    pub fn xer_ca(&self) -> bool {
        self.xer() & XER_CA != 0
    }

    /// Read the 4-bit CR field `crf` (0 = CR0, most significant).
    pub fn cr_field(&self, crf: u32) -> u32 {
        (self.cr >> ((7 - crf) * 4)) & 0xF
    }

    pub fn set_cr_field(&mut self, crf: u32, val: u32) {
        let shift = (7 - crf) * 4;
        self.cr = (self.cr & !(0xF << shift)) | ((val & 0xF) << shift);
    }

    /// Read a global register slot as translated code sees it.
    #[inline]
    pub fn reg(&self, r: GlobalReg) -> u32 {
        match r {
            GlobalReg::Gpr(n) => self.gpr[n as usize],
            GlobalReg::Spr(n) => self.spr[n as usize],
            GlobalReg::Cr => self.cr,
            GlobalReg::Msr => self.msr,
            GlobalReg::Pc => self.pc,
            GlobalReg::Npc => self.npc,
        }
    }

    #[inline]
    pub fn set_reg(&mut self, r: GlobalReg, v: u32) {
        match r {
            GlobalReg::Gpr(n) => self.gpr[n as usize] = v,
            GlobalReg::Spr(n) => self.spr[n as usize] = v,
            GlobalReg::Cr => self.cr = v,
            GlobalReg::Msr => self.msr = v,
            GlobalReg::Pc => self.pc = v,
            GlobalReg::Npc => self.npc = v,
        }
    }

    /// Record a data storage fault at `addr`.
    pub fn raise_dsi(&mut self, addr: u32, is_store: bool) {
        let mut dsisr = 1 << 30;
        if is_store {
            dsisr |= 1 << 25;
        }
        self.spr[SPR_DSISR] = dsisr;
        self.spr[SPR_DAR] = addr;
        self.exceptions |= ExceptionFlags::DSI;
    }
}

impl Default for CpuState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpuState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuState")
            .field("pc", &format_args!("{:#010x}", self.pc))
            .field("npc", &format_args!("{:#010x}", self.npc))
            .field("msr", &format_args!("{:#010x}", self.msr))
            .field("cr", &format_args!("{:#010x}", self.cr))
            .field("lr", &format_args!("{:#010x}", self.lr()))
            .field("ctr", &format_args!("{:#010x}", self.ctr()))
            .field("xer", &format_args!("{:#010x}", self.xer()))
            .field("gpr", &self.gpr)
            .field("exceptions", &self.exceptions)
            .field("downcount", &self.downcount)
            .finish()
    }
}

impl std::fmt::Display for CpuState {
    /// Register dump in the layout used by the runner.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "pc  {:08x}  msr {:08x}  cr  {:08x}  lr  {:08x}  ctr {:08x}  xer {:08x}",
            self.pc,
            self.msr,
            self.cr,
            self.lr(),
            self.ctr(),
            self.xer()
        )?;
        for row in 0..8 {
            for col in 0..4 {
                let r = row * 4 + col;
                write!(f, "r{r:<2} {:08x}  ", self.gpr[r])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
