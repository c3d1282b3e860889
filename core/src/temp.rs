use std::fmt;

/// A guest register slot backed by a `CpuState` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalReg {
    Gpr(u8),
    Spr(u16),
    Cr,
    Msr,
    Pc,
    Npc,
}

impl fmt::Display for GlobalReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalReg::Gpr(n) => write!(f, "r{n}"),
            GlobalReg::Spr(1) => f.write_str("xer"),
            GlobalReg::Spr(8) => f.write_str("lr"),
            GlobalReg::Spr(9) => f.write_str("ctr"),
            GlobalReg::Spr(n) => write!(f, "spr{n}"),
            GlobalReg::Cr => f.write_str("cr"),
            GlobalReg::Msr => f.write_str("msr"),
            GlobalReg::Pc => f.write_str("pc"),
            GlobalReg::Npc => f.write_str("npc"),
        }
    }
}

/// Lifetime/scope of an IR temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TempKind {
    /// Block-local scratch value.
    Ebb,
    /// Persists across blocks, backed by a `CpuState` field.
    Global,
    /// Compile-time constant.
    Const,
}

/// Index into the Context's temp pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempIdx(pub u32);

#[derive(Debug, Clone)]
pub struct Temp {
    pub idx: TempIdx,
    pub kind: TempKind,
    /// For `Const` temps, the immediate value.
    pub val: u32,
    /// For `Global` temps, the register it names.
    pub reg: Option<GlobalReg>,
}

impl Temp {
    pub fn new_ebb(idx: TempIdx) -> Self {
        Self {
            idx,
            kind: TempKind::Ebb,
            val: 0,
            reg: None,
        }
    }

    pub fn new_global(idx: TempIdx, reg: GlobalReg) -> Self {
        Self {
            idx,
            kind: TempKind::Global,
            val: 0,
            reg: Some(reg),
        }
    }

    pub fn new_const(idx: TempIdx, val: u32) -> Self {
        Self {
            idx,
            kind: TempKind::Const,
            val,
            reg: None,
        }
    }

    pub fn is_const(&self) -> bool {
        self.kind == TempKind::Const
    }

    pub fn is_global(&self) -> bool {
        self.kind == TempKind::Global
    }
}
