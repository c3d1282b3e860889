/// Comparison conditions for `SetCond` and `BrCond`, evaluated on
/// 32-bit operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cond {
    Never = 0,
    Always = 1,
    Eq = 8,
    Ne = 9,
    Lt = 10,
    Ge = 11,
    Le = 12,
    Gt = 13,
    Ltu = 14,
    Geu = 15,
    Leu = 16,
    Gtu = 17,
    /// `(a & b) == 0`
    TstEq = 18,
    /// `(a & b) != 0`
    TstNe = 19,
}

impl Cond {
    pub fn from_u32(v: u32) -> Option<Cond> {
        Some(match v {
            0 => Cond::Never,
            1 => Cond::Always,
            8 => Cond::Eq,
            9 => Cond::Ne,
            10 => Cond::Lt,
            11 => Cond::Ge,
            12 => Cond::Le,
            13 => Cond::Gt,
            14 => Cond::Ltu,
            15 => Cond::Geu,
            16 => Cond::Leu,
            17 => Cond::Gtu,
            18 => Cond::TstEq,
            19 => Cond::TstNe,
            _ => return None,
        })
    }

    pub fn invert(self) -> Cond {
        match self {
            Cond::Never => Cond::Always,
            Cond::Always => Cond::Never,
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Ge => Cond::Lt,
            Cond::Le => Cond::Gt,
            Cond::Gt => Cond::Le,
            Cond::Ltu => Cond::Geu,
            Cond::Geu => Cond::Ltu,
            Cond::Leu => Cond::Gtu,
            Cond::Gtu => Cond::Leu,
            Cond::TstEq => Cond::TstNe,
            Cond::TstNe => Cond::TstEq,
        }
    }

    #[inline]
    pub fn eval(self, a: u32, b: u32) -> bool {
        match self {
            Cond::Never => false,
            Cond::Always => true,
            Cond::Eq => a == b,
            Cond::Ne => a != b,
            Cond::Lt => (a as i32) < (b as i32),
            Cond::Ge => (a as i32) >= (b as i32),
            Cond::Le => (a as i32) <= (b as i32),
            Cond::Gt => (a as i32) > (b as i32),
            Cond::Ltu => a < b,
            Cond::Geu => a >= b,
            Cond::Leu => a <= b,
            Cond::Gtu => a > b,
            Cond::TstEq => a & b == 0,
            Cond::TstNe => a & b != 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Cond::Never => "never",
            Cond::Always => "always",
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Lt => "lt",
            Cond::Ge => "ge",
            Cond::Le => "le",
            Cond::Gt => "gt",
            Cond::Ltu => "ltu",
            Cond::Geu => "geu",
            Cond::Leu => "leu",
            Cond::Gtu => "gtu",
            Cond::TstEq => "tsteq",
            Cond::TstNe => "tstne",
        }
    }
}

/// Guest memory access width and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemOp {
    U8 = 0,
    U16 = 1,
    /// Halfword, sign-extended to 32 bits.
    S16 = 2,
    U32 = 3,
}

impl MemOp {
    pub fn from_u32(v: u32) -> Option<MemOp> {
        Some(match v {
            0 => MemOp::U8,
            1 => MemOp::U16,
            2 => MemOp::S16,
            3 => MemOp::U32,
            _ => return None,
        })
    }

    pub fn size(self) -> u32 {
        match self {
            MemOp::U8 => 1,
            MemOp::U16 | MemOp::S16 => 2,
            MemOp::U32 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MemOp::U8 => "ub",
            MemOp::U16 => "uw",
            MemOp::S16 => "sw",
            MemOp::U32 => "ul",
        }
    }
}

/// Why a block returned to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExitKind {
    /// `pc` holds the next guest address.
    Branch = 0,
    /// Exception causes were raised; `pc`/`npc` are set for delivery.
    Exception = 1,
    /// MSR changed (`mtmsr`, `rfi`); external interrupts must be rechecked.
    CheckExternal = 2,
    /// Call into the HLE hook whose id is the exit value.
    Hle = 3,
    /// `icbi`: invalidate the cache line holding the exit value.
    InvalidateLine = 4,
}

impl ExitKind {
    pub fn from_u32(v: u32) -> Option<ExitKind> {
        Some(match v {
            0 => ExitKind::Branch,
            1 => ExitKind::Exception,
            2 => ExitKind::CheckExternal,
            3 => ExitKind::Hle,
            4 => ExitKind::InvalidateLine,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ExitKind::Branch => "branch",
            ExitKind::Exception => "exception",
            ExitKind::CheckExternal => "check_external",
            ExitKind::Hle => "hle",
            ExitKind::InvalidateLine => "icbi",
        }
    }
}

/// Result of running one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockExit {
    pub kind: ExitKind,
    pub value: u32,
}

impl BlockExit {
    pub fn new(kind: ExitKind, value: u32) -> Self {
        Self { kind, value }
    }
}
