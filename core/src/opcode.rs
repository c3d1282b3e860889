/// IR opcodes. All integer ops work on 32-bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // -- Data movement --
    Mov = 0,
    SetCond,

    // -- Arithmetic --
    Add,
    Sub,
    Mul,
    MulSH, // signed multiply high
    MulUH, // unsigned multiply high
    DivS,
    DivU,
    Neg,

    // -- Logic --
    And,
    Or,
    Xor,
    Not,
    AndC, // a & ~b
    OrC,  // a | ~b
    Eqv,  // ~(a ^ b)
    Nand,
    Nor,

    // -- Shift/rotate --
    Shl,
    Shr,
    Sar,
    RotL,

    // -- Bit counting / extension --
    Clz,
    Ext8S,
    Ext16S,

    // -- Guest memory access --
    Ld,
    St,

    // -- Control flow --
    Br,
    BrCond,
    SetLabel,
    ExitTb,

    // -- Misc --
    Nop,
    InsnStart,
}

/// Opcode property flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpFlags(u16);

impl OpFlags {
    pub const NONE: OpFlags = OpFlags(0);
    /// Leaves the block.
    pub const BB_EXIT: OpFlags = OpFlags(0x01);
    /// Ends a basic block (next op starts a new BB).
    pub const BB_END: OpFlags = OpFlags(0x02);
    /// Has side effects, never removed.
    pub const SIDE_EFFECTS: OpFlags = OpFlags(0x04);
    /// May fault on guest memory.
    pub const MEM: OpFlags = OpFlags(0x08);
    pub const COND_BRANCH: OpFlags = OpFlags(0x10);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: OpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: OpFlags) -> Self {
        Self(self.0 | other.0)
    }
}

/// Static opcode definition: argument counts and flags.
#[derive(Debug)]
pub struct OpDef {
    pub name: &'static str,
    pub nb_oargs: u8,
    pub nb_iargs: u8,
    pub nb_cargs: u8,
    pub flags: OpFlags,
}

impl OpDef {
    pub const fn nb_args(&self) -> u8 {
        self.nb_oargs + self.nb_iargs + self.nb_cargs
    }
}

const N: OpFlags = OpFlags::NONE;
const SE: OpFlags = OpFlags::SIDE_EFFECTS;
const BE: OpFlags = OpFlags::BB_END;
const BX: OpFlags = OpFlags::BB_EXIT;
const CB: OpFlags = OpFlags::COND_BRANCH;
const MEM: OpFlags = OpFlags::MEM;

const fn def(name: &'static str, o: u8, i: u8, c: u8, flags: OpFlags) -> OpDef {
    OpDef {
        name,
        nb_oargs: o,
        nb_iargs: i,
        nb_cargs: c,
        flags,
    }
}

/// Indexed by `Opcode as usize`.
pub static OPCODE_DEFS: [OpDef; 34] = [
    def("mov", 1, 1, 0, N),
    def("setcond", 1, 2, 1, N),
    def("add", 1, 2, 0, N),
    def("sub", 1, 2, 0, N),
    def("mul", 1, 2, 0, N),
    def("mulsh", 1, 2, 0, N),
    def("muluh", 1, 2, 0, N),
    def("divs", 1, 2, 0, N),
    def("divu", 1, 2, 0, N),
    def("neg", 1, 1, 0, N),
    def("and", 1, 2, 0, N),
    def("or", 1, 2, 0, N),
    def("xor", 1, 2, 0, N),
    def("not", 1, 1, 0, N),
    def("andc", 1, 2, 0, N),
    def("orc", 1, 2, 0, N),
    def("eqv", 1, 2, 0, N),
    def("nand", 1, 2, 0, N),
    def("nor", 1, 2, 0, N),
    def("shl", 1, 2, 0, N),
    def("shr", 1, 2, 0, N),
    def("sar", 1, 2, 0, N),
    def("rotl", 1, 2, 0, N),
    def("clz", 1, 1, 0, N),
    def("ext8s", 1, 1, 0, N),
    def("ext16s", 1, 1, 0, N),
    // ld: dst, addr, memop
    def("ld", 1, 1, 1, OpFlags(SE.0 | MEM.0)),
    // st: val, addr, memop
    def("st", 0, 2, 1, OpFlags(SE.0 | MEM.0)),
    def("br", 0, 0, 1, OpFlags(BE.0 | SE.0)),
    // brcond: a, b, cond, label
    def("brcond", 0, 2, 2, OpFlags(BE.0 | CB.0 | SE.0)),
    def("set_label", 0, 0, 1, OpFlags(BE.0 | SE.0)),
    // exit_tb: value, kind, cost
    def("exit_tb", 0, 1, 2, OpFlags(BE.0 | BX.0 | SE.0)),
    def("nop", 0, 0, 0, N),
    // insn_start: pc, cost through this insn
    def("insn_start", 0, 0, 2, SE),
];

impl Opcode {
    /// Look up the static definition for this opcode.
    pub fn def(self) -> &'static OpDef {
        &OPCODE_DEFS[self as usize]
    }

    pub fn is_binary_alu(self) -> bool {
        self.def().nb_oargs == 1 && self.def().nb_iargs == 2 && self.def().nb_cargs == 0
    }

    pub fn is_unary_alu(self) -> bool {
        matches!(
            self,
            Opcode::Mov | Opcode::Neg | Opcode::Not | Opcode::Clz | Opcode::Ext8S | Opcode::Ext16S
        )
    }

    /// Evaluate a two-operand ALU op.
    ///
    /// Shift amounts use the low six bits; amounts of 32 or more shift
    /// everything out. Division by zero and `i32::MIN / -1` produce the
    /// Gekko result (all ones for a negative signed dividend, else zero).
    #[inline]
    pub fn eval_binary(self, a: u32, b: u32) -> Option<u32> {
        Some(match self {
            Opcode::Add => a.wrapping_add(b),
            Opcode::Sub => a.wrapping_sub(b),
            Opcode::Mul => a.wrapping_mul(b),
            Opcode::MulSH => (((a as i32 as i64) * (b as i32 as i64)) >> 32) as u32,
            Opcode::MulUH => (((a as u64) * (b as u64)) >> 32) as u32,
            Opcode::DivS => {
                let (sa, sb) = (a as i32, b as i32);
                if sb == 0 || (sa == i32::MIN && sb == -1) {
                    if sa < 0 {
                        u32::MAX
                    } else {
                        0
                    }
                } else {
                    (sa / sb) as u32
                }
            }
            Opcode::DivU => a.checked_div(b).unwrap_or(0),
            Opcode::And => a & b,
            Opcode::Or => a | b,
            Opcode::Xor => a ^ b,
            Opcode::AndC => a & !b,
            Opcode::OrC => a | !b,
            Opcode::Eqv => !(a ^ b),
            Opcode::Nand => !(a & b),
            Opcode::Nor => !(a | b),
            Opcode::Shl => {
                let n = b & 0x3F;
                if n >= 32 {
                    0
                } else {
                    a << n
                }
            }
            Opcode::Shr => {
                let n = b & 0x3F;
                if n >= 32 {
                    0
                } else {
                    a >> n
                }
            }
            Opcode::Sar => {
                let n = (b & 0x3F).min(31);
                ((a as i32) >> n) as u32
            }
            Opcode::RotL => a.rotate_left(b & 31),
            _ => return None,
        })
    }

    #[inline]
    pub fn eval_unary(self, a: u32) -> Option<u32> {
        Some(match self {
            Opcode::Mov => a,
            Opcode::Neg => a.wrapping_neg(),
            Opcode::Not => !a,
            Opcode::Clz => a.leading_zeros(),
            Opcode::Ext8S => a as u8 as i8 as i32 as u32,
            Opcode::Ext16S => a as u16 as i16 as i32 as u32,
            _ => return None,
        })
    }
}
