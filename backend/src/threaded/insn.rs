//! Lowered host instructions for the threaded backend.

use std::fmt;

use ppc_core::{Cond, ExitKind, GlobalReg, MemOp, Opcode};

/// Operand location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loc {
    /// Guest register in `CpuState`.
    Reg(GlobalReg),
    /// Frame slot of a block-local temp.
    Local(u32),
    Imm(u32),
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loc::Reg(r) => write!(f, "{r}"),
            Loc::Local(n) => write!(f, "[fp+{n}]"),
            Loc::Imm(v) => write!(f, "${v:#x}"),
        }
    }
}

/// One threaded-code instruction. Branch targets are absolute
/// code-buffer offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostInsn {
    /// Block prologue: size the local frame.
    Enter { frame_size: u32 },
    /// Start of a guest instruction; used to attribute faults.
    InsnStart { pc: u32, cost: u32 },
    Mov { d: Loc, a: Loc },
    Binary { opc: Opcode, d: Loc, a: Loc, b: Loc },
    Unary { opc: Opcode, d: Loc, a: Loc },
    SetCond { cond: Cond, d: Loc, a: Loc, b: Loc },
    Load { memop: MemOp, d: Loc, addr: Loc },
    Store { memop: MemOp, val: Loc, addr: Loc },
    Jump { target: usize },
    BrCond { cond: Cond, a: Loc, b: Loc, target: usize },
    /// Charge `cost` and return to the dispatcher.
    Exit { kind: ExitKind, val: Loc, cost: u32 },
}

impl HostInsn {
    /// Whether this instruction carries a patchable branch target.
    pub fn is_branch(&self) -> bool {
        matches!(self, HostInsn::Jump { .. } | HostInsn::BrCond { .. })
    }
}

impl fmt::Display for HostInsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HostInsn::Enter { frame_size } => write!(f, "enter {frame_size}"),
            HostInsn::InsnStart { pc, cost } => write!(f, "---- {pc:#010x} (cost {cost})"),
            HostInsn::Mov { d, a } => write!(f, "mov {d}, {a}"),
            HostInsn::Binary { opc, d, a, b } => {
                write!(f, "{} {d}, {a}, {b}", opc.def().name)
            }
            HostInsn::Unary { opc, d, a } => write!(f, "{} {d}, {a}", opc.def().name),
            HostInsn::SetCond { cond, d, a, b } => {
                write!(f, "set{} {d}, {a}, {b}", cond.name())
            }
            HostInsn::Load { memop, d, addr } => write!(f, "ld{} {d}, ({addr})", memop.name()),
            HostInsn::Store { memop, val, addr } => {
                write!(f, "st{} {val}, ({addr})", memop.name())
            }
            HostInsn::Jump { target } => write!(f, "jmp @{target}"),
            HostInsn::BrCond { cond, a, b, target } => {
                write!(f, "b{} {a}, {b}, @{target}", cond.name())
            }
            HostInsn::Exit { kind, val, cost } => {
                write!(f, "exit {} {val} (cost {cost})", kind.name())
            }
        }
    }
}
