//! Reference interpreter for the Gekko integer subset.
//!
//! Executes one instruction at a time directly on `CpuState`, sharing
//! the decoder with the translator. Used to cross-check translated code
//! and for host-side debugging.

use ppc_core::state::{SPR_PVR, XER_CA};
use ppc_core::{AddressingMode, CpuState, ExceptionFlags, MemOp, Opcode};
use ppc_memory::{Access, GuestMemory, MemFault};

use super::insn::{
    crm_mask, rotate_mask, ArithOp, ArithUnaryOp, CrOp, Ea, Insn, LogicImmOp, LogicOp, UnaryOp,
};

/// Outcome of one interpreted instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpExit {
    /// `pc` holds the next instruction.
    Continue,
    /// Exception causes are pending in `state.exceptions`.
    Exception(ExceptionFlags),
    /// MSR changed; external interrupts must be rechecked.
    CheckExternal,
    /// `icbi` on the given effective address.
    InvalidateLine(u32),
}

fn eval(op: Opcode, a: u32, b: u32) -> u32 {
    op.eval_binary(a, b).unwrap_or(0)
}

fn compare(state: &CpuState, a: u32, b: u32, signed: bool) -> u32 {
    let (lt, gt) = if signed {
        ((a as i32) < (b as i32), (a as i32) > (b as i32))
    } else {
        (a < b, a > b)
    };
    ((lt as u32) << 3) | ((gt as u32) << 2) | (((a == b) as u32) << 1) | (state.xer() >> 31)
}

fn record(state: &mut CpuState, val: u32) {
    let f = compare(state, val, 0, true);
    state.set_cr_field(0, f);
}

fn set_ca(state: &mut CpuState, ca: bool) {
    let xer = (state.xer() & !XER_CA) | ((ca as u32) << 29);
    state.set_xer(xer);
}

fn add_carry(a: u32, b: u32, ca_in: bool) -> (u32, bool) {
    let (t, c1) = a.overflowing_add(b);
    let (r, c2) = t.overflowing_add(ca_in as u32);
    (r, c1 || c2)
}

fn base(state: &CpuState, ra: u8) -> u32 {
    if ra == 0 {
        0
    } else {
        state.gpr[ra as usize]
    }
}

fn effective_address(state: &CpuState, ra: u8, ea: Ea) -> u32 {
    match ea {
        Ea::Disp(d) => base(state, ra).wrapping_add(d as i32 as u32),
        Ea::Indexed(rb) => base(state, ra).wrapping_add(state.gpr[rb as usize]),
    }
}

/// A failed data access at effective address `addr`.
struct DataFault {
    addr: u32,
    store: bool,
}

impl DataFault {
    fn at(addr: u32) -> impl FnOnce(MemFault) -> DataFault {
        move |fault| DataFault {
            addr,
            store: fault.access() == Access::Write,
        }
    }
}

fn load(mem: &dyn GuestMemory, op: MemOp, addr: u32, mode: AddressingMode) -> Result<u32, DataFault> {
    let val = match op {
        MemOp::U8 => mem.read_u8(addr, mode).map(u32::from),
        MemOp::U16 => mem.read_u16(addr, mode).map(u32::from),
        MemOp::S16 => mem.read_u16(addr, mode).map(|v| v as i16 as i32 as u32),
        MemOp::U32 => mem.read_u32(addr, mode),
    };
    val.map_err(DataFault::at(addr))
}

fn store(
    mem: &mut dyn GuestMemory,
    op: MemOp,
    addr: u32,
    val: u32,
    mode: AddressingMode,
) -> Result<(), DataFault> {
    let res = match op {
        MemOp::U8 => mem.write_u8(addr, val as u8, mode),
        MemOp::U16 | MemOp::S16 => mem.write_u16(addr, val as u16, mode),
        MemOp::U32 => mem.write_u32(addr, val, mode),
    };
    res.map_err(DataFault::at(addr))
}

/// Whether a `bc`-family branch is taken. Decrements CTR as BO says.
fn branch_taken(state: &mut CpuState, bo: u8, bi: u8) -> bool {
    if bo & 0x04 == 0 {
        state.set_ctr(state.ctr().wrapping_sub(1));
    }
    let ctr_ok = bo & 0x04 != 0 || ((state.ctr() != 0) ^ (bo & 0x02 != 0));
    let bit = (state.cr >> (31 - bi as u32)) & 1 != 0;
    let cond_ok = bo & 0x10 != 0 || bit == (bo & 0x08 != 0);
    ctr_ok && cond_ok
}

/// Execute the instruction at `state.pc`.
///
/// Charges the instruction's cost to `downcount` unless it takes a data
/// fault. Faults and program exceptions leave `pc` at the faulting
/// instruction with the cause recorded in `state.exceptions`; delivery is
/// left to the caller.
pub fn step(state: &mut CpuState, mem: &mut dyn GuestMemory) -> InterpExit {
    let mode = AddressingMode::from_msr(state.msr);
    let pc = state.pc;
    let word = match mem.fetch_insn(pc, mode) {
        Ok(w) => w,
        Err(_) => {
            state.npc = pc;
            state.exceptions |= ExceptionFlags::ISI;
            return InterpExit::Exception(ExceptionFlags::ISI);
        }
    };
    let insn = Insn::decode(word);
    let next = pc.wrapping_add(4);

    state.pc = next;
    let exit = match execute(state, mem, insn, pc, mode) {
        Ok(Some(exit)) => exit,
        Ok(None) => {
            state.npc = state.pc;
            InterpExit::Continue
        }
        Err(fault) => {
            state.pc = pc;
            state.npc = pc;
            state.raise_dsi(fault.addr, fault.store);
            return InterpExit::Exception(ExceptionFlags::DSI);
        }
    };
    state.downcount -= insn.cost() as i32;
    exit
}

/// Returns `Some` for instructions that end with a non-sequential exit.
/// `state.pc` already holds the fall-through address; taken branches
/// overwrite it and return `None`.
fn execute(
    state: &mut CpuState,
    mem: &mut dyn GuestMemory,
    insn: Insn,
    pc: u32,
    mode: AddressingMode,
) -> Result<Option<InterpExit>, DataFault> {
    let next = pc.wrapping_add(4);
    match insn {
        Insn::Addi { rd, ra, simm } => {
            state.gpr[rd as usize] = base(state, ra).wrapping_add(simm as i32 as u32);
        }
        Insn::Addis { rd, ra, simm } => {
            state.gpr[rd as usize] = base(state, ra).wrapping_add((simm as i32 as u32) << 16);
        }
        Insn::Addic { rd, ra, simm, rc } => {
            let (r, ca) = add_carry(state.gpr[ra as usize], simm as i32 as u32, false);
            set_ca(state, ca);
            state.gpr[rd as usize] = r;
            if rc {
                record(state, r);
            }
        }
        Insn::Subfic { rd, ra, simm } => {
            let imm = simm as i32 as u32;
            let a = state.gpr[ra as usize];
            set_ca(state, imm >= a);
            state.gpr[rd as usize] = imm.wrapping_sub(a);
        }
        Insn::Mulli { rd, ra, simm } => {
            state.gpr[rd as usize] = state.gpr[ra as usize].wrapping_mul(simm as i32 as u32);
        }
        Insn::Cmpi { crf, ra, simm } => {
            let f = compare(state, state.gpr[ra as usize], simm as i32 as u32, true);
            state.set_cr_field(crf as u32, f);
        }
        Insn::Cmpli { crf, ra, uimm } => {
            let f = compare(state, state.gpr[ra as usize], uimm as u32, false);
            state.set_cr_field(crf as u32, f);
        }
        Insn::Cmp { crf, ra, rb } => {
            let f = compare(state, state.gpr[ra as usize], state.gpr[rb as usize], true);
            state.set_cr_field(crf as u32, f);
        }
        Insn::Cmpl { crf, ra, rb } => {
            let f = compare(state, state.gpr[ra as usize], state.gpr[rb as usize], false);
            state.set_cr_field(crf as u32, f);
        }
        Insn::LogicImm { op, ra, rs, uimm } => {
            let s = state.gpr[rs as usize];
            let imm = uimm as u32;
            let r = match op {
                LogicImmOp::Ori => s | imm,
                LogicImmOp::Oris => s | (imm << 16),
                LogicImmOp::Xori => s ^ imm,
                LogicImmOp::Xoris => s ^ (imm << 16),
                LogicImmOp::Andi => s & imm,
                LogicImmOp::Andis => s & (imm << 16),
            };
            state.gpr[ra as usize] = r;
            if matches!(op, LogicImmOp::Andi | LogicImmOp::Andis) {
                record(state, r);
            }
        }
        Insn::Arith { op, rd, ra, rb, rc } => {
            let a = state.gpr[ra as usize];
            let b = state.gpr[rb as usize];
            let r = match op {
                ArithOp::Add => a.wrapping_add(b),
                ArithOp::Addc => {
                    let (r, ca) = add_carry(a, b, false);
                    set_ca(state, ca);
                    r
                }
                ArithOp::Adde => {
                    let (r, ca) = add_carry(a, b, state.xer_ca());
                    set_ca(state, ca);
                    r
                }
                ArithOp::Subf => b.wrapping_sub(a),
                ArithOp::Subfc => {
                    set_ca(state, b >= a);
                    b.wrapping_sub(a)
                }
                ArithOp::Subfe => {
                    let (r, ca) = add_carry(!a, b, state.xer_ca());
                    set_ca(state, ca);
                    r
                }
                ArithOp::Mullw => eval(Opcode::Mul, a, b),
                ArithOp::Mulhw => eval(Opcode::MulSH, a, b),
                ArithOp::Mulhwu => eval(Opcode::MulUH, a, b),
                ArithOp::Divw => eval(Opcode::DivS, a, b),
                ArithOp::Divwu => eval(Opcode::DivU, a, b),
            };
            state.gpr[rd as usize] = r;
            if rc {
                record(state, r);
            }
        }
        Insn::ArithUnary { op, rd, ra, rc } => {
            let a = state.gpr[ra as usize];
            let ca = state.xer_ca();
            let r = match op {
                ArithUnaryOp::Neg => a.wrapping_neg(),
                ArithUnaryOp::Addme | ArithUnaryOp::Addze | ArithUnaryOp::Subfme | ArithUnaryOp::Subfze => {
                    let src = match op {
                        ArithUnaryOp::Subfme | ArithUnaryOp::Subfze => !a,
                        _ => a,
                    };
                    let addend = match op {
                        ArithUnaryOp::Addme | ArithUnaryOp::Subfme => u32::MAX,
                        _ => 0,
                    };
                    let (r, c) = add_carry(src, addend, ca);
                    set_ca(state, c);
                    r
                }
            };
            state.gpr[rd as usize] = r;
            if rc {
                record(state, r);
            }
        }
        Insn::Logic { op, ra, rs, rb, rc } => {
            let s = state.gpr[rs as usize];
            let b = state.gpr[rb as usize];
            let r = match op {
                LogicOp::And => s & b,
                LogicOp::Andc => s & !b,
                LogicOp::Or => s | b,
                LogicOp::Orc => s | !b,
                LogicOp::Xor => s ^ b,
                LogicOp::Nor => !(s | b),
                LogicOp::Nand => !(s & b),
                LogicOp::Eqv => !(s ^ b),
                LogicOp::Slw => eval(Opcode::Shl, s, b),
                LogicOp::Srw => eval(Opcode::Shr, s, b),
                LogicOp::Sraw => {
                    let n = b & 0x3F;
                    let r = eval(Opcode::Sar, s, b);
                    let lost = if n >= 32 {
                        s != 0
                    } else {
                        s & ((1u64 << n) - 1) as u32 != 0
                    };
                    set_ca(state, (s as i32) < 0 && lost);
                    r
                }
            };
            state.gpr[ra as usize] = r;
            if rc {
                record(state, r);
            }
        }
        Insn::Srawi { ra, rs, sh, rc } => {
            let s = state.gpr[rs as usize];
            let r = ((s as i32) >> sh) as u32;
            let lost = s & ((1u32 << sh) - 1) != 0;
            set_ca(state, (s as i32) < 0 && lost);
            state.gpr[ra as usize] = r;
            if rc {
                record(state, r);
            }
        }
        Insn::Unary { op, ra, rs, rc } => {
            let s = state.gpr[rs as usize];
            let r = match op {
                UnaryOp::Cntlzw => s.leading_zeros(),
                UnaryOp::Extsb => s as u8 as i8 as i32 as u32,
                UnaryOp::Extsh => s as u16 as i16 as i32 as u32,
            };
            state.gpr[ra as usize] = r;
            if rc {
                record(state, r);
            }
        }
        Insn::Rlwinm { ra, rs, sh, mb, me, rc } => {
            let r = state.gpr[rs as usize].rotate_left(sh as u32) & rotate_mask(mb as u32, me as u32);
            state.gpr[ra as usize] = r;
            if rc {
                record(state, r);
            }
        }
        Insn::Rlwnm { ra, rs, rb, mb, me, rc } => {
            let n = state.gpr[rb as usize] & 31;
            let r = state.gpr[rs as usize].rotate_left(n) & rotate_mask(mb as u32, me as u32);
            state.gpr[ra as usize] = r;
            if rc {
                record(state, r);
            }
        }
        Insn::Rlwimi { ra, rs, sh, mb, me, rc } => {
            let m = rotate_mask(mb as u32, me as u32);
            let r = (state.gpr[rs as usize].rotate_left(sh as u32) & m) | (state.gpr[ra as usize] & !m);
            state.gpr[ra as usize] = r;
            if rc {
                record(state, r);
            }
        }
        Insn::Load { op, rd, ra, ea, update } => {
            let addr = effective_address(state, ra, ea);
            let v = load(mem, op, addr, mode)?;
            state.gpr[rd as usize] = v;
            if update {
                state.gpr[ra as usize] = addr;
            }
        }
        Insn::Store { op, rs, ra, ea, update } => {
            let addr = effective_address(state, ra, ea);
            store(mem, op, addr, state.gpr[rs as usize], mode)?;
            if update {
                state.gpr[ra as usize] = addr;
            }
        }
        Insn::Lmw { rd, ra, d } => {
            let addr = effective_address(state, ra, Ea::Disp(d));
            for (i, r) in (rd..32).enumerate() {
                let a = addr.wrapping_add(4 * i as u32);
                state.gpr[r as usize] = load(mem, MemOp::U32, a, mode)?;
            }
        }
        Insn::Stmw { rs, ra, d } => {
            let addr = effective_address(state, ra, Ea::Disp(d));
            for (i, r) in (rs..32).enumerate() {
                let a = addr.wrapping_add(4 * i as u32);
                store(mem, MemOp::U32, a, state.gpr[r as usize], mode)?;
            }
        }
        Insn::B { li, aa, lk } => {
            if lk {
                state.set_lr(next);
            }
            state.pc = if aa {
                li as u32
            } else {
                pc.wrapping_add(li as u32)
            };
        }
        Insn::Bc { bo, bi, bd, aa, lk } => {
            if lk {
                state.set_lr(next);
            }
            if branch_taken(state, bo, bi) {
                let disp = bd as i32 as u32;
                state.pc = if aa { disp } else { pc.wrapping_add(disp) };
            }
        }
        Insn::Bclr { bo, bi, lk } => {
            let target = state.lr() & !3;
            if lk {
                state.set_lr(next);
            }
            if branch_taken(state, bo, bi) {
                state.pc = target;
            }
        }
        Insn::Bcctr { bo, bi, lk } => {
            let target = state.ctr() & !3;
            if lk {
                state.set_lr(next);
            }
            if branch_taken(state, bo, bi) {
                state.pc = target;
            }
        }
        Insn::CrLogic { op, bt, ba, bb } => {
            let a = (state.cr >> (31 - ba as u32)) & 1;
            let b = (state.cr >> (31 - bb as u32)) & 1;
            let r = match op {
                CrOp::And => a & b,
                CrOp::Or => a | b,
                CrOp::Xor => a ^ b,
                CrOp::Nand => !(a & b),
                CrOp::Nor => !(a | b),
                CrOp::Eqv => !(a ^ b),
                CrOp::Andc => a & !b,
                CrOp::Orc => a | !b,
            } & 1;
            let shift = 31 - bt as u32;
            state.cr = (state.cr & !(1 << shift)) | (r << shift);
        }
        Insn::Mcrf { crfd, crfs } => {
            let f = state.cr_field(crfs as u32);
            state.set_cr_field(crfd as u32, f);
        }
        Insn::Mfspr { rd, spr } => state.gpr[rd as usize] = state.spr[spr as usize],
        Insn::Mtspr { rs, spr } => {
            if spr as usize != SPR_PVR {
                state.spr[spr as usize] = state.gpr[rs as usize];
            }
        }
        Insn::Mfmsr { rd } => state.gpr[rd as usize] = state.msr,
        Insn::Mfcr { rd } => state.gpr[rd as usize] = state.cr,
        Insn::Mtcrf { rs, crm } => {
            let mask = crm_mask(crm);
            state.cr = (state.cr & !mask) | (state.gpr[rs as usize] & mask);
        }
        Insn::Mtmsr { rs } => {
            state.msr = state.gpr[rs as usize];
            state.npc = next;
            return Ok(Some(InterpExit::CheckExternal));
        }
        Insn::Rfi => {
            const MASK: u32 = 0x87C0_FFFF;
            state.msr = ((state.msr & !MASK) | (state.spr[ppc_core::state::SPR_SRR1] & MASK)) & 0xFFFB_FFFF;
            state.pc = state.spr[ppc_core::state::SPR_SRR0] & !3;
            state.npc = state.pc;
            return Ok(Some(InterpExit::CheckExternal));
        }
        Insn::Sc => {
            state.pc = pc;
            state.npc = next;
            state.exceptions |= ExceptionFlags::SYSCALL;
            return Ok(Some(InterpExit::Exception(ExceptionFlags::SYSCALL)));
        }
        Insn::Icbi { ra, rb } => {
            let addr = effective_address(state, ra, Ea::Indexed(rb));
            state.npc = next;
            return Ok(Some(InterpExit::InvalidateLine(addr)));
        }
        Insn::Dcbz { ra, rb } => {
            let line = effective_address(state, ra, Ea::Indexed(rb)) & !31;
            for i in 0..8u32 {
                store(mem, MemOp::U32, line + i * 4, 0, mode)?;
            }
        }
        Insn::Nop => {}
        Insn::Illegal(_) => {
            state.pc = pc;
            state.npc = pc;
            state.exceptions |= ExceptionFlags::PROGRAM;
            return Ok(Some(InterpExit::Exception(ExceptionFlags::PROGRAM)));
        }
    }
    Ok(None)
}
