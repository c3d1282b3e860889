//! Threaded-code backend.
//!
//! Each IR op lowers to one [`HostInsn`] with its operands resolved to
//! guest registers, frame slots or immediates. Execution walks the
//! instruction array from the block prologue to the first `Exit`.

mod insn;

pub use insn::{HostInsn, Loc};

use ppc_core::{
    BlockExit, Cond, Context, CpuState, ExceptionFlags, ExitKind, MemOp, Op, Opcode, TempIdx,
    TempKind,
};
use ppc_memory::{GuestMemory, MemFault};

use crate::code_buffer::{CodeBuffer, CodeBufferFull};
use crate::{ExecCtx, HostCodeGen};

#[derive(Default)]
pub struct ThreadedBackend {
    /// Frame slot for each temp of the block being emitted.
    slots: Vec<Option<u32>>,
    /// Scratch frame reused across block executions.
    frame: Vec<u32>,
}

impl ThreadedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn loc(&self, ctx: &Context, t: TempIdx) -> Loc {
        let temp = ctx.temp(t);
        match temp.kind {
            TempKind::Const => Loc::Imm(temp.val),
            TempKind::Global => match temp.reg {
                Some(reg) => Loc::Reg(reg),
                None => Loc::Imm(0),
            },
            TempKind::Ebb => Loc::Local(self.slots[t.0 as usize].unwrap_or(0)),
        }
    }

    fn label_target(ctx: &Context, id: u32) -> usize {
        ctx.label(id).offset.unwrap_or(0)
    }
}

impl HostCodeGen for ThreadedBackend {
    fn emit_prologue(&mut self, buf: &mut CodeBuffer, ctx: &Context) -> Result<(), CodeBufferFull> {
        self.slots.clear();
        let mut next = 0u32;
        for temp in ctx.temps() {
            let slot = (temp.kind == TempKind::Ebb).then(|| {
                next += 1;
                next - 1
            });
            self.slots.push(slot);
        }
        buf.emit(HostInsn::Enter { frame_size: next })?;
        Ok(())
    }

    fn emit_op(&mut self, buf: &mut CodeBuffer, ctx: &Context, op: &Op) -> Result<usize, CodeBufferFull> {
        let a = |n: usize| self.loc(ctx, op.args[n]);
        let insn = match op.opc {
            Opcode::InsnStart => HostInsn::InsnStart {
                pc: op.carg(0),
                cost: op.carg(1),
            },
            Opcode::Mov => HostInsn::Mov { d: a(0), a: a(1) },
            Opcode::SetCond => HostInsn::SetCond {
                cond: Cond::from_u32(op.carg(0)).unwrap_or(Cond::Never),
                d: a(0),
                a: a(1),
                b: a(2),
            },
            Opcode::Ld => HostInsn::Load {
                memop: MemOp::from_u32(op.carg(0)).unwrap_or(MemOp::U32),
                d: a(0),
                addr: a(1),
            },
            Opcode::St => HostInsn::Store {
                memop: MemOp::from_u32(op.carg(0)).unwrap_or(MemOp::U32),
                val: a(0),
                addr: a(1),
            },
            Opcode::Br => HostInsn::Jump {
                target: Self::label_target(ctx, op.carg(0)),
            },
            Opcode::BrCond => HostInsn::BrCond {
                cond: Cond::from_u32(op.carg(0)).unwrap_or(Cond::Never),
                a: a(0),
                b: a(1),
                target: Self::label_target(ctx, op.carg(1)),
            },
            Opcode::ExitTb => HostInsn::Exit {
                kind: ExitKind::from_u32(op.carg(0)).unwrap_or(ExitKind::Branch),
                val: a(0),
                cost: op.carg(1),
            },
            opc if opc.is_unary_alu() => HostInsn::Unary {
                opc,
                d: a(0),
                a: a(1),
            },
            opc => HostInsn::Binary {
                opc,
                d: a(0),
                a: a(1),
                b: a(2),
            },
        };
        buf.emit(insn)
    }

    fn patch_jump(&self, buf: &mut CodeBuffer, jump_offset: usize, target_offset: usize) {
        match buf.get_mut(jump_offset) {
            HostInsn::Jump { target } | HostInsn::BrCond { target, .. } => *target = target_offset,
            other => debug_assert!(false, "patching non-branch {other}"),
        }
    }

    fn exec_block(&mut self, buf: &CodeBuffer, offset: usize, cx: ExecCtx<'_>) -> BlockExit {
        let mut m = Machine {
            state: cx.state,
            frame: &mut self.frame,
        };
        let mode = cx.mode;
        let mem = cx.mem;
        let mut ip = offset;
        // Guest pc of the instruction in flight and the cost of the
        // instructions completed before it.
        let mut cur = (m.state.pc, 0u32);
        let mut issued = 0u32;

        loop {
            let insn = *buf.get(ip);
            ip += 1;
            match insn {
                HostInsn::Enter { frame_size } => {
                    m.frame.clear();
                    m.frame.resize(frame_size as usize, 0);
                }
                HostInsn::InsnStart { pc, cost } => {
                    cur = (pc, issued);
                    issued = cost;
                }
                HostInsn::Mov { d, a } => {
                    let v = m.read(a);
                    m.write(d, v);
                }
                HostInsn::Binary { opc, d, a, b } => {
                    let v = opc.eval_binary(m.read(a), m.read(b)).unwrap_or(0);
                    m.write(d, v);
                }
                HostInsn::Unary { opc, d, a } => {
                    let v = opc.eval_unary(m.read(a)).unwrap_or(0);
                    m.write(d, v);
                }
                HostInsn::SetCond { cond, d, a, b } => {
                    let v = cond.eval(m.read(a), m.read(b)) as u32;
                    m.write(d, v);
                }
                HostInsn::Load { memop, d, addr } => {
                    let ea = m.read(addr);
                    match load(&*mem, memop, ea, mode) {
                        Ok(v) => m.write(d, v),
                        Err(_) => return m.data_fault(cur, ea, false),
                    }
                }
                HostInsn::Store { memop, val, addr } => {
                    let ea = m.read(addr);
                    let v = m.read(val);
                    if store(&mut *mem, memop, ea, v, mode).is_err() {
                        return m.data_fault(cur, ea, true);
                    }
                }
                HostInsn::Jump { target } => ip = target,
                HostInsn::BrCond { cond, a, b, target } => {
                    if cond.eval(m.read(a), m.read(b)) {
                        ip = target;
                    }
                }
                HostInsn::Exit { kind, val, cost } => {
                    m.state.downcount -= cost as i32;
                    return BlockExit::new(kind, m.read(val));
                }
            }
        }
    }
}

/// Register file view of a running block.
struct Machine<'a> {
    state: &'a mut CpuState,
    frame: &'a mut Vec<u32>,
}

impl Machine<'_> {
    #[inline]
    fn read(&self, l: Loc) -> u32 {
        match l {
            Loc::Reg(r) => self.state.reg(r),
            Loc::Local(n) => self.frame[n as usize],
            Loc::Imm(v) => v,
        }
    }

    #[inline]
    fn write(&mut self, l: Loc, v: u32) {
        match l {
            Loc::Reg(r) => self.state.set_reg(r, v),
            Loc::Local(n) => self.frame[n as usize] = v,
            Loc::Imm(_) => {}
        }
    }

    /// Abandon the block at the faulting instruction. Only `completed`
    /// is charged; the faulting instruction runs again after the handler.
    fn data_fault(&mut self, (pc, completed): (u32, u32), ea: u32, is_store: bool) -> BlockExit {
        self.state.pc = pc;
        self.state.npc = pc;
        self.state.raise_dsi(ea, is_store);
        self.state.downcount -= completed as i32;
        BlockExit::new(ExitKind::Exception, ExceptionFlags::DSI.bits())
    }
}

fn load(
    mem: &dyn GuestMemory,
    op: MemOp,
    addr: u32,
    mode: ppc_core::AddressingMode,
) -> Result<u32, MemFault> {
    Ok(match op {
        MemOp::U8 => mem.read_u8(addr, mode)? as u32,
        MemOp::U16 => mem.read_u16(addr, mode)? as u32,
        MemOp::S16 => mem.read_u16(addr, mode)? as i16 as i32 as u32,
        MemOp::U32 => mem.read_u32(addr, mode)?,
    })
}

fn store(
    mem: &mut dyn GuestMemory,
    op: MemOp,
    addr: u32,
    val: u32,
    mode: ppc_core::AddressingMode,
) -> Result<(), MemFault> {
    match op {
        MemOp::U8 => mem.write_u8(addr, val as u8, mode),
        MemOp::U16 | MemOp::S16 => mem.write_u16(addr, val as u16, mode),
        MemOp::U32 => mem.write_u32(addr, val, mode),
    }
}
