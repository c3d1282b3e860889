use ppc_backend::optimize::optimize;
use ppc_backend::translate::translate;
use ppc_backend::{CodeBuffer, CodeBufferFull, ExecCtx, HostCodeGen, HostInsn, Loc, ThreadedBackend};
use ppc_core::state::{SPR_DAR, SPR_DSISR};
use ppc_core::{
    AddressingMode, BlockExit, Cond, Context, CpuState, ExceptionFlags, ExitKind, GlobalReg, MemOp,
    Opcode,
};
use ppc_memory::{GuestMemory, Memory};

use crate::asm::{cpu, CODE, DATA, MSR};

fn mode() -> AddressingMode {
    AddressingMode::from_msr(MSR)
}

/// Lower `ir` into a fresh buffer and run it once.
fn run_ir(ir: &mut Context, state: &mut CpuState, mem: &mut Memory) -> BlockExit {
    let mut backend = ThreadedBackend::new();
    let mut buf = CodeBuffer::new(1024);
    let start = translate(ir, &mut backend, &mut buf).unwrap();
    backend.exec_block(
        &buf,
        start,
        ExecCtx {
            state,
            mem,
            mode: mode(),
        },
    )
}

// ── Code buffer ─────────────────────────────────────────────

#[test]
fn code_buffer_fills_and_resets() {
    let mut buf = CodeBuffer::new(2);
    assert_eq!(buf.emit(HostInsn::Enter { frame_size: 0 }), Ok(0));
    assert_eq!(buf.emit(HostInsn::Jump { target: 0 }), Ok(1));
    assert_eq!(
        buf.emit(HostInsn::Jump { target: 0 }),
        Err(CodeBufferFull { capacity: 2 })
    );
    assert_eq!(buf.remaining(), 0);

    buf.set_offset(1);
    assert_eq!(buf.offset(), 1);
    assert_eq!(buf.generation(), 0);

    buf.reset();
    assert_eq!(buf.offset(), 0);
    assert_eq!(buf.generation(), 1);
}

#[test]
fn translate_rolls_back_on_overflow() {
    let mut ir = Context::new();
    let r3 = ir.global(GlobalReg::Gpr(3));
    ir.gen_insn_start(CODE, 1);
    ir.gen_addi(r3, r3, 1);
    let z = ir.new_const(0);
    ir.gen_exit_tb(ExitKind::Branch, z, 1);

    let mut backend = ThreadedBackend::new();
    let mut buf = CodeBuffer::new(3);
    buf.emit(HostInsn::Enter { frame_size: 0 }).unwrap();
    assert!(translate(&mut ir, &mut backend, &mut buf).is_err());
    assert_eq!(buf.offset(), 1);
}

// ── Optimizer ───────────────────────────────────────────────

#[test]
fn optimize_folds_constants() {
    let mut ir = Context::new();
    let r3 = ir.global(GlobalReg::Gpr(3));
    let a = ir.new_const(2);
    let b = ir.new_const(3);
    let t = ir.new_temp();
    ir.gen_add(t, a, b);
    ir.gen_shli(r3, t, 4);
    optimize(&mut ir);

    let shl = &ir.ops()[1];
    assert_eq!(shl.opc, Opcode::Mov);
    assert_eq!(shl.args[0], r3);
    let src = ir.temp(shl.args[1]);
    assert!(src.is_const());
    assert_eq!(src.val, 0x50);
}

#[test]
fn optimize_simplifies_identities() {
    let mut ir = Context::new();
    let r3 = ir.global(GlobalReg::Gpr(3));
    let r4 = ir.global(GlobalReg::Gpr(4));
    ir.gen_xor(r4, r3, r3);
    ir.gen_ori(r4, r3, 0);
    optimize(&mut ir);
    assert_eq!(ir.ops()[0].opc, Opcode::Mov);
    assert!(ir.temp(ir.ops()[0].args[1]).is_const());
    assert_eq!(ir.ops()[1].opc, Opcode::Mov);
    assert_eq!(ir.ops()[1].args[1], r3);
}

#[test]
fn optimize_resolves_constant_branches() {
    let mut ir = Context::new();
    let taken = ir.new_label();
    let skipped = ir.new_label();
    let one = ir.new_const(1);
    ir.gen_brcondi(Cond::Eq, one, 1, taken);
    ir.gen_brcondi(Cond::Eq, one, 2, skipped);
    ir.gen_set_label(taken);
    ir.gen_set_label(skipped);
    optimize(&mut ir);
    assert_eq!(ir.ops()[0].opc, Opcode::Br);
    assert_eq!(ir.ops()[1].opc, Opcode::Nop);
}

#[test]
fn optimize_does_not_carry_facts_across_labels() {
    let mut ir = Context::new();
    let r3 = ir.global(GlobalReg::Gpr(3));
    let l = ir.new_label();
    ir.gen_movi(r3, 7);
    ir.gen_set_label(l);
    ir.gen_addi(r3, r3, 1);
    optimize(&mut ir);
    assert_eq!(ir.ops()[2].opc, Opcode::Add);
}

// ── Threaded execution ──────────────────────────────────────

#[test]
fn executes_straight_line_block() {
    let mut ir = Context::new();
    let r3 = ir.global(GlobalReg::Gpr(3));
    let r4 = ir.global(GlobalReg::Gpr(4));
    let pc = ir.global(GlobalReg::Pc);
    ir.gen_insn_start(CODE, 1);
    let t = ir.new_temp();
    ir.gen_addi(t, r3, 5);
    ir.gen_insn_start(CODE + 4, 2);
    let addr = ir.new_const(DATA);
    ir.gen_st(MemOp::U32, t, addr);
    ir.gen_insn_start(CODE + 8, 3);
    ir.gen_ld(MemOp::U8, r4, addr);
    let next = ir.new_const(CODE + 12);
    ir.gen_mov(pc, next);
    ir.gen_exit_tb(ExitKind::Branch, next, 3);

    let mut mem = Memory::default();
    let mut state = cpu();
    state.gpr[3] = 0x0102_0300;
    state.downcount = 10;
    let exit = run_ir(&mut ir, &mut state, &mut mem);

    assert_eq!(exit, BlockExit::new(ExitKind::Branch, CODE + 12));
    assert_eq!(state.pc, CODE + 12);
    assert_eq!(state.gpr[3], 0x0102_0300);
    assert_eq!(state.gpr[4], 0x01);
    assert_eq!(mem.read_u32(DATA, mode()).unwrap(), 0x0102_0305);
    assert_eq!(state.downcount, 7);
}

fn skip_if_nonzero() -> Context {
    let mut ir = Context::new();
    let r3 = ir.global(GlobalReg::Gpr(3));
    let r4 = ir.global(GlobalReg::Gpr(4));
    let skip = ir.new_label();
    ir.gen_insn_start(CODE, 1);
    ir.gen_movi(r4, 1);
    ir.gen_brcondi(Cond::Ne, r3, 0, skip);
    ir.gen_movi(r4, 2);
    ir.gen_set_label(skip);
    let z = ir.new_const(0);
    ir.gen_exit_tb(ExitKind::Branch, z, 1);
    ir
}

#[test]
fn executes_forward_branches() {
    let mut mem = Memory::default();
    let mut state = cpu();
    state.gpr[3] = 1;
    run_ir(&mut skip_if_nonzero(), &mut state, &mut mem);
    assert_eq!(state.gpr[4], 1);

    state.gpr[3] = 0;
    run_ir(&mut skip_if_nonzero(), &mut state, &mut mem);
    assert_eq!(state.gpr[4], 2);
}

#[test]
fn load_fault_stops_at_faulting_instruction() {
    let mut ir = Context::new();
    let r3 = ir.global(GlobalReg::Gpr(3));
    let r4 = ir.global(GlobalReg::Gpr(4));
    ir.gen_insn_start(CODE, 1);
    ir.gen_addi(r4, r4, 1);
    ir.gen_insn_start(CODE + 4, 6);
    ir.gen_ld(MemOp::U32, r3, r3);
    ir.gen_insn_start(CODE + 8, 7);
    ir.gen_addi(r4, r4, 1);
    let z = ir.new_const(0);
    ir.gen_exit_tb(ExitKind::Branch, z, 7);

    let mut mem = Memory::default();
    let mut state = cpu();
    state.gpr[3] = 0x0000_1000;
    state.downcount = 100;
    let exit = run_ir(&mut ir, &mut state, &mut mem);

    assert_eq!(exit, BlockExit::new(ExitKind::Exception, ExceptionFlags::DSI.bits()));
    assert_eq!(state.pc, CODE + 4);
    assert_eq!(state.npc, CODE + 4);
    assert_eq!(state.gpr[4], 1);
    assert_eq!(state.gpr[3], 0x0000_1000);
    assert_eq!(state.spr[SPR_DAR], 0x0000_1000);
    assert_eq!(state.spr[SPR_DSISR], 1 << 30);
    // Only the completed `addi` is charged.
    assert_eq!(state.downcount, 99);
}

#[test]
fn lowering_uses_frame_slots_for_temps() {
    let mut ir = Context::new();
    let r3 = ir.global(GlobalReg::Gpr(3));
    let t = ir.new_temp();
    ir.gen_muli(t, r3, 3);
    ir.gen_mov(r3, t);
    let z = ir.new_const(0);
    ir.gen_exit_tb(ExitKind::Branch, z, 1);

    let mut backend = ThreadedBackend::new();
    let mut buf = CodeBuffer::new(64);
    let start = translate(&mut ir, &mut backend, &mut buf).unwrap();
    let code = buf.slice(start, buf.offset() - start);
    assert_eq!(code[0], HostInsn::Enter { frame_size: 1 });
    assert_eq!(
        code[1],
        HostInsn::Binary {
            opc: Opcode::Mul,
            d: Loc::Local(0),
            a: Loc::Reg(GlobalReg::Gpr(3)),
            b: Loc::Imm(3),
        }
    );
}
