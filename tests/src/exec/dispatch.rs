use std::sync::{Arc, Mutex};

use ppc_core::state::{MSR_EE, SPR_DAR, SPR_SRR0, SPR_SRR1};
use ppc_core::{AddressingMode, CpuState, ExceptionFlags};
use ppc_exec::exceptions::{SRR1_ISI_NO_TRANSLATION, SRR1_PROGRAM_ILLEGAL};
use ppc_exec::{DebugHost, DebugStop, Debugger, Dispatcher, ExecError, ExitReason, JitConfig};
use ppc_frontend::gekko::interp;
use ppc_memory::{GuestMemory, Memory, MemoryConfig};

use crate::asm::*;

fn mode() -> AddressingMode {
    AddressingMode::from_msr(MSR)
}

/// `addi r3, r3, 1` in a two-instruction loop.
fn counter() -> Vec<u32> {
    vec![addi(3, 3, 1), b(-4)]
}

// ── Steady state ────────────────────────────────────────────

#[test]
fn hot_loop_matches_interpreter() {
    let code = counter();
    let mut d = dispatcher(&code);
    d.state.gpr[3] = u32::MAX - 10;
    while d.stats().blocks_executed < 1_000_000 {
        assert_eq!(d.run_once(), Ok(None));
    }
    assert_eq!(d.state.gpr[3], (u32::MAX - 10).wrapping_add(1_000_000));
    assert_eq!(d.stats().compiles, 1);
    assert_eq!(d.stats().cache_hits, 999_999);

    let mut mem = memory_with(&code);
    let mut s = cpu();
    s.gpr[3] = u32::MAX - 10;
    interpret(&mut s, &mut mem, 2_000_000);
    assert_eq!(arch_regs(&d.state), arch_regs(&s));
}

#[test]
fn downcount_stays_bounded() {
    let config = JitConfig {
        max_slice_cycles: 10,
        ..JitConfig::default()
    };
    let mut d = dispatcher_with(config, &[divw(3, 3, 4), b(-4)]);
    d.state.gpr[4] = 1;
    for i in 1..=50 {
        assert_eq!(d.run_once(), Ok(None));
        // Never more than one block of overrun.
        assert!(d.state.downcount > -41, "downcount {}", d.state.downcount);
        assert_eq!(d.stats().timing_advances, i);
    }
    assert_eq!(d.stats().blocks_executed, 50);
}

// ── Invalidation ────────────────────────────────────────────

#[test]
fn explicit_invalidation_forces_one_recompile() {
    let mut d = dispatcher(&counter());
    d.run_once().unwrap();
    d.run_once().unwrap();
    assert_eq!(d.stats().compiles, 1);
    assert_eq!(d.stats().cache_hits, 1);

    d.invalidate_icache(CODE_PHYS, 8);
    assert_eq!(d.stats().blocks_invalidated, 1);
    d.run_once().unwrap();
    assert_eq!(d.stats().cache_misses, 2);
    assert_eq!(d.stats().compiles, 2);
    d.run_once().unwrap();
    assert_eq!(d.stats().compiles, 2);
    assert_eq!(d.state.gpr[3], 4);
}

#[test]
fn queued_invalidation_applies_at_safe_point() {
    let mut d = dispatcher(&counter());
    d.run_once().unwrap();
    let control = d.control();
    control.queue_invalidation(CODE_PHYS + 4, 4);
    assert_eq!(d.stats().blocks_invalidated, 0);
    d.run_once().unwrap();
    assert_eq!(d.stats().blocks_invalidated, 1);
    assert_eq!(d.stats().compiles, 2);
}

#[test]
fn host_write_caught_by_checksum() {
    let mut d = dispatcher(&[li(3, 1), b(-4)]);
    d.run_once().unwrap();
    assert_eq!(d.state.gpr[3], 1);

    d.memory_mut().write_u32(CODE, li(3, 2), mode()).unwrap();
    d.run_once().unwrap();
    assert_eq!(d.state.gpr[3], 2);
    assert_eq!(d.stats().checksum_mismatches, 1);
    assert_eq!(d.stats().compiles, 2);

    // Without checking, the stale translation keeps running.
    d.set_icache_check(false);
    d.memory_mut().write_u32(CODE, li(3, 3), mode()).unwrap();
    d.run_once().unwrap();
    assert_eq!(d.state.gpr[3], 2);
    assert_eq!(d.stats().checksum_mismatches, 1);
}

#[test]
fn guest_store_and_icbi_patch_code() {
    let mut code = vec![nop(); 10];
    code[0] = lis(5, 0x8000u16 as i16);
    code[1] = ori(5, 5, 0x3020);
    code[2] = stw(6, 5, 0);
    code[3] = icbi(0, 5);
    code[4] = b(16);
    code[8] = li(3, 1);
    code[9] = b(0);
    let mut d = dispatcher(&code);

    d.state.pc = CODE + 0x20;
    run_until(&mut d, |d| d.state.pc == CODE + 0x24);
    assert_eq!(d.state.gpr[3], 1);

    // Only the icbi may retire the stale block.
    d.set_icache_check(false);
    d.state.pc = CODE;
    d.state.gpr[6] = li(3, 7);
    run_until(&mut d, |d| d.state.pc == CODE + 0x24);
    assert_eq!(d.state.gpr[3], 7);
    assert!(d.stats().blocks_invalidated >= 1);
}

#[test]
fn code_on_a_remapped_page_is_invalidated_by_its_own_frame() {
    // Two consecutive virtual pages backed by unrelated frames.
    let mut mem = Memory::new(&MemoryConfig::default());
    mem.map_page(0x7E00_0000, 0x0000_1000);
    mem.map_page(0x7E00_1000, 0x0000_5000);
    mem.load_words(0x1FFC, &[li(3, 1)]).unwrap();
    mem.load_words(0x5000, &[li(4, 1), b(0)]).unwrap();
    let mut d = Dispatcher::new(JitConfig::default(), Box::new(mem));
    d.state = cpu();
    d.set_icache_check(false);

    d.state.pc = 0x7E00_0FFC;
    run_until(&mut d, |d| d.state.pc == 0x7E00_1004);
    assert_eq!((d.state.gpr[3], d.state.gpr[4]), (1, 1));
    assert_eq!(d.stats().compiles, 2);

    d.memory_mut().write_u32(0x7E00_1000, li(4, 7), mode()).unwrap();
    d.invalidate_icache(0x5000, 4);
    assert_eq!(d.stats().blocks_invalidated, 1);

    d.state.pc = 0x7E00_0FFC;
    run_until(&mut d, |d| d.state.pc == 0x7E00_1004);
    assert_eq!(d.state.gpr[4], 7);
    assert_eq!(d.stats().compiles, 3);
}

#[test]
fn icbi_on_untranslated_address_invalidates_nothing() {
    let mut code = vec![nop(); 0x42];
    // CODE_PHYS + 0x100 has no translation with IR/DR set.
    code[0] = li(5, 0x3100);
    code[1] = icbi(0, 5);
    code[2] = b(0);
    code[0x40] = li(3, 1);
    code[0x41] = b(0);
    let mut d = dispatcher(&code);

    d.state.pc = CODE + 0x100;
    run_until(&mut d, |d| d.state.pc == CODE + 0x104);
    d.state.pc = CODE;
    run_until(&mut d, |d| d.state.pc == CODE + 8);
    assert_eq!(d.stats().blocks_invalidated, 0);
    assert_eq!(d.stats().exceptions_delivered, 0);

    d.state.pc = CODE + 0x100;
    let compiles = d.stats().compiles;
    run_until(&mut d, |d| d.state.pc == CODE + 0x104);
    assert_eq!(d.stats().compiles, compiles);
}

// ── Code space exhaustion ───────────────────────────────────

/// Twenty one-instruction blocks chained by `b 4`, then a spin.
fn chain() -> Vec<u32> {
    let mut code = vec![b(4); 20];
    code.push(b(0));
    code
}

#[test]
fn full_code_buffer_is_cleared_and_retried() {
    let config = JitConfig {
        code_buffer_capacity: 40,
        ..JitConfig::default()
    };
    let mut d = dispatcher_with(config, &chain());
    run_until(&mut d, |d| d.state.pc == CODE + 80);
    assert!(d.stats().cache_clears >= 1);
    assert_eq!(d.stats().compiles, 20);
}

#[test]
fn full_block_table_is_cleared_and_retried() {
    let config = JitConfig {
        max_blocks: 3,
        ..JitConfig::default()
    };
    let mut d = dispatcher_with(config, &chain());
    run_until(&mut d, |d| d.state.pc == CODE + 80);
    assert!(d.stats().cache_clears >= 6);
}

#[test]
fn block_larger_than_buffer_is_an_error() {
    let config = JitConfig {
        code_buffer_capacity: 2,
        ..JitConfig::default()
    };
    let mut d = dispatcher_with(config, &counter());
    assert_eq!(d.run(), Err(ExecError::CodeBufferExhausted { pc: CODE }));
}

// ── Exceptions ──────────────────────────────────────────────

/// Dispatcher running `code` with `handlers` placed at their physical
/// exception vectors.
fn with_vectors(code: &[u32], handlers: &[(u32, &[u32])]) -> Dispatcher {
    let mut mem = memory_with(code);
    for &(vector, words) in handlers {
        mem.load_words(vector, words).unwrap();
    }
    let mut d = Dispatcher::new(JitConfig::default(), Box::new(mem));
    d.state = cpu();
    d
}

#[test]
fn syscall_enters_handler() {
    let mut d = with_vectors(&[li(3, 1), sc()], &[(0xC00, &[li(4, 9), b(0)])]);
    run_until(&mut d, |d| d.state.pc == 0xC04);
    assert_eq!(d.state.gpr[3], 1);
    assert_eq!(d.state.gpr[4], 9);
    assert_eq!(d.state.spr[SPR_SRR0], CODE + 8);
    assert_eq!(d.state.spr[SPR_SRR1], MSR);
    assert_eq!(d.state.msr, 0);
    assert_eq!(d.stats().exceptions_delivered, 1);
}

#[test]
fn illegal_instruction_enters_program_handler() {
    let mut d = with_vectors(&[li(3, 1), 0], &[(0x700, &[b(0)])]);
    run_until(&mut d, |d| d.state.pc == 0x700);
    assert_eq!(d.state.gpr[3], 1);
    assert_eq!(d.state.spr[SPR_SRR0], CODE + 4);
    assert_eq!(d.state.spr[SPR_SRR1], MSR | SRR1_PROGRAM_ILLEGAL);
}

#[test]
fn data_fault_enters_dsi_handler() {
    let mut d = with_vectors(
        &[li(5, 1), lwz(4, 3, 8), li(5, 2)],
        &[(0x300, &[li(6, 3), b(0)])],
    );
    d.state.gpr[3] = 0x0000_1000;
    run_until(&mut d, |d| d.state.pc == 0x304);
    assert_eq!(d.state.gpr[5], 1);
    assert_eq!(d.state.gpr[6], 3);
    assert_eq!(d.state.spr[SPR_SRR0], CODE + 4);
    assert_eq!(d.state.spr[SPR_DAR], 0x0000_1008);
}

#[test]
fn unmapped_fetch_enters_isi_handler() {
    let mut d = with_vectors(&[], &[(0x400, &[b(0)])]);
    d.state.pc = 0x0000_5000;
    d.run_once().unwrap();
    assert_eq!(d.state.pc, 0x400);
    assert_eq!(d.state.spr[SPR_SRR0], 0x0000_5000);
    assert_eq!(d.state.spr[SPR_SRR1], MSR | SRR1_ISI_NO_TRANSLATION);
    assert_eq!(d.stats().compiles, 0);
}

#[test]
fn decrementer_interrupts_loop() {
    let mut d = with_vectors(&counter(), &[(0x900, &[li(4, 9), b(0)])]);
    let ty = d
        .scheduler_mut()
        .register_exception_event("decrementer", ExceptionFlags::DECREMENTER);
    d.scheduler_mut().schedule_event(50, ty, 0);
    d.state.msr = MSR | MSR_EE;

    run_until(&mut d, |d| d.state.pc == 0x904);
    assert_eq!(d.state.gpr[3], 25);
    assert_eq!(d.state.gpr[4], 9);
    assert_eq!(d.state.spr[SPR_SRR0], CODE);
    assert_eq!(d.state.spr[SPR_SRR1], MSR | MSR_EE);
    assert!(d.state.exceptions.is_empty());
}

#[test]
fn masked_decrementer_stays_pending() {
    let mut d = with_vectors(&counter(), &[(0x900, &[b(0)])]);
    let ty = d
        .scheduler_mut()
        .register_exception_event("decrementer", ExceptionFlags::DECREMENTER);
    d.scheduler_mut().schedule_event(50, ty, 0);

    run_until(&mut d, |d| d.stats().blocks_executed == 100);
    assert_eq!(d.state.gpr[3], 100);
    assert_eq!(d.state.pc, CODE);
    assert!(d.state.exceptions.contains(ExceptionFlags::DECREMENTER));
}

#[test]
fn enabling_ee_delivers_pending_interrupt() {
    let mut d = with_vectors(
        &[ori(5, 0, 0x8030), mtmsr(5), li(3, 1)],
        &[(0x500, &[li(4, 5), b(0)])],
    );
    d.state.exceptions = ExceptionFlags::EXTERNAL_INT;
    run_until(&mut d, |d| d.state.pc == 0x504);
    assert_eq!(d.state.gpr[3], 0);
    assert_eq!(d.state.gpr[4], 5);
    assert_eq!(d.state.spr[SPR_SRR0], CODE + 8);
    assert_eq!(d.state.spr[SPR_SRR1], MSR | MSR_EE);
}

// ── Stepping ────────────────────────────────────────────────

#[test]
fn step_instruction_runs_one_instruction() {
    let code = [li(3, 1), li(4, 2), li(5, 3), b(0)];
    let mut d = dispatcher(&code);
    assert_eq!(d.step_instruction(), Ok(None));
    assert_eq!(d.state.pc, CODE + 4);
    assert_eq!(d.state.gpr[3], 1);
    assert_eq!(d.state.gpr[4], 0);
    assert_eq!(d.stats().instructions_stepped, 1);
    assert!(d.env().cache.is_empty());
    assert_eq!(d.env().cache.code().offset(), 0);

    // Stepping and block execution agree with the interpreter.
    d.step_instruction().unwrap();
    d.run_once().unwrap();
    let mut mem = memory_with(&code);
    let mut s = cpu();
    interpret(&mut s, &mut mem, 3);
    assert_eq!(arch_regs(&d.state), arch_regs(&s));
}

#[test]
fn stepping_faults_like_the_interpreter() {
    let mut d = with_vectors(&[sc()], &[(0xC00, &[b(0)])]);
    d.step_instruction().unwrap();
    assert_eq!(d.state.pc, 0xC00);
    assert_eq!(d.state.spr[SPR_SRR0], CODE + 4);

    let mut mem = memory_with(&[sc()]);
    let mut s = cpu();
    assert_eq!(
        interp::step(&mut s, &mut mem),
        interp::InterpExit::Exception(ExceptionFlags::SYSCALL)
    );
    assert_eq!(s.npc, d.state.spr[SPR_SRR0]);
}

// ── Debugging ───────────────────────────────────────────────

/// Debug host handle that stays readable after the dispatcher took it.
#[derive(Clone, Default)]
struct SharedDebugger(Arc<Mutex<Debugger>>);

impl DebugHost for SharedDebugger {
    fn is_breakpoint(&self, pc: u32) -> bool {
        self.0.lock().unwrap().is_breakpoint(pc)
    }

    fn on_debug_stop(&mut self, state: &CpuState, stop: DebugStop) {
        self.0.lock().unwrap().on_debug_stop(state, stop);
    }
}

fn debugged(code: &[u32]) -> (Dispatcher, SharedDebugger) {
    let config = JitConfig {
        enable_debugging: true,
        ..JitConfig::default()
    };
    let mut d = dispatcher_with(config, code);
    let host = SharedDebugger::default();
    d.set_debugger(Box::new(host.clone()));
    (d, host)
}

fn loop_body() -> Vec<u32> {
    vec![li(3, 1), addi(4, 4, 1), b(-8)]
}

#[test]
fn breakpoint_stops_before_block_then_resumes() {
    let (mut d, host) = debugged(&loop_body());
    host.0.lock().unwrap().breakpoints.add(CODE);

    assert_eq!(
        d.run_once(),
        Ok(Some(ExitReason::Debug(DebugStop::Breakpoint(CODE))))
    );
    assert_eq!(d.state.gpr[4], 0);
    assert_eq!(d.stats().blocks_executed, 0);

    // Resuming from the breakpoint runs the block once.
    assert_eq!(d.run_once(), Ok(None));
    assert_eq!(d.state.gpr[4], 1);
    assert_eq!(d.state.pc, CODE);

    assert_eq!(
        d.run(),
        Ok(ExitReason::Debug(DebugStop::Breakpoint(CODE)))
    );
    assert_eq!(d.state.gpr[4], 1);
    assert_eq!(d.stats().debug_stops, 2);
    assert_eq!(host.0.lock().unwrap().history().len(), 2);
}

#[test]
fn step_request_stops_once() {
    let (mut d, host) = debugged(&loop_body());
    d.control().request_step();
    assert_eq!(
        d.run_once(),
        Ok(Some(ExitReason::Debug(DebugStop::Step(CODE))))
    );
    assert_eq!(d.run_once(), Ok(None));
    assert_eq!(d.run_once(), Ok(None));
    assert_eq!(d.state.gpr[4], 2);
    assert_eq!(
        host.0.lock().unwrap().last_stop(),
        Some(DebugStop::Step(CODE))
    );
}

#[test]
fn breakpoint_wins_over_step() {
    let (mut d, host) = debugged(&loop_body());
    host.0.lock().unwrap().breakpoints.add(CODE);
    d.control().request_step();
    assert_eq!(
        d.run_once(),
        Ok(Some(ExitReason::Debug(DebugStop::Breakpoint(CODE))))
    );
}

#[test]
fn temporary_breakpoint_is_removed_on_hit() {
    let (mut d, host) = debugged(&loop_body());
    host.0.lock().unwrap().breakpoints.add_temporary(CODE);
    assert!(matches!(d.run_once(), Ok(Some(ExitReason::Debug(_)))));
    assert!(host.0.lock().unwrap().breakpoints.is_empty());
    for _ in 0..3 {
        assert_eq!(d.run_once(), Ok(None));
    }
    assert_eq!(d.stats().debug_stops, 1);
}

#[test]
fn disabled_breakpoint_is_ignored() {
    let (mut d, host) = debugged(&loop_body());
    {
        let mut dbg = host.0.lock().unwrap();
        dbg.breakpoints.add(CODE);
        dbg.breakpoints.set_enabled(CODE, false);
    }
    assert_eq!(d.run_once(), Ok(None));
    assert_eq!(d.state.gpr[4], 1);
}

#[test]
fn breakpoints_need_debugging_enabled() {
    let mut d = dispatcher(&loop_body());
    let host = SharedDebugger::default();
    host.0.lock().unwrap().breakpoints.add(CODE);
    d.set_debugger(Box::new(host.clone()));
    assert_eq!(d.run_once(), Ok(None));

    d.set_debugging(true);
    assert!(matches!(d.run_once(), Ok(Some(ExitReason::Debug(_)))));
}

// ── Control ─────────────────────────────────────────────────

#[test]
fn stop_request_is_honoured_and_cleared() {
    let mut d = dispatcher(&counter());
    let control = d.control();
    control.request_stop();
    assert_eq!(d.run(), Ok(ExitReason::Stopped));
    assert_eq!(d.stats().blocks_executed, 0);

    control.clear_stop();
    assert_eq!(d.run_once(), Ok(None));
    assert_eq!(control.block_entries(), 1);
    assert_eq!(control.block_exits(), 1);
}

#[test]
fn reset_restarts_at_address() {
    let mut d = dispatcher(&counter());
    d.run_once().unwrap();
    d.reset(CODE + 4);
    assert_eq!(d.state.pc, CODE + 4);
    assert_eq!(d.state.gpr[3], 0);
    // Compiled code survives a CPU reset.
    assert_eq!(d.env().cache.len(), 1);
}

#[test]
fn separate_memory_instances_do_not_interfere() {
    let mut a = dispatcher(&counter());
    let mut b = Dispatcher::new(JitConfig::default(), Box::new(Memory::default()));
    b.state = cpu();
    a.run_once().unwrap();
    assert!(b.memory().read_u32(CODE, mode()).is_ok_and(|w| w == 0));
}
