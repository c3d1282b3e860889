use ppc_core::state::SPR_SRR0;
use ppc_core::AddressingMode;
use ppc_exec::{ExitReason, HleFunction, JitConfig};

use crate::asm::*;

/// `bl` to a hooked function at `CODE + 0x100`, then `r4 = r3 + 1` and
/// spin.
fn caller() -> Vec<u32> {
    let mut code = vec![nop(); 0x42];
    code[0] = bl(0x100);
    code[1] = addi(4, 3, 1);
    code[2] = b(0);
    code[0x40] = li(3, 7);
    code[0x41] = blr();
    code
}

#[test]
fn return_value_hook_replaces_function() {
    let mut d = dispatcher(&caller());
    d.register_hle(CODE + 0x100, "get_value", HleFunction::ReturnValue(41));
    run_until(&mut d, |d| d.state.pc == CODE + 8);
    assert_eq!(d.state.gpr[3], 41);
    assert_eq!(d.state.gpr[4], 42);
    assert_eq!(d.stats().hle_calls, 1);
}

#[test]
fn unhooked_function_runs_guest_code() {
    let mut d = dispatcher(&caller());
    run_until(&mut d, |d| d.state.pc == CODE + 8);
    assert_eq!(d.state.gpr[4], 8);
    assert_eq!(d.stats().hle_calls, 0);
}

#[test]
fn stop_hook_ends_run() {
    let mut d = dispatcher(&caller());
    d.register_hle(CODE + 0x100, "exit", HleFunction::Stop);
    assert_eq!(d.run(), Ok(ExitReason::Stopped));
    assert_eq!(d.state.pc, CODE + 0x100);
    assert_eq!(d.state.lr(), CODE + 4);
}

#[test]
fn custom_hook_sees_state_and_memory() {
    let mut d = dispatcher(&caller());
    d.register_hle(
        CODE + 0x100,
        "double",
        HleFunction::Custom(Box::new(|s, mem| {
            let mode = AddressingMode::from_msr(s.msr);
            mem.write_u32(DATA, s.gpr[5] * 2, mode).unwrap();
            s.gpr[3] = 100;
        })),
    );
    d.state.gpr[5] = 21;
    run_until(&mut d, |d| d.state.pc == CODE + 8);
    assert_eq!(d.state.gpr[4], 101);
    let mode = AddressingMode::from_msr(MSR);
    assert_eq!(d.memory().read_u32(DATA, mode).unwrap(), 42);
}

#[test]
fn late_registration_drops_compiled_code() {
    let mut d = dispatcher(&caller());
    run_until(&mut d, |d| d.state.pc == CODE + 8);
    assert_eq!(d.state.gpr[3], 7);
    assert_eq!(d.stats().cache_clears, 0);

    d.register_hle(CODE + 0x100, "get_value", HleFunction::ReturnValue(9));
    assert_eq!(d.stats().cache_clears, 1);
    assert!(d.env().cache.is_empty());

    d.state.pc = CODE;
    run_until(&mut d, |d| d.state.pc == CODE + 8);
    assert_eq!(d.state.gpr[3], 9);
    assert_eq!(d.state.gpr[4], 10);
}

#[test]
fn registering_into_empty_cache_does_not_clear() {
    let mut d = dispatcher_with(JitConfig::default(), &caller());
    d.register_hle(CODE + 0x100, "noop", HleFunction::ReturnToCaller);
    assert_eq!(d.stats().cache_clears, 0);
    run_until(&mut d, |d| d.state.pc == CODE + 8);
    assert_eq!(d.state.gpr[4], 1);
}

#[test]
fn hook_on_unmapped_address_faults_instead_of_compiling() {
    let mut d = dispatcher(&caller());
    d.register_hle(0x7E00_0000, "unmapped", HleFunction::ReturnToCaller);
    for round in 1..=3 {
        d.state.msr = MSR;
        d.state.pc = 0x7E00_0000;
        assert_eq!(d.run_once(), Ok(None));
        assert_eq!(d.state.pc, 0x400);
        assert_eq!(d.state.spr[SPR_SRR0], 0x7E00_0000);
        assert_eq!(d.stats().exceptions_delivered, round);
    }
    assert_eq!(d.stats().compiles, 0);
    assert_eq!(d.stats().checksum_mismatches, 0);
    assert_eq!(d.stats().hle_calls, 0);
}
