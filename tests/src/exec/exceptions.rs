use ppc_core::state::{MSR_EE, MSR_ILE, MSR_IP, MSR_LE, SPR_SRR0, SPR_SRR1};
use ppc_core::{CpuState, ExceptionFlags};
use ppc_exec::exceptions::{check_exceptions, check_external_exceptions, SRR1_PROGRAM_ILLEGAL};

use crate::asm::{cpu, CODE, MSR};

fn pending(flags: ExceptionFlags) -> CpuState {
    let mut s = cpu();
    s.npc = CODE + 4;
    s.exceptions = flags;
    s
}

#[test]
fn synchronous_priority() {
    let mut s = pending(ExceptionFlags::DSI | ExceptionFlags::PROGRAM | ExceptionFlags::ISI);
    assert_eq!(check_exceptions(&mut s), Some(ExceptionFlags::ISI));
    assert_eq!(s.pc, 0x400);
    assert_eq!(s.spr[SPR_SRR0], CODE);
    assert_eq!(s.spr[SPR_SRR1], MSR | 0x4000_0000);
    assert_eq!(check_exceptions(&mut s), Some(ExceptionFlags::PROGRAM));
    assert_eq!(s.pc, 0x700);
    assert_eq!(s.spr[SPR_SRR1] & SRR1_PROGRAM_ILLEGAL, SRR1_PROGRAM_ILLEGAL);
    assert_eq!(check_exceptions(&mut s), Some(ExceptionFlags::DSI));
    assert_eq!(s.pc, 0x300);
    assert_eq!(check_exceptions(&mut s), None);
}

#[test]
fn syscall_returns_past_instruction() {
    let mut s = pending(ExceptionFlags::SYSCALL);
    check_exceptions(&mut s);
    assert_eq!(s.pc, 0xC00);
    assert_eq!(s.npc, 0xC00);
    assert_eq!(s.spr[SPR_SRR0], CODE + 4);
    assert!(s.exceptions.is_empty());
}

#[test]
fn entry_clears_translation_and_interrupts() {
    let mut s = pending(ExceptionFlags::DSI);
    s.msr = MSR | MSR_EE;
    check_exceptions(&mut s);
    assert_eq!(s.msr, 0);
    assert_eq!(s.spr[SPR_SRR1], MSR | MSR_EE);
}

#[test]
fn vector_prefix_and_little_endian_entry() {
    let mut s = pending(ExceptionFlags::SYSCALL);
    s.msr = MSR | MSR_IP | MSR_ILE;
    check_exceptions(&mut s);
    assert_eq!(s.pc, 0xFFF0_0C00);
    assert_eq!(s.msr, MSR_IP | MSR_ILE | MSR_LE);
}

#[test]
fn external_causes_wait_for_ee() {
    let mut s = pending(ExceptionFlags::DECREMENTER | ExceptionFlags::EXTERNAL_INT);
    assert_eq!(check_exceptions(&mut s), None);
    assert_eq!(check_external_exceptions(&mut s), None);
    assert_eq!(s.pc, CODE);

    s.msr |= MSR_EE;
    assert_eq!(check_external_exceptions(&mut s), Some(ExceptionFlags::EXTERNAL_INT));
    assert_eq!(s.pc, 0x500);
    assert_eq!(s.spr[SPR_SRR0], CODE + 4);
    // Delivery masked EE again.
    assert_eq!(check_external_exceptions(&mut s), None);
    assert_eq!(s.exceptions, ExceptionFlags::DECREMENTER);

    s.msr |= MSR_EE;
    assert_eq!(check_exceptions(&mut s), Some(ExceptionFlags::DECREMENTER));
    assert_eq!(s.pc, 0x900);
}

#[test]
fn synchronous_beats_external() {
    let mut s = pending(ExceptionFlags::EXTERNAL_INT | ExceptionFlags::ALIGNMENT);
    s.msr |= MSR_EE;
    assert_eq!(check_exceptions(&mut s), Some(ExceptionFlags::ALIGNMENT));
    assert_eq!(s.pc, 0x600);
}
