//! Guest exception delivery.
//!
//! Pending causes accumulate in `CpuState::exceptions`; the dispatcher
//! calls in here after blocks that raise, after MSR writes and after each
//! timing advance. One cause is delivered per call, highest priority
//! first.

use ppc_core::state::{MSR_EE, MSR_ILE, MSR_IP, MSR_LE, SPR_SRR0, SPR_SRR1};
use ppc_core::{CpuState, ExceptionFlags};
use tracing::debug;

/// MSR bits preserved into SRR1.
const SRR1_MSR_MASK: u32 = 0x87C0_FFFF;
/// MSR bits cleared on entry to a handler.
const MSR_CLEAR_ON_ENTRY: u32 = 0x0004_EF36;

/// SRR1 cause bit for an illegal instruction program exception.
pub const SRR1_PROGRAM_ILLEGAL: u32 = 0x0008_0000;
/// SRR1 cause bit for an instruction fetch with no translation.
pub const SRR1_ISI_NO_TRANSLATION: u32 = 0x4000_0000;

struct Cause {
    flag: ExceptionFlags,
    vector: u32,
    /// Return address is NPC rather than PC.
    resume_next: bool,
    srr1: u32,
}

const SYNCHRONOUS: [Cause; 6] = [
    Cause { flag: ExceptionFlags::ISI, vector: 0x400, resume_next: false, srr1: SRR1_ISI_NO_TRANSLATION },
    Cause { flag: ExceptionFlags::PROGRAM, vector: 0x700, resume_next: false, srr1: SRR1_PROGRAM_ILLEGAL },
    Cause { flag: ExceptionFlags::SYSCALL, vector: 0xC00, resume_next: true, srr1: 0 },
    Cause { flag: ExceptionFlags::FPU_UNAVAILABLE, vector: 0x800, resume_next: false, srr1: 0 },
    Cause { flag: ExceptionFlags::DSI, vector: 0x300, resume_next: false, srr1: 0 },
    Cause { flag: ExceptionFlags::ALIGNMENT, vector: 0x600, resume_next: false, srr1: 0 },
];

const EXTERNAL: [Cause; 3] = [
    Cause { flag: ExceptionFlags::EXTERNAL_INT, vector: 0x500, resume_next: true, srr1: 0 },
    Cause { flag: ExceptionFlags::PERFORMANCE_MONITOR, vector: 0xF00, resume_next: true, srr1: 0 },
    Cause { flag: ExceptionFlags::DECREMENTER, vector: 0x900, resume_next: true, srr1: 0 },
];

fn deliver(state: &mut CpuState, cause: &Cause) {
    let ret = if cause.resume_next { state.npc } else { state.pc };
    state.spr[SPR_SRR0] = ret;
    state.spr[SPR_SRR1] = (state.msr & SRR1_MSR_MASK) | cause.srr1;
    let le = if state.msr & MSR_ILE != 0 { MSR_LE } else { 0 };
    state.msr = ((state.msr & !MSR_LE) | le) & !MSR_CLEAR_ON_ENTRY;

    let base = if state.msr & MSR_IP != 0 { 0xFFF0_0000 } else { 0 };
    state.pc = base | cause.vector;
    state.npc = state.pc;
    state.exceptions.remove(cause.flag);
    debug!(
        cause = ?cause.flag,
        srr0 = format_args!("{ret:#010x}"),
        vector = format_args!("{:#010x}", state.pc),
        "exception delivered"
    );
}

/// Deliver the highest-priority pending exception, synchronous causes
/// first. Returns the cause delivered.
pub fn check_exceptions(state: &mut CpuState) -> Option<ExceptionFlags> {
    if let Some(cause) = SYNCHRONOUS.iter().find(|c| state.exceptions.contains(c.flag)) {
        deliver(state, cause);
        return Some(cause.flag);
    }
    check_external_exceptions(state)
}

/// Deliver a pending external exception if MSR.EE allows it.
pub fn check_external_exceptions(state: &mut CpuState) -> Option<ExceptionFlags> {
    if state.msr & MSR_EE == 0 {
        return None;
    }
    let cause = EXTERNAL.iter().find(|c| state.exceptions.contains(c.flag))?;
    deliver(state, cause);
    Some(cause.flag)
}
