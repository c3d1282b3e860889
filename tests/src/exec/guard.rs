use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ppc_exec::{run_guarded, CpuThread, ExitReason};

use crate::asm::*;

#[test]
fn paused_cpu_does_not_run_blocks() {
    let d = dispatcher(&[addi(3, 3, 1), b(-4)]);
    let control = d.control();
    let cpu = Arc::new(CpuThread::new(d));

    let emu = Arc::clone(&cpu);
    let handle = thread::spawn(move || run_guarded(&emu));

    while control.block_entries() < 100 {
        thread::yield_now();
    }

    let mut guard = cpu.pause();
    assert!(cpu.pause_requested());
    let entries = control.block_entries();
    assert_eq!(control.block_exits(), entries);
    let r3 = guard.state.gpr[3];
    thread::sleep(Duration::from_millis(20));
    assert_eq!(control.block_entries(), entries);
    assert_eq!(guard.state.gpr[3], r3);

    // Changes made while paused are what the emulation thread resumes with.
    guard.state.gpr[4] = 0x1234;
    control.request_stop();
    drop(guard);

    assert_eq!(handle.join().unwrap(), Ok(ExitReason::Stopped));
    let d = Arc::try_unwrap(cpu).ok().unwrap().into_inner();
    assert_eq!(d.state.gpr[4], 0x1234);
    assert!(d.state.gpr[3] >= r3);
}

#[test]
fn released_pause_lets_emulation_enter() {
    let d = dispatcher(&[addi(3, 3, 1), b(-4)]);
    let cpu = CpuThread::new(d);
    {
        let first = cpu.pause();
        assert_eq!(first.state.pc, CODE);
    }
    assert!(!cpu.pause_requested());
    let mut emu = cpu.enter();
    assert_eq!(emu.run_once(), Ok(None));
    emu.safe_point();
    assert_eq!(emu.state.gpr[3], 1);
}
