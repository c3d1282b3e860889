//! Exclusive hand-off of the emulation context between threads.
//!
//! The emulation thread owns the context while it runs and offers it at
//! every dispatcher safe point. A foreign thread calls
//! [`CpuThread::pause`], which blocks until the emulation thread parks,
//! and gets a [`CpuThreadGuard`] with exclusive access. Dropping the
//! guard lets the emulation thread continue.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use ppc_backend::HostCodeGen;
use tracing::trace;

use crate::dispatcher::{Dispatcher, ExitReason};
use crate::error::ExecError;
use crate::timing::Scheduler;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct CpuThread<T> {
    ctx: Mutex<T>,
    /// Outstanding `pause` requests.
    requests: AtomicUsize,
    gate: Mutex<()>,
    resumed: Condvar,
}

impl<T> CpuThread<T> {
    pub fn new(ctx: T) -> Self {
        Self {
            ctx: Mutex::new(ctx),
            requests: AtomicUsize::new(0),
            gate: Mutex::new(()),
            resumed: Condvar::new(),
        }
    }

    pub fn into_inner(self) -> T {
        self.ctx.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the context as the emulation thread.
    pub fn enter(&self) -> EmuThreadLock<'_, T> {
        self.wait_for_resume();
        EmuThreadLock {
            thread: self,
            guard: Some(lock(&self.ctx)),
        }
    }

    /// Stop the emulation thread at its next safe point and take the
    /// context. Blocks until the emulation thread has parked.
    pub fn pause(&self) -> CpuThreadGuard<'_, T> {
        self.requests.fetch_add(1, Ordering::AcqRel);
        let guard = lock(&self.ctx);
        trace!("cpu thread paused");
        CpuThreadGuard {
            thread: self,
            guard: Some(guard),
        }
    }

    pub fn pause_requested(&self) -> bool {
        self.requests.load(Ordering::Acquire) > 0
    }

    fn wait_for_resume(&self) {
        let mut gate = lock(&self.gate);
        while self.pause_requested() {
            gate = self
                .resumed
                .wait(gate)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// The emulation thread's hold on the context.
pub struct EmuThreadLock<'a, T> {
    thread: &'a CpuThread<T>,
    guard: Option<MutexGuard<'a, T>>,
}

impl<T> EmuThreadLock<'_, T> {
    /// Park here if another thread asked for the context.
    pub fn safe_point(&mut self) {
        if !self.thread.pause_requested() {
            return;
        }
        drop(self.guard.take());
        self.thread.wait_for_resume();
        self.guard = Some(lock(&self.thread.ctx));
    }
}

impl<T> Deref for EmuThreadLock<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.guard {
            Some(g) => g,
            None => unreachable!("context released outside safe_point"),
        }
    }
}

impl<T> DerefMut for EmuThreadLock<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.guard {
            Some(g) => g,
            None => unreachable!("context released outside safe_point"),
        }
    }
}

/// Exclusive access to a paused emulation context.
pub struct CpuThreadGuard<'a, T> {
    thread: &'a CpuThread<T>,
    guard: Option<MutexGuard<'a, T>>,
}

impl<T> Deref for CpuThreadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.guard {
            Some(g) => g,
            None => unreachable!("guard used after release"),
        }
    }
}

impl<T> DerefMut for CpuThreadGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.guard {
            Some(g) => g,
            None => unreachable!("guard used after release"),
        }
    }
}

impl<T> Drop for CpuThreadGuard<'_, T> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let _gate = lock(&self.thread.gate);
        self.thread.requests.fetch_sub(1, Ordering::AcqRel);
        self.thread.resumed.notify_all();
        trace!("cpu thread resumed");
    }
}

/// Drive `cpu`'s dispatcher on the current thread, offering the context
/// to [`CpuThread::pause`] callers between iterations.
pub fn run_guarded<S, B>(cpu: &CpuThread<Dispatcher<S, B>>) -> Result<ExitReason, ExecError>
where
    S: Scheduler,
    B: HostCodeGen,
{
    let mut emu = cpu.enter();
    loop {
        if let Some(reason) = emu.run_once()? {
            return Ok(reason);
        }
        emu.safe_point();
    }
}
