use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Requests from other threads, consumed by the dispatcher at its next
/// safe point. Shared through an `Arc`; nothing here needs the CPU
/// thread guard.
#[derive(Debug, Default)]
pub struct CpuControl {
    stop: AtomicBool,
    step: AtomicBool,
    has_invalidations: AtomicBool,
    invalidations: Mutex<Vec<(u32, u32)>>,
    block_entries: AtomicU64,
    block_exits: AtomicU64,
}

impl CpuControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn request_step(&self) {
        self.step.store(true, Ordering::Release);
    }

    /// Consume a pending single-step request.
    pub fn take_step(&self) -> bool {
        self.step.swap(false, Ordering::AcqRel)
    }

    /// Queue an instruction-cache invalidation of `[start, start + len)`
    /// (physical addresses).
    pub fn queue_invalidation(&self, start: u32, len: u32) {
        self.invalidations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((start, len));
        self.has_invalidations.store(true, Ordering::Release);
    }

    /// Take every queued invalidation.
    pub fn drain_invalidations(&self) -> Vec<(u32, u32)> {
        if !self.has_invalidations.swap(false, Ordering::AcqRel) {
            return Vec::new();
        }
        std::mem::take(&mut *self.invalidations.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn block_entered(&self) {
        self.block_entries.fetch_add(1, Ordering::AcqRel);
    }

    pub fn block_exited(&self) {
        self.block_exits.fetch_add(1, Ordering::AcqRel);
    }

    pub fn block_entries(&self) -> u64 {
        self.block_entries.load(Ordering::Acquire)
    }

    pub fn block_exits(&self) -> u64 {
        self.block_exits.load(Ordering::Acquire)
    }
}
