//! Cycle accounting between blocks.
//!
//! The dispatcher only knows `downcount`: translated code subtracts from
//! it, and once it reaches zero the [`Scheduler`] gets control to run due
//! events and start the next slice.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ppc_core::{CpuState, ExceptionFlags};
use tracing::trace;

/// Owner of `downcount` semantics.
pub trait Scheduler: Send {
    /// Called when `downcount <= 0`. Runs due events and refills
    /// `downcount` with the length of the next slice.
    fn advance(&mut self, state: &mut CpuState);
}

/// Handle to a registered event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventTypeId(pub usize);

/// Event callback: `(state, queue, userdata, cycles_late)`.
pub type TimedCallback = Box<dyn FnMut(&mut CpuState, &mut EventQueue, u64, i64) + Send>;

struct EventType {
    name: String,
    callback: TimedCallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Event {
    time: u64,
    /// FIFO order among events due at the same time.
    seq: u64,
    ty: EventTypeId,
    userdata: u64,
}

/// Pending events, ordered by due time.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Event>>,
    seq: u64,
    now: u64,
}

impl EventQueue {
    /// Cycle count at the start of the current slice.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Schedule `ty` to fire `cycles` after the current slice start.
    pub fn schedule_event(&mut self, cycles: u64, ty: EventTypeId, userdata: u64) {
        self.seq += 1;
        self.heap.push(Reverse(Event {
            time: self.now + cycles,
            seq: self.seq,
            ty,
            userdata,
        }));
    }

    /// Remove every pending instance of `ty`.
    pub fn remove_event(&mut self, ty: EventTypeId) {
        self.heap.retain(|Reverse(e)| e.ty != ty);
    }

    pub fn is_scheduled(&self, ty: EventTypeId) -> bool {
        self.heap.iter().any(|Reverse(e)| e.ty == ty)
    }

    pub fn next_time(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(e)| e.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn pop_due(&mut self) -> Option<Event> {
        match self.heap.peek() {
            Some(Reverse(e)) if e.time <= self.now => self.heap.pop().map(|Reverse(e)| e),
            _ => None,
        }
    }
}

/// Event-driven [`Scheduler`] with a global cycle timer.
pub struct CoreTiming {
    types: Vec<EventType>,
    queue: EventQueue,
    /// Length of the slice currently being executed.
    slice_length: i32,
    max_slice_cycles: i32,
}

impl CoreTiming {
    pub fn new(max_slice_cycles: i32) -> Self {
        Self {
            types: Vec::new(),
            queue: EventQueue::default(),
            slice_length: 0,
            max_slice_cycles: max_slice_cycles.max(1),
        }
    }

    pub fn register_event(&mut self, name: &str, callback: TimedCallback) -> EventTypeId {
        self.types.push(EventType {
            name: name.to_string(),
            callback,
        });
        EventTypeId(self.types.len() - 1)
    }

    /// Register an event that raises `flags` on the CPU when it fires.
    ///
    /// Used for interrupt sources such as the decrementer.
    pub fn register_exception_event(&mut self, name: &str, flags: ExceptionFlags) -> EventTypeId {
        self.register_event(
            name,
            Box::new(move |state, _, _, _| state.exceptions |= flags),
        )
    }

    pub fn event_name(&self, ty: EventTypeId) -> Option<&str> {
        self.types.get(ty.0).map(|t| t.name.as_str())
    }

    pub fn schedule_event(&mut self, cycles: u64, ty: EventTypeId, userdata: u64) {
        self.queue.schedule_event(cycles, ty, userdata);
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut EventQueue {
        &mut self.queue
    }

    /// Cycles accounted at the start of the current slice.
    pub fn global_timer(&self) -> u64 {
        self.queue.now
    }

    /// Cycles executed so far, including the current slice.
    pub fn ticks(&self, state: &CpuState) -> u64 {
        let done = (self.slice_length - state.downcount).max(0) as u64;
        self.queue.now + done
    }

    fn next_slice(&self) -> i32 {
        let max = self.max_slice_cycles;
        match self.queue.next_time() {
            Some(t) => (t.saturating_sub(self.queue.now)).clamp(1, max as u64) as i32,
            None => max,
        }
    }
}

impl Scheduler for CoreTiming {
    fn advance(&mut self, state: &mut CpuState) {
        let executed = (self.slice_length - state.downcount).max(0) as u64;
        self.queue.now += executed;

        while let Some(ev) = self.queue.pop_due() {
            let late = (self.queue.now - ev.time) as i64;
            trace!(event = ev.ty.0, late, "timing event");
            if let Some(t) = self.types.get_mut(ev.ty.0) {
                (t.callback)(state, &mut self.queue, ev.userdata, late);
            }
        }

        self.slice_length = self.next_slice();
        state.downcount = self.slice_length;
    }
}
