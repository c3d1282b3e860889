use std::sync::{Arc, Mutex};

use ppc_core::{CpuState, ExceptionFlags};
use ppc_exec::{CoreTiming, EventTypeId, Scheduler};

type Log = Arc<Mutex<Vec<(u64, i64)>>>;

fn recorder(timing: &mut CoreTiming, name: &str) -> (EventTypeId, Log) {
    let log: Log = Arc::default();
    let sink = Arc::clone(&log);
    let ty = timing.register_event(
        name,
        Box::new(move |_, _, userdata, late| sink.lock().unwrap().push((userdata, late))),
    );
    (ty, log)
}

#[test]
fn slice_ends_at_next_event() {
    let mut timing = CoreTiming::new(100);
    let mut state = CpuState::new();
    let (ty, log) = recorder(&mut timing, "vi");
    timing.schedule_event(30, ty, 7);

    timing.advance(&mut state);
    assert_eq!(state.downcount, 30);
    assert!(log.lock().unwrap().is_empty());

    // Overran the slice by five cycles.
    state.downcount = -5;
    assert_eq!(timing.ticks(&state), 35);
    timing.advance(&mut state);
    assert_eq!(*log.lock().unwrap(), vec![(7, 5)]);
    assert_eq!(timing.global_timer(), 35);
    assert_eq!(state.downcount, 100);
    assert!(timing.queue().is_empty());
}

#[test]
fn slice_is_capped() {
    let mut timing = CoreTiming::new(100);
    let mut state = CpuState::new();
    let (ty, _) = recorder(&mut timing, "far");
    timing.schedule_event(1_000, ty, 0);
    timing.advance(&mut state);
    assert_eq!(state.downcount, 100);
}

#[test]
fn simultaneous_events_fire_in_schedule_order() {
    let mut timing = CoreTiming::new(100);
    let mut state = CpuState::new();
    let (a, log) = recorder(&mut timing, "a");
    timing.schedule_event(10, a, 1);
    timing.schedule_event(10, a, 2);
    timing.schedule_event(5, a, 3);
    timing.schedule_event(10, a, 4);

    timing.advance(&mut state);
    state.downcount = -20;
    timing.advance(&mut state);
    assert_eq!(
        *log.lock().unwrap(),
        vec![(3, 20), (1, 15), (2, 15), (4, 15)]
    );
}

#[test]
fn callback_can_reschedule() {
    let mut timing = CoreTiming::new(1_000);
    let mut state = CpuState::new();
    let fired = Arc::new(Mutex::new(0u32));
    let count = Arc::clone(&fired);
    // First registered type gets id 0.
    let ty = timing.register_event(
        "periodic",
        Box::new(move |_, queue, _, late| {
            *count.lock().unwrap() += 1;
            queue.schedule_event(20 - late as u64, EventTypeId(0), 0);
        }),
    );
    assert_eq!(ty, EventTypeId(0));
    assert_eq!(timing.event_name(ty), Some("periodic"));
    timing.schedule_event(20, ty, 0);

    timing.advance(&mut state);
    for _ in 0..5 {
        assert_eq!(state.downcount, 20);
        state.downcount = 0;
        timing.advance(&mut state);
    }
    assert_eq!(*fired.lock().unwrap(), 5);
    assert_eq!(timing.global_timer(), 100);
    assert!(timing.queue().is_scheduled(ty));
}

#[test]
fn exception_event_raises_flags() {
    let mut timing = CoreTiming::new(100);
    let mut state = CpuState::new();
    let ty = timing.register_exception_event("decrementer", ExceptionFlags::DECREMENTER);
    timing.schedule_event(10, ty, 0);

    timing.advance(&mut state);
    assert!(state.exceptions.is_empty());
    state.downcount = 0;
    timing.advance(&mut state);
    assert_eq!(state.exceptions, ExceptionFlags::DECREMENTER);
}

#[test]
fn removed_events_do_not_fire() {
    let mut timing = CoreTiming::new(100);
    let mut state = CpuState::new();
    let (ty, log) = recorder(&mut timing, "cancelled");
    timing.schedule_event(10, ty, 0);
    timing.queue_mut().remove_event(ty);
    assert!(!timing.queue().is_scheduled(ty));

    timing.advance(&mut state);
    state.downcount = -200;
    timing.advance(&mut state);
    assert!(log.lock().unwrap().is_empty());
}
