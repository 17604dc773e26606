//! Shared helpers for the integration tests.

use std::cell::RefCell;
use std::rc::Rc;

use capillary::sim::SimTime;
use capillary::trace::{TraceEvent, Tracer};

/// Tracer that records every event with its timestamp.
pub struct RecordingTracer {
    log: Rc<RefCell<Vec<(SimTime, TraceEvent)>>>,
}

impl Tracer for RecordingTracer {
    fn trace(&mut self, now: SimTime, event: &TraceEvent) {
        self.log.borrow_mut().push((now, event.clone()));
    }
}

/// A recording tracer plus a handle to its log.
pub fn recording() -> (Box<RecordingTracer>, Rc<RefCell<Vec<(SimTime, TraceEvent)>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    (
        Box::new(RecordingTracer {
            log: Rc::clone(&log),
        }),
        log,
    )
}

/// Events of the log matching a predicate.
pub fn filter_events(
    log: &Rc<RefCell<Vec<(SimTime, TraceEvent)>>>,
    predicate: impl Fn(&TraceEvent) -> bool,
) -> Vec<TraceEvent> {
    log.borrow()
        .iter()
        .filter(|(_, ev)| predicate(ev))
        .map(|(_, ev)| ev.clone())
        .collect()
}
