//! Discrete-event queue with FIFO ordering among same-time events.
//!
//! Every component in the simulation suspends itself by scheduling a future
//! event here; nothing ever blocks. Cancelling an event marks its token dead
//! rather than removing the entry, so cancellation of an already-fired or
//! never-scheduled event has no side effect.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::time::Duration;

use super::event::Event;
use super::time::SimTime;

/// Token for a scheduled event. Cloning the handle shares the token.
#[derive(Debug, Clone)]
pub struct EventHandle {
    dead: Rc<Cell<bool>>,
}

impl EventHandle {
    /// Mark the event dead. The queue skips dead entries when popping;
    /// cancelling an event that already fired does nothing.
    pub fn cancel(&self) {
        self.dead.set(true);
    }

    /// Whether this event has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.dead.get()
    }
}

struct Entry {
    time: SimTime,
    seq: u64,
    dead: Rc<Cell<bool>>,
    event: Event,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the binary heap pops the earliest entry; ties break on
        // insertion order (FIFO), which the two-phase radio switch and the
        // slot-by-slot frame progression rely on.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority queue of timed events.
pub struct EventQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `event` at the absolute time `at`.
    pub fn schedule_at(&mut self, at: SimTime, event: Event) -> EventHandle {
        let dead = Rc::new(Cell::new(false));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            time: at,
            seq,
            dead: Rc::clone(&dead),
            event,
        });
        EventHandle { dead }
    }

    /// Schedule `event` to fire `delay` after `now`.
    pub fn schedule(&mut self, now: SimTime, delay: Duration, event: Event) -> EventHandle {
        self.schedule_at(now + delay, event)
    }

    /// Pop the next live event, skipping cancelled entries.
    pub fn pop(&mut self) -> Option<(SimTime, Event)> {
        loop {
            let entry = self.heap.pop()?;
            if !entry.dead.get() {
                return Some((entry.time, entry.event));
            }
        }
    }

    /// Time of the next live event, pruning cancelled entries on the way.
    pub fn next_time(&mut self) -> Option<SimTime> {
        loop {
            let (dead, time) = match self.heap.peek() {
                Some(entry) => (entry.dead.get(), entry.time),
                None => return None,
            };
            if dead {
                self.heap.pop();
            } else {
                return Some(time);
            }
        }
    }

    /// Whether any live event remains.
    pub fn is_empty(&mut self) -> bool {
        self.next_time().is_none()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::event::MacTimer;
    use crate::sim::DeviceId;

    fn mac_event(n: usize) -> Event {
        Event::Mac(DeviceId(n), MacTimer::WakeUp)
    }

    #[test]
    fn test_orders_by_time() {
        let mut q = EventQueue::new();
        q.schedule_at(SimTime::from_micros(20), mac_event(1));
        q.schedule_at(SimTime::from_micros(10), mac_event(0));

        let (t0, e0) = q.pop().unwrap();
        assert_eq!(t0, SimTime::from_micros(10));
        assert!(matches!(e0, Event::Mac(DeviceId(0), _)));
        let (t1, _) = q.pop().unwrap();
        assert_eq!(t1, SimTime::from_micros(20));
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_same_time_is_fifo() {
        let mut q = EventQueue::new();
        for n in 0..8 {
            q.schedule_at(SimTime::from_secs(1), mac_event(n));
        }
        for n in 0..8 {
            let (_, ev) = q.pop().unwrap();
            match ev {
                Event::Mac(DeviceId(i), _) => assert_eq!(i, n),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_cancelled_events_are_skipped() {
        let mut q = EventQueue::new();
        q.schedule_at(SimTime::from_micros(1), mac_event(0));
        let h = q.schedule_at(SimTime::from_micros(2), mac_event(1));
        q.schedule_at(SimTime::from_micros(3), mac_event(2));

        h.cancel();
        // cancelling twice is harmless
        h.cancel();
        assert!(h.is_cancelled());

        let (_, e0) = q.pop().unwrap();
        assert!(matches!(e0, Event::Mac(DeviceId(0), _)));
        let (_, e1) = q.pop().unwrap();
        assert!(matches!(e1, Event::Mac(DeviceId(2), _)));
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_cancel_after_fire_has_no_effect() {
        let mut q = EventQueue::new();
        let h = q.schedule_at(SimTime::from_micros(1), mac_event(0));
        assert!(q.pop().is_some());
        h.cancel();
        assert!(q.pop().is_none());
    }
}
