//! Cancellable timer scheduler driven by the event loop.
//!
//! Deadlines live in a priority queue; events with coincident deadlines fire
//! in schedule order. Cancellation is idempotent, and a timer that fires
//! after its event was cancelled finds nothing to do.

use crate::clock::Clock;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

/// Opaque identifier of a scheduled event. Never reused within a scheduler.
pub type EventId = u64;

struct ScheduledEvent {
    deadline: Instant,
    seq: u64,
    id: EventId,
    callback: Box<dyn FnOnce()>,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    // BinaryHeap is a max-heap; invert so the earliest deadline (then the
    // lowest sequence number) is popped first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority queue of deadlines indexed by an opaque event id.
pub struct Scheduler {
    clock: Rc<dyn Clock>,
    heap: RefCell<BinaryHeap<ScheduledEvent>>,
    active: RefCell<HashSet<EventId>>,
    last_id: Cell<u64>,
    last_seq: Cell<u64>,
}

impl Scheduler {
    pub fn new(clock: Rc<dyn Clock>) -> Rc<Self> {
        Rc::new(Self {
            clock,
            heap: RefCell::new(BinaryHeap::new()),
            active: RefCell::new(HashSet::new()),
            last_id: Cell::new(0),
            last_seq: Cell::new(0),
        })
    }

    /// Schedules `callback` to fire once after `delay`.
    pub fn schedule(&self, delay: Duration, callback: impl FnOnce() + 'static) -> EventId {
        let id = self.last_id.get() + 1;
        self.last_id.set(id);
        let seq = self.last_seq.get() + 1;
        self.last_seq.set(seq);

        self.heap.borrow_mut().push(ScheduledEvent {
            deadline: self.clock.now() + delay,
            seq,
            id,
            callback: Box::new(callback),
        });
        self.active.borrow_mut().insert(id);
        id
    }

    /// Cancels a scheduled event. Idempotent; cancelling an event that has
    /// already fired is a no-op.
    pub fn cancel(&self, id: EventId) {
        self.active.borrow_mut().remove(&id);
    }

    /// True if any non-cancelled event is waiting to fire.
    pub fn has_pending(&self) -> bool {
        !self.active.borrow().is_empty()
    }

    /// Deadline of the next live event, dropping cancelled entries met on
    /// the way.
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut heap = self.heap.borrow_mut();
        let active = self.active.borrow();
        while let Some(top) = heap.peek() {
            if active.contains(&top.id) {
                return Some(top.deadline);
            }
            heap.pop();
        }
        None
    }

    /// Fires every event whose deadline is at or before `now`, in deadline
    /// then schedule order. Returns the number of callbacks invoked.
    pub fn poll(&self, now: Instant) -> usize {
        let mut fired = 0;
        loop {
            let event = {
                let mut heap = self.heap.borrow_mut();
                match heap.peek() {
                    Some(top) if top.deadline <= now => heap.pop(),
                    _ => None,
                }
            };
            let Some(event) = event else { break };
            if self.active.borrow_mut().remove(&event.id) {
                (event.callback)();
                fired += 1;
            }
        }
        fired
    }
}

/// An event id that cancels its event when dropped.
pub struct ScopedEventId {
    scheduler: Weak<Scheduler>,
    id: EventId,
}

impl ScopedEventId {
    pub fn new(scheduler: &Rc<Scheduler>, id: EventId) -> Self {
        Self {
            scheduler: Rc::downgrade(scheduler),
            id,
        }
    }

    /// Cancels the event now instead of at drop time.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ScopedEventId {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.cancel(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn make() -> (Rc<MockClock>, Rc<Scheduler>) {
        let clock = Rc::new(MockClock::new());
        let scheduler = Scheduler::new(clock.clone() as Rc<dyn Clock>);
        (clock, scheduler)
    }

    #[test]
    fn fires_in_deadline_order() {
        let (clock, scheduler) = make();
        let fired = Rc::new(RefCell::new(Vec::new()));

        for (label, delay_ms) in [("b", 20u64), ("a", 10)] {
            let fired = fired.clone();
            scheduler.schedule(Duration::from_millis(delay_ms), move || {
                fired.borrow_mut().push(label);
            });
        }

        clock.advance(Duration::from_millis(15));
        scheduler.poll(clock.now());
        assert_eq!(*fired.borrow(), vec!["a"]);

        clock.advance(Duration::from_millis(15));
        scheduler.poll(clock.now());
        assert_eq!(*fired.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn coincident_deadlines_fire_in_schedule_order() {
        let (clock, scheduler) = make();
        let fired = Rc::new(RefCell::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let fired = fired.clone();
            scheduler.schedule(Duration::from_millis(5), move || {
                fired.borrow_mut().push(label);
            });
        }

        clock.advance(Duration::from_millis(5));
        scheduler.poll(clock.now());
        assert_eq!(*fired.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let (clock, scheduler) = make();
        let fired = Rc::new(Cell::new(false));

        let fired2 = fired.clone();
        let id = scheduler.schedule(Duration::from_millis(5), move || {
            fired2.set(true);
        });
        scheduler.cancel(id);
        scheduler.cancel(id);

        clock.advance(Duration::from_millis(10));
        assert_eq!(scheduler.poll(clock.now()), 0);
        assert!(!fired.get());

        // cancelling after expiry is also a no-op
        scheduler.cancel(id);
    }

    #[test]
    fn scoped_event_cancels_on_drop() {
        let (clock, scheduler) = make();
        let fired = Rc::new(Cell::new(false));

        let fired2 = fired.clone();
        let id = scheduler.schedule(Duration::from_millis(5), move || {
            fired2.set(true);
        });
        let scoped = ScopedEventId::new(&scheduler, id);
        drop(scoped);

        clock.advance(Duration::from_millis(10));
        scheduler.poll(clock.now());
        assert!(!fired.get());
    }

    #[test]
    fn callback_may_reschedule() {
        let (clock, scheduler) = make();
        let count = Rc::new(Cell::new(0u32));

        let count2 = count.clone();
        let scheduler2 = scheduler.clone();
        scheduler.schedule(Duration::from_millis(5), move || {
            count2.set(count2.get() + 1);
            let count3 = count2.clone();
            scheduler2.schedule(Duration::from_millis(0), move || {
                count3.set(count3.get() + 1);
            });
        });

        clock.advance(Duration::from_millis(5));
        scheduler.poll(clock.now());
        assert_eq!(count.get(), 2);
    }
}
