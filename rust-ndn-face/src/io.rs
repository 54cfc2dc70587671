//! Single-threaded cooperative event loop.
//!
//! All Face state is touched only from this loop. Work enters it three ways:
//! closures posted from the loop thread itself, timers firing through the
//! [`Scheduler`], and pollers draining channels that transport reader tasks
//! fill from other threads (which wake a blocked loop through the
//! [`Notifier`]).

use crate::clock::Clock;
use crate::scheduler::Scheduler;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Cross-thread wakeup used by transports to interrupt a blocked loop.
#[derive(Debug, Default)]
pub struct Notifier {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes a loop blocked in [`Notifier::wait`].
    pub fn notify(&self) {
        let mut flag = self.flag.lock().unwrap();
        *flag = true;
        self.cond.notify_one();
    }

    /// Blocks until notified, or until `timeout` elapses when one is given.
    pub fn wait(&self, timeout: Option<Duration>) {
        let mut flag = self.flag.lock().unwrap();
        match timeout {
            Some(timeout) => {
                if !*flag {
                    let (guard, _) = self.cond.wait_timeout(flag, timeout).unwrap();
                    flag = guard;
                }
            }
            None => {
                while !*flag {
                    flag = self.cond.wait(flag).unwrap();
                }
            }
        }
        *flag = false;
    }
}

struct Poller {
    id: u64,
    poll: Box<dyn Fn() -> usize>,
    is_active: Box<dyn Fn() -> bool>,
}

/// The loop context: a FIFO of posted closures, the timer scheduler, and
/// registered transport pollers.
pub struct IoContext {
    clock: Rc<dyn Clock>,
    scheduler: Rc<Scheduler>,
    queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    pollers: RefCell<Vec<Rc<Poller>>>,
    notifier: Arc<Notifier>,
    work_guards: Cell<usize>,
    stopped: Cell<bool>,
    last_poller_id: Cell<u64>,
}

impl IoContext {
    pub fn new(clock: Rc<dyn Clock>) -> Rc<Self> {
        let scheduler = Scheduler::new(clock.clone());
        Rc::new(Self {
            clock,
            scheduler,
            queue: RefCell::new(VecDeque::new()),
            pollers: RefCell::new(Vec::new()),
            notifier: Arc::new(Notifier::new()),
            work_guards: Cell::new(0),
            stopped: Cell::new(false),
            last_poller_id: Cell::new(0),
        })
    }

    pub fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    pub fn notifier(&self) -> Arc<Notifier> {
        self.notifier.clone()
    }

    /// Enqueues a closure to run on the loop.
    pub fn post(&self, job: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(job));
        self.notifier.notify();
    }

    /// Registers a poller. `poll` drains whatever is ready and returns how
    /// many items it processed; `is_active` reports whether the poller still
    /// represents outstanding work (a receiving transport).
    pub fn register_poller(
        &self,
        poll: impl Fn() -> usize + 'static,
        is_active: impl Fn() -> bool + 'static,
    ) -> u64 {
        let id = self.last_poller_id.get() + 1;
        self.last_poller_id.set(id);
        self.pollers.borrow_mut().push(Rc::new(Poller {
            id,
            poll: Box::new(poll),
            is_active: Box::new(is_active),
        }));
        id
    }

    pub fn unregister_poller(&self, id: u64) {
        self.pollers.borrow_mut().retain(|p| p.id != id);
    }

    /// Marks the loop as having outstanding work even when idle.
    pub fn add_work_guard(&self) {
        self.work_guards.set(self.work_guards.get() + 1);
    }

    pub fn remove_work_guard(&self) {
        let guards = self.work_guards.get();
        if guards > 0 {
            self.work_guards.set(guards - 1);
        }
    }

    /// Makes [`IoContext::run`] return at the next opportunity.
    pub fn stop(&self) {
        self.stopped.set(true);
        self.notifier.notify();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Clears the stopped flag so the loop can run again.
    pub fn restart(&self) {
        self.stopped.set(false);
    }

    fn work_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
            || self.work_guards.get() > 0
            || self.scheduler.has_pending()
            || self.pollers.borrow().iter().any(|p| (p.is_active)())
    }

    /// Runs posted closures, due timers and pollers until nothing is ready.
    /// Returns the number of work items processed.
    pub fn poll(&self) -> usize {
        let mut total = 0;
        'outer: loop {
            if self.stopped.get() {
                break;
            }
            let mut n = 0;
            loop {
                let job = self.queue.borrow_mut().pop_front();
                match job {
                    Some(job) => {
                        job();
                        n += 1;
                        if self.stopped.get() {
                            total += n;
                            break 'outer;
                        }
                    }
                    None => break,
                }
            }

            n += self.scheduler.poll(self.clock.now());

            let pollers: Vec<Rc<Poller>> = self.pollers.borrow().clone();
            for poller in pollers {
                n += (poller.poll)();
            }

            if n == 0 {
                break;
            }
            total += n;
        }
        total
    }

    /// Runs until stopped or out of work, sleeping between bursts until the
    /// next timer deadline or a cross-thread notification.
    pub fn run(&self) {
        loop {
            self.poll();
            if self.stopped.get() || !self.work_pending() {
                break;
            }
            let timeout = self
                .scheduler
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(self.clock.now()));
            self.notifier.wait(timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn make() -> (Rc<MockClock>, Rc<IoContext>) {
        let clock = Rc::new(MockClock::new());
        let io = IoContext::new(clock.clone() as Rc<dyn Clock>);
        (clock, io)
    }

    #[test]
    fn posted_jobs_run_in_order() {
        let (_clock, io) = make();
        let order = Rc::new(RefCell::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let order = order.clone();
            io.post(move || order.borrow_mut().push(label));
        }
        io.poll();
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn posted_job_may_post_more() {
        let (_clock, io) = make();
        let count = Rc::new(Cell::new(0u32));

        let count2 = count.clone();
        let io2 = io.clone();
        io.post(move || {
            count2.set(count2.get() + 1);
            let count3 = count2.clone();
            io2.post(move || count3.set(count3.get() + 1));
        });
        io.poll();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn timers_fire_during_poll() {
        let (clock, io) = make();
        let fired = Rc::new(Cell::new(false));

        let fired2 = fired.clone();
        io.scheduler().schedule(Duration::from_millis(10), move || {
            fired2.set(true);
        });

        io.poll();
        assert!(!fired.get());

        clock.advance(Duration::from_millis(10));
        io.poll();
        assert!(fired.get());
    }

    #[test]
    fn run_returns_when_out_of_work() {
        let (_clock, io) = make();
        let ran = Rc::new(Cell::new(false));

        let ran2 = ran.clone();
        io.post(move || ran2.set(true));
        io.run();
        assert!(ran.get());
    }

    #[test]
    fn stop_interrupts_queue() {
        let (_clock, io) = make();
        let second_ran = Rc::new(Cell::new(false));

        let io2 = io.clone();
        io.post(move || io2.stop());
        let second = second_ran.clone();
        io.post(move || second.set(true));

        io.run();
        assert!(!second_ran.get());

        io.restart();
        io.run();
        assert!(second_ran.get());
    }
}
