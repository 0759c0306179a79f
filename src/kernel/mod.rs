//! Virtual-time simulation kernel
//!
//! A single-threaded cooperative scheduler. Processes are plain `async`
//! blocks; the only suspension points are the futures handed out by the
//! kernel primitives:
//!
//! - [`Sim::timeout`] - resume after a virtual delay
//! - [`Container`] put/get - scalar level with capacity, blocks on
//!   over/underflow
//! - [`Store`] get - unbounded typed FIFO, blocks while empty
//! - [`Pool`] acquire - counted semaphore with FIFO waiters
//!
//! Everything between two awaits runs to completion in one step, so a
//! process can read levels and then draw stock with no other process
//! interleaving.
//!
//! # Event ordering
//!
//! The calendar is a min-heap keyed by `(time, seq)`. Every schedule
//! operation takes a fresh sequence number, so events that fire at the
//! same virtual time dispatch in the order they were scheduled. Wake-ups
//! caused by state changes (a put refilling a container, a store put, a
//! pool release) are scheduled at the current time with a fresh seq,
//! which resumes the process whose condition was satisfied first, first.

use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::core_types::{Seq, SimTime, TaskId};

pub mod container;
pub mod resource;
pub mod store;

pub use container::Container;
pub use resource::Pool;
pub use store::Store;

type TaskFuture = Pin<Box<dyn Future<Output = ()>>>;

/// One entry in the event calendar.
struct ScheduledWake {
    time: SimTime,
    seq: Seq,
    task: TaskId,
}

impl PartialEq for ScheduledWake {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for ScheduledWake {}

impl PartialOrd for ScheduledWake {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledWake {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

struct Core {
    now: SimTime,
    next_seq: Seq,
    calendar: BinaryHeap<Reverse<ScheduledWake>>,
    /// Task slab. A slot goes `None` when its process returns; indices
    /// are never reused.
    tasks: Vec<Option<TaskFuture>>,
    /// Task currently being polled, if any.
    current: Option<TaskId>,
}

impl Core {
    fn push_wake(&mut self, task: TaskId, time: SimTime) {
        assert!(!time.is_nan(), "scheduled wake at NaN time");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.calendar.push(Reverse(ScheduledWake { time, seq, task }));
    }
}

/// Handle to the simulation environment. Cheap to clone; every clone
/// refers to the same event loop.
#[derive(Clone)]
pub struct Sim {
    core: Rc<RefCell<Core>>,
}

impl Sim {
    pub fn new() -> Self {
        Sim {
            core: Rc::new(RefCell::new(Core {
                now: 0.0,
                next_seq: 0,
                calendar: BinaryHeap::new(),
                tasks: Vec::new(),
                current: None,
            })),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.core.borrow().now
    }

    /// Register a process. Its first step runs as a distinct event at
    /// the current time, after everything already scheduled for now.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + 'static,
    {
        let mut core = self.core.borrow_mut();
        let task = core.tasks.len();
        core.tasks.push(Some(Box::pin(fut)));
        let now = core.now;
        core.push_wake(task, now);
    }

    /// Resume after `delay` virtual hours. `delay = 0` still costs one
    /// simulation step.
    pub fn timeout(&self, delay: f64) -> Timeout {
        Timeout {
            sim: self.clone(),
            delay,
            fire_at: None,
        }
    }

    /// Process every event with `time <= until`, then advance `now` to
    /// `until`. Can be called repeatedly with increasing horizons.
    pub fn run(&self, until: SimTime) {
        assert!(
            until >= self.now(),
            "run(until={until}) would move time backwards"
        );
        loop {
            let due = self
                .core
                .borrow()
                .calendar
                .peek()
                .is_some_and(|Reverse(w)| w.time <= until);
            if !due {
                self.core.borrow_mut().now = until;
                break;
            }
            let wake = {
                let mut core = self.core.borrow_mut();
                let Reverse(w) = core.calendar.pop().unwrap();
                w
            };
            let mut fut = {
                let mut core = self.core.borrow_mut();
                core.now = wake.time;
                match core.tasks[wake.task].take() {
                    Some(f) => f,
                    None => continue, // process already returned
                }
            };
            self.core.borrow_mut().current = Some(wake.task);
            let mut cx = Context::from_waker(Waker::noop());
            let done = fut.as_mut().poll(&mut cx).is_ready();
            let mut core = self.core.borrow_mut();
            core.current = None;
            if !done {
                core.tasks[wake.task] = Some(fut);
            }
        }
    }

    /// Schedule a wake-up for `task` at `time` with a fresh seq.
    pub(crate) fn schedule(&self, task: TaskId, time: SimTime) {
        self.core.borrow_mut().push_wake(task, time);
    }

    /// The task being polled right now. Primitives call this on their
    /// first poll to learn who to wake later.
    pub(crate) fn current_task(&self) -> TaskId {
        self.core
            .borrow()
            .current
            .expect("kernel primitive used outside a running process")
    }

    /// True while some task is being polled and it is `task`. Grants for
    /// the currently-running task must not schedule a wake: the poll in
    /// progress observes the grant and returns `Ready` directly.
    pub(crate) fn is_current(&self, task: TaskId) -> bool {
        self.core.borrow().current == Some(task)
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`Sim::timeout`].
pub struct Timeout {
    sim: Sim,
    delay: f64,
    fire_at: Option<SimTime>,
}

impl Future for Timeout {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        match this.fire_at {
            None => {
                assert!(this.delay >= 0.0, "negative timeout: {}", this.delay);
                let mut core = this.sim.core.borrow_mut();
                let task = core.current.expect("timeout awaited outside a process");
                let at = core.now + this.delay;
                core.push_wake(task, at);
                this.fire_at = Some(at);
                Poll::Pending
            }
            Some(_) => Poll::Ready(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_empty_run_advances_clock() {
        let sim = Sim::new();
        sim.run(100.0);
        assert_eq!(sim.now(), 100.0);
        // Running again further is fine
        sim.run(250.0);
        assert_eq!(sim.now(), 250.0);
    }

    #[test]
    fn test_timeout_sequencing() {
        let sim = Sim::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(3.0).await;
            l.borrow_mut().push(("a", s.now()));
            s.timeout(2.0).await;
            l.borrow_mut().push(("a", s.now()));
        });

        let l = log.clone();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(4.0).await;
            l.borrow_mut().push(("b", s.now()));
        });

        sim.run(10.0);
        assert_eq!(
            *log.borrow(),
            vec![("a", 3.0), ("b", 4.0), ("a", 5.0)]
        );
    }

    #[test]
    fn test_same_time_fires_in_insertion_order() {
        let sim = Sim::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let l = log.clone();
            let s = sim.clone();
            sim.spawn(async move {
                s.timeout(5.0).await;
                l.borrow_mut().push(name);
            });
        }

        sim.run(5.0);
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_zero_timeout_is_a_distinct_step() {
        let sim = Sim::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        let s = sim.clone();
        sim.spawn(async move {
            l.borrow_mut().push("a:start");
            s.timeout(0.0).await;
            l.borrow_mut().push("a:resumed");
        });

        let l = log.clone();
        sim.spawn(async move {
            l.borrow_mut().push("b:start");
        });

        sim.run(0.0);
        // "a" yields at the zero timeout and "b" runs before it resumes
        assert_eq!(
            *log.borrow(),
            vec!["a:start", "b:start", "a:resumed"]
        );
    }

    #[test]
    fn test_events_beyond_horizon_stay_queued() {
        let sim = Sim::new();
        let fired = Rc::new(RefCell::new(false));

        let f = fired.clone();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(50.0).await;
            *f.borrow_mut() = true;
        });

        sim.run(49.0);
        assert!(!*fired.borrow());
        assert_eq!(sim.now(), 49.0);

        sim.run(50.0);
        assert!(*fired.borrow());
        assert_eq!(sim.now(), 50.0);
    }

    #[test]
    #[should_panic(expected = "negative timeout")]
    fn test_negative_timeout_panics() {
        let sim = Sim::new();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(-1.0).await;
        });
        sim.run(1.0);
    }

    #[test]
    fn test_spawn_from_inside_a_process() {
        let sim = Sim::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(1.0).await;
            let l2 = l.clone();
            let s2 = s.clone();
            s.spawn(async move {
                s2.timeout(2.0).await;
                l2.borrow_mut().push(("child", s2.now()));
            });
            l.borrow_mut().push(("parent", s.now()));
        });

        sim.run(10.0);
        assert_eq!(*log.borrow(), vec![("parent", 1.0), ("child", 3.0)]);
    }
}
