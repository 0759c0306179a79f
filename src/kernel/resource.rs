//! Pool - a counted semaphore with FIFO waiters
//!
//! Represents a group of N identical machines. `acquire` blocks until a
//! slot is free; `release` hands the slot to the oldest waiter if there
//! is one. There is no guard type: a process that is dropped at the end
//! of a run must not release anything, so acquire and release are
//! explicit calls.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use super::Sim;
use crate::core_types::TaskId;

struct Waiter {
    task: TaskId,
    granted: Rc<Cell<bool>>,
}

struct State {
    capacity: usize,
    available: usize,
    waiters: VecDeque<Waiter>,
}

/// Cloneable handle; all clones share one set of slots.
#[derive(Clone)]
pub struct Pool {
    sim: Sim,
    state: Rc<RefCell<State>>,
}

impl Pool {
    pub fn new(sim: &Sim, capacity: usize) -> Self {
        assert!(capacity > 0, "pool needs at least one slot");
        Pool {
            sim: sim.clone(),
            state: Rc::new(RefCell::new(State {
                capacity,
                available: capacity,
                waiters: VecDeque::new(),
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    /// Claim a slot; suspends while all slots are held.
    pub fn acquire(&self) -> Acquire {
        Acquire {
            pool: self.clone(),
            waiting: None,
        }
    }

    /// Return a slot. The oldest waiter, if any, takes it over without
    /// the free count ever rising.
    pub fn release(&self) {
        let woken = {
            let mut st = self.state.borrow_mut();
            match st.waiters.pop_front() {
                Some(w) => {
                    w.granted.set(true);
                    Some(w.task)
                }
                None => {
                    assert!(
                        st.available < st.capacity,
                        "pool released more slots than it has"
                    );
                    st.available += 1;
                    None
                }
            }
        };
        if let Some(task) = woken {
            self.sim.schedule(task, self.sim.now());
        }
    }
}

/// Future returned by [`Pool::acquire`].
pub struct Acquire {
    pool: Pool,
    waiting: Option<Rc<Cell<bool>>>,
}

impl Future for Acquire {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if let Some(granted) = &this.waiting {
            assert!(granted.get(), "pool waiter woken without a slot");
            return Poll::Ready(());
        }

        let mut st = this.pool.state.borrow_mut();
        if st.available > 0 && st.waiters.is_empty() {
            st.available -= 1;
            return Poll::Ready(());
        }
        let granted = Rc::new(Cell::new(false));
        st.waiters.push_back(Waiter {
            task: this.pool.sim.current_task(),
            granted: granted.clone(),
        });
        drop(st);
        this.waiting = Some(granted);
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grants_up_to_capacity() {
        let sim = Sim::new();
        let pool = Pool::new(&sim, 2);
        let times = Rc::new(RefCell::new(Vec::new()));

        for _ in 0..3 {
            let p = pool.clone();
            let t = times.clone();
            let s = sim.clone();
            sim.spawn(async move {
                p.acquire().await;
                t.borrow_mut().push(s.now());
                s.timeout(5.0).await;
                p.release();
            });
        }

        sim.run(20.0);
        // Two start immediately, the third waits for the first release
        assert_eq!(*times.borrow(), vec![0.0, 0.0, 5.0]);
    }

    #[test]
    fn test_waiters_acquire_fifo() {
        let sim = Sim::new();
        let pool = Pool::new(&sim, 1);
        let order = Rc::new(RefCell::new(Vec::new()));

        for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
            let p = pool.clone();
            let o = order.clone();
            let s = sim.clone();
            sim.spawn(async move {
                s.timeout(i as f64).await; // arrive a, then b, then c
                p.acquire().await;
                o.borrow_mut().push(name);
                s.timeout(10.0).await;
                p.release();
            });
        }

        sim.run(60.0);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    #[should_panic(expected = "more slots")]
    fn test_release_without_acquire_panics() {
        let sim = Sim::new();
        let pool = Pool::new(&sim, 1);
        pool.release();
    }
}
