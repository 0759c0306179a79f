//! Container - a scalar level with capacity
//!
//! Holds bulk stock (tonnes of clay, square metres of finished tiles).
//! `put` blocks while the amount would overflow the capacity, `get`
//! blocks while the level is short. Waiters on each side are kept in
//! insertion-order lists and served from the front, stopping at the
//! first waiter that cannot be satisfied; a blocked large request is
//! never overtaken by a later small one.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use super::Sim;
use crate::core_types::{Qty, TaskId};

struct Waiter {
    task: TaskId,
    qty: Qty,
    granted: Rc<Cell<bool>>,
}

struct State {
    capacity: Qty,
    level: Qty,
    get_waiters: VecDeque<Waiter>,
    put_waiters: VecDeque<Waiter>,
}

/// Cloneable handle; all clones share one level.
#[derive(Clone)]
pub struct Container {
    sim: Sim,
    state: Rc<RefCell<State>>,
}

impl Container {
    pub fn new(sim: &Sim, capacity: Qty, initial: Qty) -> Self {
        assert!(
            capacity > 0.0 && initial >= 0.0 && initial <= capacity,
            "container needs 0 <= initial <= capacity, got {initial}/{capacity}"
        );
        Container {
            sim: sim.clone(),
            state: Rc::new(RefCell::new(State {
                capacity,
                level: initial,
                get_waiters: VecDeque::new(),
                put_waiters: VecDeque::new(),
            })),
        }
    }

    pub fn level(&self) -> Qty {
        self.state.borrow().level
    }

    pub fn capacity(&self) -> Qty {
        self.state.borrow().capacity
    }

    /// Add `qty` to the level; suspends while it would not fit.
    pub fn put(&self, qty: Qty) -> ContainerOp {
        self.op(Side::Put, qty)
    }

    /// Remove `qty` from the level; suspends while the level is short.
    pub fn get(&self, qty: Qty) -> ContainerOp {
        self.op(Side::Get, qty)
    }

    fn op(&self, side: Side, qty: Qty) -> ContainerOp {
        let capacity = self.state.borrow().capacity;
        assert!(
            qty >= 0.0 && qty <= capacity,
            "container {side:?} of {qty} outside [0, {capacity}]"
        );
        ContainerOp {
            container: self.clone(),
            side,
            qty,
            waiting: None,
        }
    }

    /// Serve waiters from the front of both queues until neither side
    /// can progress. Each grant moves the level immediately; the woken
    /// process only observes a transfer that already happened.
    fn rebalance(&self) {
        loop {
            let mut progressed = false;
            loop {
                let grant = {
                    let mut st = self.state.borrow_mut();
                    match st.get_waiters.front() {
                        Some(w) if st.level >= w.qty => {
                            let w = st.get_waiters.pop_front().unwrap();
                            st.level -= w.qty;
                            Some(w)
                        }
                        _ => None,
                    }
                };
                match grant {
                    Some(w) => {
                        self.complete(w);
                        progressed = true;
                    }
                    None => break,
                }
            }
            loop {
                let grant = {
                    let mut st = self.state.borrow_mut();
                    match st.put_waiters.front() {
                        Some(w) if st.capacity - st.level >= w.qty => {
                            let w = st.put_waiters.pop_front().unwrap();
                            st.level += w.qty;
                            Some(w)
                        }
                        _ => None,
                    }
                };
                match grant {
                    Some(w) => {
                        self.complete(w);
                        progressed = true;
                    }
                    None => break,
                }
            }
            if !progressed {
                break;
            }
        }
    }

    fn complete(&self, w: Waiter) {
        w.granted.set(true);
        // The running process sees the grant when its poll returns;
        // everyone else needs a wake event.
        if !self.sim.is_current(w.task) {
            self.sim.schedule(w.task, self.sim.now());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Put,
    Get,
}

/// Future for a pending container put or get.
pub struct ContainerOp {
    container: Container,
    side: Side,
    qty: Qty,
    waiting: Option<Rc<Cell<bool>>>,
}

impl Future for ContainerOp {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if let Some(granted) = &this.waiting {
            assert!(granted.get(), "container waiter woken without grant");
            return Poll::Ready(());
        }

        let granted = Rc::new(Cell::new(false));
        let task = this.container.sim.current_task();
        {
            let mut st = this.container.state.borrow_mut();
            let waiter = Waiter {
                task,
                qty: this.qty,
                granted: granted.clone(),
            };
            match this.side {
                Side::Put => st.put_waiters.push_back(waiter),
                Side::Get => st.get_waiters.push_back(waiter),
            }
        }
        this.container.rebalance();
        if granted.get() {
            // Satisfied without suspending: the level has already
            // moved, no other process ran in between.
            Poll::Ready(())
        } else {
            this.waiting = Some(granted);
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_get_and_put() {
        let sim = Sim::new();
        let c = Container::new(&sim, 100.0, 40.0);
        let c2 = c.clone();
        sim.spawn(async move {
            c2.get(15.0).await;
            c2.put(5.0).await;
        });
        sim.run(0.0);
        assert_eq!(c.level(), 30.0);
    }

    #[test]
    fn test_get_blocks_until_refill() {
        let sim = Sim::new();
        let c = Container::new(&sim, 100.0, 10.0);
        let done = Rc::new(Cell::new(-1.0));

        let c2 = c.clone();
        let d = done.clone();
        let s = sim.clone();
        sim.spawn(async move {
            c2.get(25.0).await;
            d.set(s.now());
        });

        let c2 = c.clone();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(8.0).await;
            c2.put(20.0).await;
        });

        sim.run(20.0);
        assert_eq!(done.get(), 8.0);
        assert_eq!(c.level(), 5.0);
    }

    #[test]
    fn test_get_waiters_served_fifo() {
        let sim = Sim::new();
        let c = Container::new(&sim, 100.0, 0.0);
        let order = Rc::new(RefCell::new(Vec::new()));

        for (name, qty) in [("a", 10.0), ("b", 10.0), ("c", 10.0)] {
            let c2 = c.clone();
            let o = order.clone();
            sim.spawn(async move {
                c2.get(qty).await;
                o.borrow_mut().push(name);
            });
        }

        let c2 = c.clone();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(1.0).await;
            c2.put(20.0).await; // enough for a and b only
            s.timeout(1.0).await;
            c2.put(10.0).await; // now c
        });

        sim.run(5.0);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_blocked_head_is_not_overtaken() {
        let sim = Sim::new();
        let c = Container::new(&sim, 100.0, 0.0);
        let order = Rc::new(RefCell::new(Vec::new()));

        // Big request arrives first and must be served first even
        // though the later small request would fit.
        let c2 = c.clone();
        let o = order.clone();
        sim.spawn(async move {
            c2.get(50.0).await;
            o.borrow_mut().push("big");
        });
        let c2 = c.clone();
        let o = order.clone();
        sim.spawn(async move {
            c2.get(5.0).await;
            o.borrow_mut().push("small");
        });

        let c2 = c.clone();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(1.0).await;
            c2.put(10.0).await;
            assert_eq!(c2.level(), 10.0); // nobody served yet
            s.timeout(1.0).await;
            c2.put(45.0).await; // 55 available: big (50) then small (5)
        });

        sim.run(5.0);
        assert_eq!(*order.borrow(), vec!["big", "small"]);
        assert_eq!(c.level(), 0.0);
    }

    #[test]
    fn test_put_blocks_at_capacity() {
        let sim = Sim::new();
        let c = Container::new(&sim, 50.0, 45.0);
        let done = Rc::new(Cell::new(-1.0));

        let c2 = c.clone();
        let d = done.clone();
        let s = sim.clone();
        sim.spawn(async move {
            c2.put(10.0).await; // 55 > 50, blocks
            d.set(s.now());
        });

        let c2 = c.clone();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(3.0).await;
            c2.get(20.0).await;
        });

        sim.run(10.0);
        assert_eq!(done.get(), 3.0);
        assert_eq!(c.level(), 35.0);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_get_more_than_capacity_panics() {
        let sim = Sim::new();
        let c = Container::new(&sim, 50.0, 10.0);
        let _ = c.get(60.0);
    }

    #[test]
    fn test_level_never_outside_bounds() {
        let sim = Sim::new();
        let c = Container::new(&sim, 30.0, 15.0);

        for i in 0..10 {
            let c2 = c.clone();
            let s = sim.clone();
            sim.spawn(async move {
                s.timeout(i as f64 * 0.5).await;
                c2.put(10.0).await;
                s.timeout(0.25).await;
                c2.get(10.0).await;
            });
        }
        let c2 = c.clone();
        let s = sim.clone();
        sim.spawn(async move {
            loop {
                assert!(c2.level() >= 0.0 && c2.level() <= c2.capacity());
                s.timeout(0.1).await;
            }
        });

        sim.run(20.0);
        assert_eq!(c.level(), 15.0);
    }
}
