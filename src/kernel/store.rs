//! Store - an unbounded typed FIFO queue
//!
//! Carries discrete items (production batches, customer orders) between
//! processes. `put` never blocks; `get` blocks while the store is empty
//! and returns the oldest item. Get-waiters are served strictly FIFO,
//! so when several workers drain one store the item goes to whichever
//! worker has been waiting longest.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use super::Sim;
use crate::core_types::TaskId;

struct Waiter<T> {
    task: TaskId,
    slot: Rc<RefCell<Option<T>>>,
}

struct State<T> {
    items: VecDeque<T>,
    waiters: VecDeque<Waiter<T>>,
}

/// Cloneable handle; all clones share one queue.
pub struct Store<T> {
    sim: Sim,
    state: Rc<RefCell<State<T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Store {
            sim: self.sim.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> Store<T> {
    pub fn new(sim: &Sim) -> Self {
        Store {
            sim: sim.clone(),
            state: Rc::new(RefCell::new(State {
                items: VecDeque::new(),
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Number of queued items (zero while consumers are keeping up).
    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue an item. If a consumer is waiting, the item is handed to
    /// the oldest waiter and the queue itself stays empty.
    pub fn put(&self, item: T) {
        let woken = {
            let mut st = self.state.borrow_mut();
            match st.waiters.pop_front() {
                Some(w) => {
                    *w.slot.borrow_mut() = Some(item);
                    Some(w.task)
                }
                None => {
                    st.items.push_back(item);
                    None
                }
            }
        };
        if let Some(task) = woken {
            self.sim.schedule(task, self.sim.now());
        }
    }

    /// Take the oldest item; suspends while the store is empty.
    pub fn get(&self) -> StoreGet<T> {
        StoreGet {
            store: self.clone(),
            slot: None,
        }
    }
}

/// Future returned by [`Store::get`].
pub struct StoreGet<T> {
    store: Store<T>,
    slot: Option<Rc<RefCell<Option<T>>>>,
}

impl<T> Future for StoreGet<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        if let Some(slot) = &this.slot {
            let item = slot
                .borrow_mut()
                .take()
                .expect("store waiter woken without an item");
            return Poll::Ready(item);
        }

        let mut st = this.store.state.borrow_mut();
        if let Some(item) = st.items.pop_front() {
            return Poll::Ready(item);
        }
        let slot = Rc::new(RefCell::new(None));
        st.waiters.push_back(Waiter {
            task: this.store.sim.current_task(),
            slot: slot.clone(),
        });
        drop(st);
        this.slot = Some(slot);
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_items() {
        let sim = Sim::new();
        let store: Store<u32> = Store::new(&sim);
        let got = Rc::new(RefCell::new(Vec::new()));

        let st = store.clone();
        sim.spawn(async move {
            st.put(1);
            st.put(2);
            st.put(3);
        });

        let st = store.clone();
        let g = got.clone();
        sim.spawn(async move {
            for _ in 0..3 {
                g.borrow_mut().push(st.get().await);
            }
        });

        sim.run(0.0);
        assert_eq!(*got.borrow(), vec![1, 2, 3]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_blocks_until_put() {
        let sim = Sim::new();
        let store: Store<&'static str> = Store::new(&sim);
        let got = Rc::new(RefCell::new(Vec::new()));

        let st = store.clone();
        let g = got.clone();
        let s = sim.clone();
        sim.spawn(async move {
            let item = st.get().await;
            g.borrow_mut().push((item, s.now()));
        });

        let st = store.clone();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(7.0).await;
            st.put("batch");
        });

        sim.run(10.0);
        assert_eq!(*got.borrow(), vec![("batch", 7.0)]);
    }

    #[test]
    fn test_waiters_served_in_arrival_order() {
        let sim = Sim::new();
        let store: Store<u32> = Store::new(&sim);
        let got = Rc::new(RefCell::new(Vec::new()));

        for worker in 0..3u32 {
            let st = store.clone();
            let g = got.clone();
            sim.spawn(async move {
                let item = st.get().await;
                g.borrow_mut().push((worker, item));
            });
        }

        let st = store.clone();
        let s = sim.clone();
        sim.spawn(async move {
            s.timeout(1.0).await;
            st.put(10);
            st.put(20);
            st.put(30);
        });

        sim.run(2.0);
        assert_eq!(*got.borrow(), vec![(0, 10), (1, 20), (2, 30)]);
    }
}
