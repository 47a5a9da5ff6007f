//! Blocking multi-producer, multi-consumer handoff queue.
//!
//! Items come out in the order they were pushed. A bounded queue blocks
//! [`push`](HandoffQueue::push) while full; [`push_unbounded`](HandoffQueue::push_unbounded)
//! ignores the bound and never blocks. [`pop`](HandoffQueue::pop) blocks while the queue
//! is empty and open.
//!
//! Waits that are given a [`CancellationToken`] wake up every [`WAIT_SLICE`] to check it.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::cancel::CancellationToken;

/// Longest a cancellable wait sleeps before re-checking its token.
pub(crate) const WAIT_SLICE: Duration = Duration::from_millis(20);

pub(crate) struct HandoffQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> HandoffQueue<T> {
    /// Create a queue holding at most `capacity` items, or unbounded for `None`.
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Append `item`, waiting while the queue is full.
    ///
    /// Returns the item back if the queue is closed or `cancel` fires while waiting.
    pub(crate) fn push(&self, item: T, cancel: &CancellationToken) -> Result<(), T> {
        let mut state = self.state.lock();
        loop {
            if state.closed || cancel.is_cancelled() {
                return Err(item);
            }
            match self.capacity {
                Some(capacity) if state.items.len() >= capacity => {
                    self.not_full.wait_for(&mut state, WAIT_SLICE);
                }
                _ => break,
            }
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Append `item` regardless of the capacity bound or cancellation.
    pub(crate) fn push_unbounded(&self, item: T) {
        self.state.lock().items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Take the oldest item, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained, or when `cancel` fires.
    pub(crate) fn pop(&self, cancel: Option<&CancellationToken>) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            match cancel {
                Some(_) => {
                    self.not_empty.wait_for(&mut state, WAIT_SLICE);
                }
                None => self.not_empty.wait(&mut state),
            }
        }
    }

    /// Reject further pushes and wake every waiter; queued items can still be popped.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().items.len()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_fifo_order() {
        let queue = HandoffQueue::new(None);
        let cancel = CancellationToken::new();
        for i in 0..10 {
            queue.push(i, &cancel).unwrap();
        }
        let items: Vec<_> = (0..10).map(|_| queue.pop(None).unwrap()).collect();
        assert_eq!(items, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_unbounded_push_ignores_capacity() {
        let queue = HandoffQueue::new(Some(1));
        queue.push_unbounded(1);
        queue.push_unbounded(2);
        queue.push_unbounded(3);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_bounded_push_blocks_until_pop() {
        let queue = Arc::new(HandoffQueue::new(Some(2)));
        let cancel = CancellationToken::new();
        queue.push(1, &cancel).unwrap();
        queue.push(2, &cancel).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            thread::spawn(move || queue.push(3, &cancel))
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop(None), Some(1));
        producer.join().unwrap().unwrap();
        assert_eq!(queue.pop(None), Some(2));
        assert_eq!(queue.pop(None), Some(3));
    }

    #[test]
    fn test_cancel_releases_blocked_push() {
        let queue = Arc::new(HandoffQueue::new(Some(1)));
        let cancel = CancellationToken::new();
        queue.push(1, &cancel).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            thread::spawn(move || queue.push(2, &cancel))
        };
        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        assert_eq!(producer.join().unwrap(), Err(2));
    }

    #[test]
    fn test_cancel_releases_blocked_pop() {
        let queue = Arc::new(HandoffQueue::<u32>::new(None));
        let cancel = CancellationToken::new();

        let consumer = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            thread::spawn(move || queue.pop(Some(&cancel)))
        };
        let started = Instant::now();
        cancel.cancel();
        assert_eq!(consumer.join().unwrap(), None);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_close_drains_then_stops() {
        let queue = Arc::new(HandoffQueue::new(None));
        queue.push_unbounded("a");
        queue.close();
        assert!(queue.push("b", &CancellationToken::new()).is_err());
        assert_eq!(queue.pop(None), Some("a"));
        assert_eq!(queue.pop(None), None);
    }

    #[test]
    fn test_close_wakes_waiting_consumers() {
        let queue = Arc::new(HandoffQueue::<u32>::new(None));
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.pop(None))
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        queue.close();
        for consumer in consumers {
            assert_eq!(consumer.join().unwrap(), None);
        }
    }

    #[test]
    fn test_many_producers_many_consumers() {
        let queue = Arc::new(HandoffQueue::new(Some(4)));
        let cancel = CancellationToken::new();
        let producers: Vec<_> = (0..4u64)
            .map(|p| {
                let queue = Arc::clone(&queue);
                let cancel = cancel.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        queue.push(p * 1000 + i, &cancel).unwrap();
                    }
                })
            })
            .collect();
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut sum = 0u64;
                    while let Some(v) = queue.pop(None) {
                        sum += v;
                    }
                    sum
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        queue.close();
        let total: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();
        assert_eq!(total, (0..4000).sum::<u64>());
    }
}
