// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded circular queue with displacement semantics.
//!
//! A [`Cirq`] holds up to a fixed number of owned records. Producers never
//! block: a put onto a full queue evicts the oldest record and hands it back
//! to the caller. Consumers block for a bounded amount of time. The queue
//! keeps lifetime counters so the supervisor can report put/get/drop totals.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Failure to create a [`Cirq`].
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum CirqError {
    /// A queue of fewer than two slots cannot distinguish empty from full.
    #[error("capacity must be at least 2")]
    Capacity,
}

/// Lifetime counters, readable (and optionally clearable) via [`Cirq::stat`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CirqStats {
    pub puts: u64,
    pub gets: u64,
    pub drops: u64,
}

/// The mutex-protected portion of the queue.
///
/// There are two cases where the read and write indices point to the same
/// slot: when the queue is empty and when it is full. The difference is
/// that in the first case the slot at the read index is vacant.
struct Slots<T> {
    slots: Vec<Option<T>>,
    ridx: usize,
    widx: usize,
    nput: u64,
    nget: u64,
    ndrop: u64,
}

/// Fixed-capacity multi-producer multi-consumer ring.
pub struct Cirq<T> {
    inner: Mutex<Slots<T>>,
    cond: Condvar,
}

impl<T> Cirq<T> {
    /// Creates a queue with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Result<Self, CirqError> {
        if capacity < 2 {
            return Err(CirqError::Capacity);
        }
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Ok(Cirq {
            inner: Mutex::new(Slots {
                slots,
                ridx: 0,
                widx: 0,
                nput: 0,
                nget: 0,
                ndrop: 0,
            }),
            cond: Condvar::new(),
        })
    }

    /// Returns the number of records currently queued.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("lock poisoned");
        debug_assert!(inner.ridx < inner.slots.len());
        debug_assert!(inner.widx < inner.slots.len());
        if inner.widx == inner.ridx {
            if inner.slots[inner.ridx].is_none() {
                0
            } else {
                inner.slots.len()
            }
        } else {
            (inner.widx + inner.slots.len() - inner.ridx) % inner.slots.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Places a record onto the queue. If the queue is full, the oldest
    /// record is displaced and returned; the caller owns its destruction.
    pub fn put(&self, obj: T) -> Option<T> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        debug_assert!(inner.ridx < inner.slots.len());
        debug_assert!(inner.widx < inner.slots.len());
        let idx = inner.widx;
        inner.widx = (idx + 1) % inner.slots.len();
        let old = inner.slots[idx].take();
        if old.is_some() {
            // full: the displaced slot must have been the oldest
            debug_assert_eq!(inner.ridx, idx);
            inner.ridx = inner.widx;
            inner.ndrop += 1;
        }
        inner.slots[idx] = Some(obj);
        inner.nput += 1;
        self.cond.notify_one();
        old
    }

    /// Removes and returns the oldest record. If the queue is empty, waits
    /// up to `timeout` for one to arrive; `None` means the deadline passed.
    pub fn get(&self, timeout: Duration) -> Option<T> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        debug_assert!(inner.ridx < inner.slots.len());
        debug_assert!(inner.widx < inner.slots.len());
        if inner.slots[inner.ridx].is_none() {
            debug_assert_eq!(inner.widx, inner.ridx);
            let deadline = Instant::now() + timeout;
            // loop until data appears or we time out; any other wakeup that
            // leaves the read slot vacant is spurious and re-enters the wait
            // against the same deadline
            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let (guard, _) = self
                    .cond
                    .wait_timeout(inner, deadline - now)
                    .expect("lock poisoned");
                inner = guard;
                if inner.slots[inner.ridx].is_some() {
                    break;
                }
            }
        }
        let idx = inner.ridx;
        match inner.slots[idx].take() {
            Some(obj) => {
                inner.ridx = (idx + 1) % inner.slots.len();
                inner.nget += 1;
                Some(obj)
            }
            None => None,
        }
    }

    /// Reads the lifetime counters, optionally zeroing them.
    pub fn stat(&self, clear: bool) -> CirqStats {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let stats = CirqStats {
            puts: inner.nput,
            gets: inner.nget,
            drops: inner.ndrop,
        };
        if clear {
            inner.nput = 0;
            inner.nget = 0;
            inner.ndrop = 0;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn rejects_tiny_capacity() {
        assert!(matches!(
            Cirq::<u32>::with_capacity(0),
            Err(CirqError::Capacity)
        ));
        assert!(matches!(
            Cirq::<u32>::with_capacity(1),
            Err(CirqError::Capacity)
        ));
        assert!(Cirq::<u32>::with_capacity(2).is_ok());
    }

    #[test]
    fn put_get_simple() {
        let q = Cirq::with_capacity(7).unwrap();
        assert!(q.put(9).is_none());
        assert_eq!(q.len(), 1);
        assert_eq!(q.get(Duration::ZERO), Some(9));
        assert_eq!(q.len(), 0);
        let stats = q.stat(false);
        assert_eq!(
            stats,
            CirqStats {
                puts: 1,
                gets: 1,
                drops: 0
            }
        );
    }

    #[test]
    fn put_get_full() {
        let q = Cirq::with_capacity(7).unwrap();
        for i in 0..7 {
            assert!(q.put(i).is_none());
        }
        assert_eq!(q.len(), 7);
        for i in 0..7 {
            assert_eq!(q.get(Duration::ZERO), Some(i));
        }
        assert_eq!(q.len(), 0);
        let stats = q.stat(false);
        assert_eq!(
            stats,
            CirqStats {
                puts: 7,
                gets: 7,
                drops: 0
            }
        );
    }

    #[test]
    fn put_get_overfull() {
        let q = Cirq::with_capacity(7).unwrap();
        for i in 0..10 {
            let displaced = q.put(i);
            if i < 7 {
                assert!(displaced.is_none());
            } else {
                // displacement evicts the oldest surviving record
                assert_eq!(displaced, Some(i - 7));
            }
        }
        assert_eq!(q.len(), 7);
        for i in 3..10 {
            assert_eq!(q.get(Duration::ZERO), Some(i));
        }
        assert_eq!(q.len(), 0);
        let stats = q.stat(false);
        assert_eq!(
            stats,
            CirqStats {
                puts: 10,
                gets: 7,
                drops: 3
            }
        );
    }

    #[test]
    fn zero_timeout_get_on_empty() {
        let q = Cirq::<u32>::with_capacity(4).unwrap();
        let start = Instant::now();
        assert_eq!(q.get(Duration::ZERO), None);
        // bounded by scheduler jitter only
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn stat_clear_resets_counters() {
        let q = Cirq::with_capacity(4).unwrap();
        q.put(1);
        q.put(2);
        q.get(Duration::ZERO);
        let stats = q.stat(true);
        assert_eq!(stats.puts, 2);
        assert_eq!(stats.gets, 1);
        assert_eq!(q.stat(false), CirqStats::default());
        // length survives a counter reset
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn blocked_get_wakes_on_put() {
        let q = Arc::new(Cirq::with_capacity(4).unwrap());
        let q2 = Arc::clone(&q);
        let consumer = thread::spawn(move || q2.get(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        q.put(42u32);
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn concurrent_accounting_holds() {
        const PUTS: u64 = 10_000;
        let q = Arc::new(Cirq::with_capacity(64).unwrap());
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..PUTS {
                    q.put(i);
                }
            })
        };
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                let mut got = Vec::new();
                loop {
                    match q.get(Duration::from_millis(50)) {
                        Some(v) => got.push(v),
                        None => break,
                    }
                }
                got
            })
        };
        producer.join().unwrap();
        let got = consumer.join().unwrap();
        let stats = q.stat(false);
        assert_eq!(stats.puts, PUTS);
        assert_eq!(stats.gets + stats.drops + q.len() as u64, PUTS);
        assert_eq!(got.len() as u64, stats.gets);
        // FIFO among survivors: values arrive in strictly increasing order
        assert!(got.windows(2).all(|w| w[0] < w[1]));
    }
}
