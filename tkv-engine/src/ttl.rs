//! # TTL Heap
//!
//! Keyed min-heap of expiry deadlines with lazy invalidation.
//!
//! ## Design Principles
//!
//! 1. **Generation Tags Instead Of Re-Heapification**: Every inserted
//!    entry gets a fresh generation number, and a side index records the
//!    generation of each key's single live entry. Replacing or retiring a
//!    TTL is an O(1) index update; the superseded heap entry goes stale in
//!    place and is discarded when it surfaces at the root.
//! 2. **Absolute Millisecond Deadlines**: The decoded `Datetime` argument
//!    is converted once to a Unix-epoch millisecond timestamp; every later
//!    comparison is numeric.
//! 3. **Condvar Signalling**: `put` and `invalidate` notify the expirer
//!    whenever the identity or deadline of the heap root changed. Missed
//!    signals are tolerated because the expirer re-peeks after every wait.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{self, AtomicBool};
use std::time::Duration;

use ahash::RandomState;
use chrono::{DateTime, FixedOffset, Utc};
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};

use tkv_common::Value;

/// Returns the current wall-clock time as Unix-epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// One expiry registration. Ordering (and equality, for heap purposes) is
/// by deadline then generation; generations are unique per heap.
#[derive(Debug, Clone)]
struct TtlEntry {
    deadline_ms: i64,
    generation: u64,
    key: Value,
}

impl PartialEq for TtlEntry {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation
    }
}

impl Eq for TtlEntry {}

impl PartialOrd for TtlEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TtlEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline_ms, self.generation).cmp(&(other.deadline_ms, other.generation))
    }
}

#[derive(Debug)]
struct HeapInner {
    heap: BinaryHeap<Reverse<TtlEntry>>,
    /// Key -> generation of its current live entry.
    live: HashMap<Value, u64, RandomState>,
    next_generation: u64,
}

impl Default for HeapInner {
    fn default() -> Self {
        HeapInner {
            heap: BinaryHeap::new(),
            live: HashMap::with_hasher(RandomState::new()),
            next_generation: 0,
        }
    }
}

impl HeapInner {
    /// Discards stale roots, then returns the earliest live entry.
    fn peek_live(&mut self) -> Option<&TtlEntry> {
        while let Some(Reverse(root)) = self.heap.peek() {
            if self.live.get(&root.key) == Some(&root.generation) {
                break;
            }
            self.heap.pop();
        }
        self.heap.peek().map(|Reverse(root)| root)
    }

    /// (deadline, generation) of the live root, used for change detection.
    fn root_marker(&mut self) -> Option<(i64, u64)> {
        self.peek_live()
            .map(|root| (root.deadline_ms, root.generation))
    }
}

/// What the expirer should do after one blocking wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitVerdict {
    /// Shutdown was requested.
    Shutdown,
    /// Woke from a wait; peek again.
    Recheck,
    /// The root entry is due now.
    Due,
}

/// Keyed min-heap of TTL entries shared between the dispatcher and the
/// background expirer.
#[derive(Debug, Default)]
pub struct TtlHeap {
    inner: Mutex<HeapInner>,
    cond: Condvar,
    shutdown: AtomicBool,
}

impl TtlHeap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        TtlHeap::default()
    }

    /// Registers (or replaces) the expiry deadline for `key`.
    ///
    /// The datetime is collapsed to its absolute timestamp here; the heap
    /// never looks at calendar fields again.
    pub fn put(&self, key: Value, deadline: DateTime<FixedOffset>) {
        let deadline_ms = deadline.timestamp_millis();
        let mut inner = self.inner.lock();
        let before = inner.root_marker();

        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.live.insert(key.clone(), generation);
        inner.heap.push(Reverse(TtlEntry {
            deadline_ms,
            generation,
            key,
        }));

        if inner.root_marker() != before {
            self.cond.notify_all();
        }
    }

    /// Retires the live entry for `key`, if any. Returns whether one existed.
    pub fn invalidate(&self, key: &Value) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.root_marker();
        let existed = inner.live.remove(key).is_some();
        if existed && inner.root_marker() != before {
            self.cond.notify_all();
        }
        existed
    }

    /// Returns the earliest live `(deadline_ms, key)`, if any.
    pub fn peek(&self) -> Option<(i64, Value)> {
        let mut inner = self.inner.lock();
        inner
            .peek_live()
            .map(|root| (root.deadline_ms, root.key.clone()))
    }

    /// Pops and returns the root key when it is live and due at `now_ms`.
    pub fn pop_if_due(&self, now_ms: i64) -> Option<Value> {
        let mut inner = self.inner.lock();
        let due = match inner.peek_live() {
            Some(root) => root.deadline_ms <= now_ms,
            None => false,
        };
        if !due {
            return None;
        }
        let Reverse(root) = inner.heap.pop()?;
        inner.live.remove(&root.key);
        Some(root.key)
    }

    /// Blocks until there is a due entry, a signal, or shutdown.
    ///
    /// On `Due` the caller must re-confirm with [`TtlHeap::pop_if_due`]
    /// after taking the keyspace lock; the root may have been replaced in
    /// the window between the two acquisitions.
    pub fn wait_due(&self) -> WaitVerdict {
        let mut inner = self.inner.lock();
        if self.is_shut_down() {
            return WaitVerdict::Shutdown;
        }
        match inner.peek_live().map(|root| root.deadline_ms) {
            None => {
                self.cond.wait(&mut inner);
                WaitVerdict::Recheck
            }
            Some(deadline_ms) => {
                let now_ms = now_millis();
                if deadline_ms <= now_ms {
                    return WaitVerdict::Due;
                }
                let delta = Duration::from_millis((deadline_ms - now_ms) as u64);
                let _ = self.cond.wait_for(&mut inner, delta);
                WaitVerdict::Recheck
            }
        }
    }

    /// Requests shutdown and wakes every waiter.
    pub fn shutdown(&self) {
        self.shutdown.store(true, atomic::Ordering::Release);
        // Take the lock so a waiter past the flag check cannot miss the
        // broadcast.
        let _inner = self.inner.lock();
        self.cond.notify_all();
    }

    /// Returns true once shutdown was requested.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(atomic::Ordering::Acquire)
    }

    /// Number of live entries (stale heap slots excluded).
    pub fn live_len(&self) -> usize {
        self.inner.lock().live.len()
    }
}
