//! # Keyspace
//!
//! The shared mapping from hashable keys to typed values behind one
//! exclusive lock.
//!
//! ## Design Principles
//!
//! 1. **Single Writer Lock**: One `parking_lot::Mutex` protects the whole
//!    map and every contained deque. All mutations and reads serialize
//!    through it, so per-key operations are linearizable.
//! 2. **Scoped Acquisition**: The lock is only reachable through guards,
//!    so it is released on every exit path including failures.
//! 3. **Compound Critical Sections**: [`Keyspace::lock`] hands out the
//!    guard so a handler can couple a map mutation with a TTL-heap update
//!    under one critical section. Lock ordering is keyspace before heap,
//!    never the reverse.

use std::collections::VecDeque;

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::{Mutex, MutexGuard};

use tkv_common::{KvError, KvResult, Value};

type Map = HashMap<Value, Value, RandomState>;

/// Shared key-to-value mapping with an exclusive writer lock.
#[derive(Debug, Default)]
pub struct Keyspace {
    inner: Mutex<Map>,
}

impl Keyspace {
    /// Creates an empty keyspace.
    pub fn new() -> Self {
        Keyspace {
            inner: Mutex::new(Map::with_hasher(RandomState::new())),
        }
    }

    /// Acquires the exclusive lock, blocking until available.
    pub fn lock(&self) -> KeyspaceGuard<'_> {
        KeyspaceGuard {
            map: self.inner.lock(),
        }
    }

    /// Returns a clone of the value at `key`.
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Inserts or overwrites `key`. Returns whether a prior mapping existed.
    pub fn set(&self, key: Value, value: Value) -> bool {
        self.lock().set(key, value)
    }

    /// Removes `key`. Returns whether a mapping existed.
    pub fn delete(&self, key: &Value) -> bool {
        self.lock().delete(key)
    }

    /// Creates a fresh empty deque at `key`, overwriting any prior mapping.
    pub fn put_empty_deque(&self, key: Value) {
        self.lock().put_empty_deque(key);
    }

    /// Applies `f` to the deque at `key` under the lock.
    ///
    /// Fails with `BadKey` when the key is absent and `BadOp` when the
    /// value at the key is not a deque.
    pub fn with_deque_mut<T, F>(&self, key: &Value, f: F) -> KvResult<T>
    where
        F: FnOnce(&mut VecDeque<Value>) -> KvResult<T>,
    {
        let mut guard = self.lock();
        f(guard.deque_mut(key)?)
    }

    /// Returns the number of live keys.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Returns true when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to the keyspace for the duration of one critical
/// section. Dropping the guard releases the lock.
pub struct KeyspaceGuard<'a> {
    map: MutexGuard<'a, Map>,
}

impl KeyspaceGuard<'_> {
    /// Returns the value at `key`, if any.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.map.get(key)
    }

    /// Returns whether `key` is present.
    pub fn contains(&self, key: &Value) -> bool {
        self.map.contains_key(key)
    }

    /// Inserts or overwrites `key`. Returns whether a prior mapping existed.
    pub fn set(&mut self, key: Value, value: Value) -> bool {
        self.map.insert(key, value).is_some()
    }

    /// Removes `key`. Returns whether a mapping existed.
    pub fn delete(&mut self, key: &Value) -> bool {
        self.map.remove(key).is_some()
    }

    /// Creates a fresh empty deque at `key`, overwriting any prior mapping.
    pub fn put_empty_deque(&mut self, key: Value) {
        self.map.insert(key, Value::Deque(VecDeque::new()));
    }

    /// Borrows the deque at `key` mutably.
    pub fn deque_mut(&mut self, key: &Value) -> KvResult<&mut VecDeque<Value>> {
        match self.map.get_mut(key) {
            Some(Value::Deque(deque)) => Ok(deque),
            Some(_) => Err(KvError::BadOp),
            None => Err(KvError::BadKey),
        }
    }
}
