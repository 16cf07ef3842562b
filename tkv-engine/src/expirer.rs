//! # Background Expirer
//!
//! One thread that sleeps until the earliest TTL deadline and deletes the
//! key coherently with the dispatcher: heap lock to find the due entry,
//! then keyspace lock, then a re-confirming pop. Whichever of the expirer
//! and a concurrent PUT takes the keyspace lock first wins; a PUT that
//! wins re-registers or retires the TTL entry, so the re-confirming pop
//! simply comes up empty.

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, trace};

use crate::store::Store;
use crate::ttl::{self, WaitVerdict};

/// Handle for the background expirer thread.
///
/// Call `stop` to signal shutdown and join the thread.
pub struct ExpirerHandle {
    join: Option<JoinHandle<()>>,
    store: Arc<Store>,
}

impl ExpirerHandle {
    /// Stops the expirer and waits for the thread to finish.
    ///
    /// Use this in tests or shutdown hooks to avoid leaking threads.
    pub fn stop(mut self) {
        self.store.ttl.shutdown();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns the expirer thread for `store`.
pub(crate) fn start(store: Arc<Store>) -> ExpirerHandle {
    let worker = Arc::clone(&store);
    let join = std::thread::spawn(move || run(&worker));

    ExpirerHandle {
        join: Some(join),
        store,
    }
}

fn run(store: &Store) {
    debug!("expirer started");
    loop {
        match store.ttl.wait_due() {
            WaitVerdict::Shutdown => break,
            WaitVerdict::Recheck => continue,
            WaitVerdict::Due => evict_due(store),
        }
    }
    debug!("expirer stopped");
}

/// Deletes the due root entry, if it is still live once both locks are
/// held in keyspace-then-heap order.
fn evict_due(store: &Store) {
    let mut guard = store.keyspace.lock();
    if let Some(key) = store.ttl.pop_if_due(ttl::now_millis()) {
        let existed = guard.delete(&key);
        if existed {
            debug!(?key, "expired key evicted");
        } else {
            // A concurrent DEL beat us to the key; nothing left to do.
            trace!(?key, "due entry pointed at an already-deleted key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{DateTime, FixedOffset, Utc};

    use tkv_common::Value;

    fn key(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    fn in_millis(ms: i64) -> DateTime<FixedOffset> {
        (Utc::now() + chrono::Duration::milliseconds(ms)).fixed_offset()
    }

    #[test]
    fn due_keys_are_evicted() {
        let store = Arc::new(Store::new());
        let expirer = store.start_expirer();

        store.keyspace.set(key("doomed"), Value::Int(1));
        store.ttl.put(key("doomed"), in_millis(30));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(store.keyspace.get(&key("doomed")), None);

        expirer.stop();
    }

    #[test]
    fn overwrite_without_ttl_cancels_expiry() {
        let store = Arc::new(Store::new());
        let expirer = store.start_expirer();

        store.keyspace.set(key("kept"), Value::Int(1));
        store.ttl.put(key("kept"), in_millis(30));
        // Overwrite retires the TTL registration, as PUT without a TTL does.
        store.keyspace.set(key("kept"), Value::Int(2));
        store.ttl.invalidate(&key("kept"));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(store.keyspace.get(&key("kept")), Some(Value::Int(2)));

        expirer.stop();
    }

    #[test]
    fn replacing_a_ttl_extends_the_deadline() {
        let store = Arc::new(Store::new());
        let expirer = store.start_expirer();

        store.keyspace.set(key("extended"), Value::Int(1));
        store.ttl.put(key("extended"), in_millis(30));
        store.ttl.put(key("extended"), in_millis(60_000));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(store.keyspace.get(&key("extended")), Some(Value::Int(1)));

        expirer.stop();
    }

    #[test]
    fn earlier_deadline_wakes_the_expirer() {
        let store = Arc::new(Store::new());
        let expirer = store.start_expirer();

        // Park the expirer on a distant deadline first.
        store.keyspace.set(key("far"), Value::Int(1));
        store.ttl.put(key("far"), in_millis(60_000));

        store.keyspace.set(key("near"), Value::Int(2));
        store.ttl.put(key("near"), in_millis(30));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(store.keyspace.get(&key("near")), None);
        assert_eq!(store.keyspace.get(&key("far")), Some(Value::Int(1)));

        expirer.stop();
    }

    #[test]
    fn stop_joins_promptly_with_pending_entries() {
        let store = Arc::new(Store::new());
        let expirer = store.start_expirer();
        store.keyspace.set(key("pending"), Value::Int(1));
        store.ttl.put(key("pending"), in_millis(60_000));
        expirer.stop();
        // Entry survives: shutdown beat the deadline.
        assert_eq!(store.keyspace.get(&key("pending")), Some(Value::Int(1)));
    }
}
