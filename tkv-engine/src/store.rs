//! # Store Context
//!
//! One `Store` owns the keyspace and the TTL heap and is passed explicitly
//! to every handler; there are no global singletons. The expirer holds the
//! same `Arc` so its evictions serialize through the keyspace lock like
//! any other mutation.

use std::sync::Arc;

use crate::expirer::{self, ExpirerHandle};
use crate::keyspace::Keyspace;
use crate::ttl::TtlHeap;

/// The engine's shared state: keyspace plus TTL heap.
#[derive(Debug, Default)]
pub struct Store {
    /// Mapping from hashable keys to typed values.
    pub(crate) keyspace: Keyspace,
    /// Expiry deadlines for keys with a TTL.
    pub(crate) ttl: TtlHeap,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Store {
            keyspace: Keyspace::new(),
            ttl: TtlHeap::new(),
        }
    }

    /// Starts the background expirer for this store.
    ///
    /// The returned handle must be stopped to avoid leaking the thread.
    pub fn start_expirer(self: &Arc<Self>) -> ExpirerHandle {
        expirer::start(Arc::clone(self))
    }

    /// Read access to the keyspace, mainly for drivers and tests.
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }
}
