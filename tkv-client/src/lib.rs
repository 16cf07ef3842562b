//! # TypedKV Sync Client
//!
//! Provide a lightweight, synchronous typed client with connection
//! pooling to minimize TCP handshake overhead.

mod client;
mod pool;

pub use client::{ClientConfig, ClientError, ClientResult, KvClient};
