//! # Synchronous Client API
//!
//! Purpose: Expose a compact, blocking API for issuing typed commands to a
//! TypedKV server over its length-framed binary protocol.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KvClient` hides pooling and framing details.
//! 2. **Typed Surface**: Callers pass and receive `Value`s; encoding to
//!    the wire happens inside the client.
//! 3. **Fail Fast**: Framing violations surface immediately as errors.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use tkv_common::{codec, KvError, Value};

use crate::pool::{ConnectionPool, PoolConfig};

/// Result type for the sync client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the sync client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Response framing could not be parsed.
    #[error("protocol error")]
    Protocol,
    /// A value could not be encoded for the wire.
    #[error("encode error: {0}")]
    Encode(#[from] KvError),
    /// The server answered with a non-OK status.
    #[error("server status: {0}")]
    Status(KvError),
    /// Pool is at capacity and no idle connections are available.
    #[error("connection pool exhausted")]
    PoolExhausted,
    /// Address could not be parsed into a socket address.
    #[error("invalid address")]
    InvalidAddress,
}

/// Configuration for the synchronous client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:7401".
    pub addr: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:7401".to_string(),
            max_idle: 8,
            max_total: 16,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

/// Synchronous client with connection pooling.
///
/// This is a facade over the pool and the wire codec. Each call acquires a
/// connection, executes one command, and returns the connection to the pool.
pub struct KvClient {
    pool: ConnectionPool,
}

impl KvClient {
    /// Creates a client with default configuration.
    pub fn connect(addr: impl Into<String>) -> ClientResult<Self> {
        let config = ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        };
        Self::with_config(config)
    }

    /// Creates a client with a custom configuration.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let pool = ConnectionPool::new(PoolConfig {
            addr: config.addr,
            max_idle: config.max_idle,
            max_total: config.max_total,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            connect_timeout: config.connect_timeout,
        })?;
        Ok(KvClient { pool })
    }

    /// Fetches the value at `key`.
    ///
    /// Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &Value) -> ClientResult<Option<Value>> {
        let key = codec::encode_any(key)?;
        match self.exec_expecting_payload(&[b"GET", &key]) {
            Ok(value) => Ok(Some(value)),
            Err(ClientError::Status(KvError::BadKey)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Stores `value` at `key`, clearing any expiry.
    pub fn put(&self, key: &Value, value: &Value) -> ClientResult<()> {
        let key = codec::encode_any(key)?;
        let value = codec::encode_any(value)?;
        self.exec_expecting_ok(&[b"PUT", &key, &value])
    }

    /// Stores `value` at `key` and sets an absolute expiry deadline.
    pub fn put_with_ttl(
        &self,
        key: &Value,
        value: &Value,
        deadline: DateTime<FixedOffset>,
    ) -> ClientResult<()> {
        let key = codec::encode_any(key)?;
        let value = codec::encode_any(value)?;
        let ttl = codec::encode_any(&Value::Datetime(deadline))?;
        self.exec_expecting_ok(&[b"PUT", &key, &value, &ttl])
    }

    /// Deletes `key`. Returns true when a key was removed.
    pub fn delete(&self, key: &Value) -> ClientResult<bool> {
        let key = codec::encode_any(key)?;
        match self.exec_expecting_ok(&[b"DEL", &key]) {
            Ok(()) => Ok(true),
            Err(ClientError::Status(KvError::BadKey)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Creates a fresh empty deque at `key`.
    pub fn queue(&self, key: &Value) -> ClientResult<()> {
        let key = codec::encode_any(key)?;
        self.exec_expecting_ok(&[b"QUEUE", &key])
    }

    /// Creates a fresh empty deque at `key` with an expiry deadline.
    pub fn queue_with_ttl(
        &self,
        key: &Value,
        deadline: DateTime<FixedOffset>,
    ) -> ClientResult<()> {
        let key = codec::encode_any(key)?;
        let ttl = codec::encode_any(&Value::Datetime(deadline))?;
        self.exec_expecting_ok(&[b"QUEUE", &key, &ttl])
    }

    /// Appends `value` to the deque at `key`.
    pub fn push(&self, key: &Value, value: &Value) -> ClientResult<()> {
        let key = codec::encode_any(key)?;
        let value = codec::encode_any(value)?;
        self.exec_expecting_ok(&[b"PUSH", &key, &value])
    }

    /// Pops the front of the deque at `key`.
    ///
    /// Returns `Ok(None)` when the deque is empty.
    pub fn pop(&self, key: &Value) -> ClientResult<Option<Value>> {
        let key = codec::encode_any(key)?;
        match self.exec_expecting_payload(&[b"POP", &key]) {
            Ok(value) => Ok(Some(value)),
            Err(ClientError::Status(KvError::BadIx)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Sets the expiry deadline of an existing `key`.
    pub fn expire(&self, key: &Value, deadline: DateTime<FixedOffset>) -> ClientResult<()> {
        let key = codec::encode_any(key)?;
        let ttl = codec::encode_any(&Value::Datetime(deadline))?;
        self.exec_expecting_ok(&[b"TTL", &key, &ttl])
    }

    /// Clears the expiry deadline of an existing `key`.
    pub fn persist(&self, key: &Value) -> ClientResult<()> {
        let key = codec::encode_any(key)?;
        self.exec_expecting_ok(&[b"TTL", &key])
    }

    /// Sends raw request substrings and returns `(status, payload)`.
    ///
    /// Mainly useful for tests that need to exercise the server with
    /// payloads a well-behaved client would refuse to encode.
    pub fn exec_raw(&self, parts: &[&[u8]]) -> ClientResult<(u8, Option<Vec<u8>>)> {
        let mut conn = self.pool.acquire()?;
        conn.exec(parts)
    }

    fn exec_expecting_ok(&self, parts: &[&[u8]]) -> ClientResult<()> {
        match self.exec_raw(parts)? {
            (0, _) => Ok(()),
            (status, _) => Err(status_error(status)),
        }
    }

    fn exec_expecting_payload(&self, parts: &[&[u8]]) -> ClientResult<Value> {
        match self.exec_raw(parts)? {
            (0, Some(payload)) => codec::decode_any(&payload).map_err(|_| ClientError::Protocol),
            (0, None) => Err(ClientError::Protocol),
            (status, _) => Err(status_error(status)),
        }
    }
}

fn status_error(status: u8) -> ClientError {
    match KvError::from_code(status) {
        Some(err) => ClientError::Status(err),
        None => ClientError::Protocol,
    }
}
