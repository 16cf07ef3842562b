//! # Error Taxonomy
//!
//! One variant per non-OK wire status code. Errors are plain values: the
//! dispatcher converts them into response statuses and handlers return
//! normally, so nothing on the request path panics.

use thiserror::Error;

/// Status code indicating success in responses.
pub const STATUS_OK: u8 = 0;

/// Result type used throughout the codec and engine.
pub type KvResult<T> = Result<T, KvError>;

/// Request-level errors, each mapping to a one-byte wire status.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvError {
    /// Catch-all for conditions with no better classification.
    #[error("unknown error")]
    Unknown,
    /// The server hit an internal consistency failure.
    #[error("internal server error")]
    Server,
    /// The request or an encoded value was misframed.
    #[error("malformed request")]
    Client,
    /// The command substring matched no known command.
    #[error("unknown command")]
    BadCmd,
    /// Unknown type symbol, or a payload that does not parse as its type.
    #[error("unknown or undecodable type")]
    BadType,
    /// The key is not present in the keyspace.
    #[error("key not found")]
    BadKey,
    /// Wrong number of arguments for the command.
    #[error("wrong number of arguments")]
    BadArgs,
    /// The operation does not apply to the value at the key.
    #[error("operation does not apply to value")]
    BadOp,
    /// Index out of range, e.g. popping an empty deque.
    #[error("index out of range")]
    BadIx,
    /// A non-hashable value appeared in key position.
    #[error("value is not hashable")]
    BadHash,
    /// A collection appeared inside another collection.
    #[error("nested collections are forbidden")]
    BadCollection,
}

impl KvError {
    /// Returns the one-byte wire status for this error.
    pub const fn code(&self) -> u8 {
        match self {
            KvError::Unknown => 11,
            KvError::Server => 21,
            KvError::Client => 22,
            KvError::BadCmd => 31,
            KvError::BadType => 32,
            KvError::BadKey => 33,
            KvError::BadArgs => 34,
            KvError::BadOp => 35,
            KvError::BadIx => 36,
            KvError::BadHash => 37,
            KvError::BadCollection => 38,
        }
    }

    /// Maps a wire status back to the error it encodes.
    ///
    /// Returns `None` for `STATUS_OK` and for unassigned codes.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            11 => Some(KvError::Unknown),
            21 => Some(KvError::Server),
            22 => Some(KvError::Client),
            31 => Some(KvError::BadCmd),
            32 => Some(KvError::BadType),
            33 => Some(KvError::BadKey),
            34 => Some(KvError::BadArgs),
            35 => Some(KvError::BadOp),
            36 => Some(KvError::BadIx),
            37 => Some(KvError::BadHash),
            38 => Some(KvError::BadCollection),
            _ => None,
        }
    }
}
