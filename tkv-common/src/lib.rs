// tkv-common - Shared protocol surface for TypedKV
//
// This crate defines the typed value model, the self-describing value
// codec, the request/response wire format, and the error taxonomy shared
// by the engine, the server driver, and the client.

pub mod codec;
pub mod error;
pub mod value;
pub mod wire;

// Re-export for convenience
pub use error::{KvError, KvResult, STATUS_OK};
pub use value::Value;
pub use wire::{Response, MAX_MSG_SIZE};
