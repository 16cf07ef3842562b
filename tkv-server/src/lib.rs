//! # TypedKV Server Driver
//!
//! TCP front end for the TypedKV engine: accept connections, deliver
//! framed request buffers to the dispatcher, and serialize responses.

pub mod server;
