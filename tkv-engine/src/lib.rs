//! # TypedKV Engine
//!
//! The in-memory core: typed keyspace, TTL heap with lazy invalidation,
//! background expirer, and the command dispatcher. The driver hands
//! [`Store::dispatch`] a framed request buffer and receives a
//! [`tkv_common::Response`]; everything else stays internal.

pub mod dispatch;
pub mod expirer;
pub mod keyspace;
pub mod store;
pub mod ttl;

pub use expirer::ExpirerHandle;
pub use keyspace::Keyspace;
pub use store::Store;
pub use ttl::TtlHeap;
