//! # Typed Value Model
//!
//! Core data type for TypedKV entries: a sealed tagged union over the
//! protocol's scalar and collection variants.
//!
//! ## Design Principles
//!
//! 1. **One Type, Three Tiers**: A single `Value` enum backs keys, stored
//!    values, and collection elements. Which variants are legal where
//!    (hashable vs. collectable) is a protocol property enforced by the
//!    codec's decode modes, not by separate Rust types.
//!
//! 2. **Lawful Eq/Hash**: `Value` is usable as a map key directly. `Float`
//!    compares and hashes by IEEE bit pattern so `Eq` stays reflexive;
//!    `Datetime` compares and hashes by instant.
//!
//! 3. **No Nested Collections**: `List` and `Deque` never appear inside a
//!    `Tuple`, `List`, or `Deque`. The decoders reject such payloads, so
//!    values built from the wire satisfy the invariant by construction.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::mem;

use chrono::{DateTime, FixedOffset};

/// A typed value as stored in the keyspace or carried on the wire.
///
/// `Deque` is created only by the QUEUE command and has no wire symbol;
/// every other variant round-trips through the codec.
#[derive(Debug, Clone)]
pub enum Value {
    /// Signed 64-bit integer.
    Int(i64),
    /// IEEE 754 double.
    Float(f64),
    /// Opaque byte string.
    Bytes(Vec<u8>),
    /// UTF-8 string.
    Str(String),
    /// Boolean.
    Bool(bool),
    /// Wall-clock instant with timezone offset.
    Datetime(DateTime<FixedOffset>),
    /// Fixed-length sequence; hashable iff all elements are.
    Tuple(Vec<Value>),
    /// Mutable sequence; never hashable, never nested.
    List(Vec<Value>),
    /// Double-ended queue; only reachable via QUEUE/PUSH/POP.
    Deque(VecDeque<Value>),
}

impl Value {
    /// Returns true when this value is legal in key position.
    ///
    /// Scalars except `Bool` and `Datetime`, plus tuples whose every
    /// element is both hashable and collectable.
    pub fn is_hashable(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) | Value::Bytes(_) | Value::Str(_) => true,
            Value::Tuple(items) => items
                .iter()
                .all(|item| item.is_hashable() && item.is_collectable()),
            Value::Bool(_) | Value::Datetime(_) | Value::List(_) | Value::Deque(_) => false,
        }
    }

    /// Returns true when this value is legal as a collection element.
    pub fn is_collectable(&self) -> bool {
        match self {
            Value::List(_) | Value::Deque(_) => false,
            Value::Tuple(items) => items.iter().all(Value::is_collectable),
            _ => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Datetime(a), Value::Datetime(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Deque(a), Value::Deque(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Value::Int(v) => v.hash(state),
            // Bit pattern keeps Hash consistent with the Eq impl.
            Value::Float(v) => v.to_bits().hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Bool(v) => v.hash(state),
            // Instant-based, matching chrono's instant-based equality.
            Value::Datetime(dt) => dt.timestamp_millis().hash(state),
            Value::Tuple(items) => items.hash(state),
            Value::List(items) => items.hash(state),
            Value::Deque(items) => items.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn datetime() -> Value {
        Value::Datetime(
            DateTime::parse_from_str("2024-01-01 00:00:00 +0000", "%Y-%m-%d %H:%M:%S %z")
                .unwrap(),
        )
    }

    #[test]
    fn scalars_are_hashable_except_bool_and_datetime() {
        assert!(Value::Int(1).is_hashable());
        assert!(Value::Float(1.5).is_hashable());
        assert!(Value::Bytes(b"raw".to_vec()).is_hashable());
        assert!(Value::Str("text".to_string()).is_hashable());
        assert!(!Value::Bool(true).is_hashable());
        assert!(!datetime().is_hashable());
    }

    #[test]
    fn tuple_hashability_is_elementwise() {
        let ok = Value::Tuple(vec![Value::Int(1), Value::Str("a".to_string())]);
        assert!(ok.is_hashable());

        let with_bool = Value::Tuple(vec![Value::Int(1), Value::Bool(false)]);
        assert!(!with_bool.is_hashable());

        let with_list = Value::Tuple(vec![Value::List(vec![Value::Int(1)])]);
        assert!(!with_list.is_hashable());

        let nested_ok = Value::Tuple(vec![Value::Tuple(vec![Value::Int(2)])]);
        assert!(nested_ok.is_hashable());
    }

    #[test]
    fn collections_are_not_collectable() {
        assert!(Value::Bool(true).is_collectable());
        assert!(datetime().is_collectable());
        assert!(Value::Tuple(vec![Value::Int(1)]).is_collectable());
        assert!(!Value::List(vec![]).is_collectable());
        assert!(!Value::Deque(VecDeque::new()).is_collectable());
        assert!(!Value::Tuple(vec![Value::List(vec![])]).is_collectable());
    }

    #[test]
    fn float_keys_are_stable_under_hashing() {
        let mut map = HashMap::new();
        map.insert(Value::Float(3.25), 1);
        assert_eq!(map.get(&Value::Float(3.25)), Some(&1));
        assert_eq!(map.get(&Value::Float(3.5)), None);
        // Int and Float never collide even when numerically equal.
        assert_eq!(map.get(&Value::Int(3)), None);
    }

    #[test]
    fn nan_is_equal_to_itself() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }
}
