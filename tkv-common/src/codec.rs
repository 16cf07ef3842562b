//! # Value Codec
//!
//! Encode and decode self-describing typed values. Every encoding starts
//! with a one-byte type symbol; scalars carry an ASCII payload and
//! collections carry a `u16` item count followed by `u16`-length-prefixed
//! items. Payload length is implied by the outer framing.
//!
//! ## Design Principles
//!
//! 1. **Three Validity Tiers**: `decode_any` accepts every wire variant,
//!    `decode_collectable` additionally rejects nested collections, and
//!    `decode_hashable` narrows to key-legal variants. The tiers share one
//!    sub-element dispatch so collection flatness and key hashability are
//!    settled during parsing; the keyspace never sees a malformed element.
//!
//! 2. **Strict Framing**: Declared sub-lengths must consume their buffer
//!    exactly. Overshoot and undershoot are both client errors, never a
//!    best-effort parse.
//!
//! 3. **Errors As Values**: Every failure maps to a `KvError`; the decoder
//!    never panics on attacker-controlled bytes.

use chrono::{DateTime, FixedOffset};

use crate::error::{KvError, KvResult};
use crate::value::Value;

/// Type symbol for `Int`.
pub const INT_SYMBOL: u8 = b'#';
/// Type symbol for `Float`.
pub const FLOAT_SYMBOL: u8 = b'%';
/// Type symbol for `Bytes`.
pub const BYTES_SYMBOL: u8 = b'\'';
/// Type symbol for `Str`.
pub const STRING_SYMBOL: u8 = b'"';
/// Type symbol for `List`.
pub const LIST_SYMBOL: u8 = b'[';
/// Type symbol for `Tuple`.
pub const TUPLE_SYMBOL: u8 = b'(';
/// Type symbol for `Bool`.
pub const BOOL_SYMBOL: u8 = b'?';
/// Type symbol for `Datetime`.
pub const DATETIME_SYMBOL: u8 = b'+';

/// Wire format for `Datetime` payloads, e.g. `2024-01-01 09:30:00 +0000`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes any wire variant.
pub fn decode_any(buf: &[u8]) -> KvResult<Value> {
    let (symbol, payload) = split_symbol(buf)?;
    match symbol {
        INT_SYMBOL => decode_int(payload),
        FLOAT_SYMBOL => decode_float(payload),
        BYTES_SYMBOL => Ok(Value::Bytes(payload.to_vec())),
        STRING_SYMBOL => decode_str(payload),
        LIST_SYMBOL => Ok(Value::List(decode_items(payload, decode_collectable)?)),
        TUPLE_SYMBOL => Ok(Value::Tuple(decode_items(payload, decode_collectable)?)),
        BOOL_SYMBOL => decode_bool(payload),
        DATETIME_SYMBOL => decode_datetime(payload).map(Value::Datetime),
        _ => Err(KvError::BadType),
    }
}

/// Decodes a collection element, rejecting nested collections.
pub fn decode_collectable(buf: &[u8]) -> KvResult<Value> {
    let (symbol, payload) = split_symbol(buf)?;
    match symbol {
        INT_SYMBOL => decode_int(payload),
        FLOAT_SYMBOL => decode_float(payload),
        BYTES_SYMBOL => Ok(Value::Bytes(payload.to_vec())),
        STRING_SYMBOL => decode_str(payload),
        LIST_SYMBOL => Err(KvError::BadCollection),
        TUPLE_SYMBOL => Ok(Value::Tuple(decode_items(payload, decode_collectable)?)),
        BOOL_SYMBOL => decode_bool(payload),
        DATETIME_SYMBOL => decode_datetime(payload).map(Value::Datetime),
        _ => Err(KvError::BadType),
    }
}

/// Decodes a key, accepting only hashable variants.
///
/// Tuple elements must be both hashable and collectable; the check runs on
/// each element's symbol before recursing so a forbidden element fails with
/// `BadHash` rather than decoding partway.
pub fn decode_hashable(buf: &[u8]) -> KvResult<Value> {
    let (symbol, payload) = split_symbol(buf)?;
    match symbol {
        INT_SYMBOL => decode_int(payload),
        FLOAT_SYMBOL => decode_float(payload),
        BYTES_SYMBOL => Ok(Value::Bytes(payload.to_vec())),
        STRING_SYMBOL => decode_str(payload),
        TUPLE_SYMBOL => Ok(Value::Tuple(decode_items(payload, decode_key_element)?)),
        LIST_SYMBOL | BOOL_SYMBOL | DATETIME_SYMBOL => Err(KvError::BadHash),
        _ => Err(KvError::BadType),
    }
}

/// Decodes a TTL argument, which must be a `Datetime`.
pub fn decode_ttl(buf: &[u8]) -> KvResult<DateTime<FixedOffset>> {
    let (symbol, payload) = split_symbol(buf)?;
    match symbol {
        DATETIME_SYMBOL => decode_datetime(payload),
        _ => Err(KvError::BadType),
    }
}

fn decode_key_element(buf: &[u8]) -> KvResult<Value> {
    // decode_items guarantees a non-empty item, so the symbol exists.
    match buf[0] {
        INT_SYMBOL | FLOAT_SYMBOL | BYTES_SYMBOL | STRING_SYMBOL | TUPLE_SYMBOL => {
            decode_hashable(buf)
        }
        LIST_SYMBOL | BOOL_SYMBOL | DATETIME_SYMBOL => Err(KvError::BadHash),
        _ => Err(KvError::BadType),
    }
}

fn split_symbol(buf: &[u8]) -> KvResult<(u8, &[u8])> {
    match buf.split_first() {
        Some((&symbol, payload)) => Ok((symbol, payload)),
        None => Err(KvError::BadType),
    }
}

fn decode_int(payload: &[u8]) -> KvResult<Value> {
    let text = std::str::from_utf8(payload).map_err(|_| KvError::BadType)?;
    text.parse::<i64>()
        .map(Value::Int)
        .map_err(|_| KvError::BadType)
}

fn decode_float(payload: &[u8]) -> KvResult<Value> {
    let text = std::str::from_utf8(payload).map_err(|_| KvError::BadType)?;
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| KvError::BadType)
}

fn decode_str(payload: &[u8]) -> KvResult<Value> {
    match std::str::from_utf8(payload) {
        Ok(text) => Ok(Value::Str(text.to_string())),
        Err(_) => Err(KvError::BadType),
    }
}

fn decode_bool(payload: &[u8]) -> KvResult<Value> {
    match payload {
        b"0" => Ok(Value::Bool(false)),
        b"1" => Ok(Value::Bool(true)),
        _ => Err(KvError::BadType),
    }
}

fn decode_datetime(payload: &[u8]) -> KvResult<DateTime<FixedOffset>> {
    let text = std::str::from_utf8(payload).map_err(|_| KvError::BadType)?;
    DateTime::parse_from_str(text, DATETIME_FORMAT).map_err(|_| KvError::BadType)
}

/// Walks a collection payload: `u16` LE count, then per item a `u16` LE
/// length followed by the item's self-describing encoding.
///
/// The length walk completes (and must consume the payload exactly) before
/// any item decodes, so framing damage always surfaces as a client error
/// rather than as a type error on a desynchronized item.
fn decode_items<F>(payload: &[u8], decode_item: F) -> KvResult<Vec<Value>>
where
    F: Fn(&[u8]) -> KvResult<Value>,
{
    if payload.len() < 2 {
        return Err(KvError::BadType);
    }
    let count = u16::from_le_bytes([payload[0], payload[1]]) as usize;

    let mut slices = Vec::with_capacity(count);
    let mut offset = 2;
    for _ in 0..count {
        if offset + 2 > payload.len() {
            return Err(KvError::Client);
        }
        let item_len = u16::from_le_bytes([payload[offset], payload[offset + 1]]) as usize;
        if item_len == 0 {
            // No room for a type symbol.
            return Err(KvError::Client);
        }
        offset += 2;
        let end = offset + item_len;
        if end > payload.len() {
            return Err(KvError::Client);
        }
        slices.push(&payload[offset..end]);
        offset = end;
    }

    if offset != payload.len() {
        return Err(KvError::Client);
    }

    slices.into_iter().map(decode_item).collect()
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes any value reachable over the wire.
///
/// `Deque` has no symbol; asking for one is an internal consistency error.
pub fn encode_any(value: &Value) -> KvResult<Vec<u8>> {
    match value {
        Value::Int(v) => Ok(encode_text(INT_SYMBOL, &v.to_string())),
        Value::Float(v) => Ok(encode_text(FLOAT_SYMBOL, &v.to_string())),
        Value::Bytes(raw) => Ok(encode_raw(BYTES_SYMBOL, raw)),
        Value::Str(text) => Ok(encode_text(STRING_SYMBOL, text)),
        Value::Bool(v) => Ok(encode_bool(*v)),
        Value::Datetime(dt) => Ok(encode_datetime(dt)),
        Value::List(items) => encode_items(LIST_SYMBOL, items, encode_collectable),
        Value::Tuple(items) => encode_items(TUPLE_SYMBOL, items, encode_collectable),
        Value::Deque(_) => Err(KvError::Server),
    }
}

/// Encodes a collection element, refusing nested collections.
pub fn encode_collectable(value: &Value) -> KvResult<Vec<u8>> {
    match value {
        Value::List(_) | Value::Deque(_) => Err(KvError::BadCollection),
        Value::Tuple(items) => encode_items(TUPLE_SYMBOL, items, encode_collectable),
        other => encode_any(other),
    }
}

/// Encodes a key, refusing non-hashable variants.
pub fn encode_hashable(value: &Value) -> KvResult<Vec<u8>> {
    match value {
        Value::Int(_) | Value::Float(_) | Value::Bytes(_) | Value::Str(_) => encode_any(value),
        Value::Tuple(items) => {
            for item in items {
                if !(item.is_hashable() && item.is_collectable()) {
                    return Err(KvError::BadHash);
                }
            }
            encode_items(TUPLE_SYMBOL, items, encode_hashable)
        }
        Value::Bool(_) | Value::Datetime(_) | Value::List(_) | Value::Deque(_) => {
            Err(KvError::BadHash)
        }
    }
}

fn encode_text(symbol: u8, text: &str) -> Vec<u8> {
    encode_raw(symbol, text.as_bytes())
}

fn encode_raw(symbol: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(symbol);
    out.extend_from_slice(payload);
    out
}

fn encode_bool(value: bool) -> Vec<u8> {
    vec![BOOL_SYMBOL, if value { b'1' } else { b'0' }]
}

fn encode_datetime(dt: &DateTime<FixedOffset>) -> Vec<u8> {
    encode_text(DATETIME_SYMBOL, &dt.format(DATETIME_FORMAT).to_string())
}

fn encode_items<F>(symbol: u8, items: &[Value], encode_item: F) -> KvResult<Vec<u8>>
where
    F: Fn(&Value) -> KvResult<Vec<u8>>,
{
    // Wire limits: u16 item count, u16 per-item length.
    let count = u16::try_from(items.len()).map_err(|_| KvError::Server)?;
    let mut out = Vec::with_capacity(3 + items.len() * 4);
    out.push(symbol);
    out.extend_from_slice(&count.to_le_bytes());
    for item in items {
        let encoded = encode_item(item)?;
        let item_len = u16::try_from(encoded.len()).map_err(|_| KvError::Server)?;
        out.extend_from_slice(&item_len.to_le_bytes());
        out.extend_from_slice(&encoded);
    }
    Ok(out)
}
