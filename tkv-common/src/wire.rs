//! # Request Framing
//!
//! A request frame is a `u16` LE substring count followed by that many
//! `u16`-LE-length-prefixed substrings. Substring 0 is the command name;
//! the rest are still-encoded argument values. On the connection, frames
//! and responses each travel behind a `u16` LE body-length prefix.
//!
//! The core produces a [`Response`]; serializing it onto a connection is
//! the driver's job.

use crate::error::{KvError, KvResult, STATUS_OK};

/// Maximum body length of a request or response (`u16` framing).
pub const MAX_MSG_SIZE: usize = 65535;

/// Outcome of dispatching one request frame.
///
/// `payload` is present only on OK responses, and only for the commands
/// that return a value (GET, POP).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// One-byte wire status (`STATUS_OK` or a `KvError` code).
    pub status: u8,
    /// Encoded value payload, when the command returns one.
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Builds a success response without a payload.
    pub const fn ok() -> Self {
        Response {
            status: STATUS_OK,
            payload: None,
        }
    }

    /// Builds a success response carrying an encoded value.
    pub const fn with_payload(payload: Vec<u8>) -> Self {
        Response {
            status: STATUS_OK,
            payload: Some(payload),
        }
    }
}

impl From<KvError> for Response {
    fn from(err: KvError) -> Self {
        Response {
            status: err.code(),
            payload: None,
        }
    }
}

/// Splits a request frame into its substrings without copying.
///
/// The declared lengths must consume the frame exactly; overshoot and
/// undershoot are both framing errors.
pub fn split_frame(frame: &[u8]) -> KvResult<Vec<&[u8]>> {
    if frame.len() < 2 {
        return Err(KvError::Client);
    }
    let count = u16::from_le_bytes([frame[0], frame[1]]) as usize;

    let mut parts = Vec::with_capacity(count);
    let mut offset = 2;
    for _ in 0..count {
        if offset + 2 > frame.len() {
            return Err(KvError::Client);
        }
        let part_len = u16::from_le_bytes([frame[offset], frame[offset + 1]]) as usize;
        offset += 2;
        let end = offset + part_len;
        if end > frame.len() {
            return Err(KvError::Client);
        }
        parts.push(&frame[offset..end]);
        offset = end;
    }

    if offset != frame.len() {
        return Err(KvError::Client);
    }
    Ok(parts)
}

/// Assembles a request frame from command and argument substrings.
///
/// Fails with `Client` when a substring or the whole frame exceeds the
/// `u16` wire limits.
pub fn build_frame(parts: &[&[u8]]) -> KvResult<Vec<u8>> {
    let count = u16::try_from(parts.len()).map_err(|_| KvError::Client)?;

    let mut frame = Vec::with_capacity(2 + parts.iter().map(|p| 2 + p.len()).sum::<usize>());
    frame.extend_from_slice(&count.to_le_bytes());
    for part in parts {
        let part_len = u16::try_from(part.len()).map_err(|_| KvError::Client)?;
        frame.extend_from_slice(&part_len.to_le_bytes());
        frame.extend_from_slice(part);
    }

    if frame.len() > MAX_MSG_SIZE {
        return Err(KvError::Client);
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_split_roundtrips() {
        let frame = build_frame(&[b"GET", b"\"key"]).unwrap();
        let parts = split_frame(&frame).unwrap();
        assert_eq!(parts, vec![b"GET".as_ref(), b"\"key".as_ref()]);
    }

    #[test]
    fn empty_substrings_are_preserved() {
        let frame = build_frame(&[b"CMD", b""]).unwrap();
        let parts = split_frame(&frame).unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[1].is_empty());
    }

    #[test]
    fn exact_consumption_is_enforced() {
        let frame = build_frame(&[b"GET", b"\"key"]).unwrap();

        let mut extended = frame.clone();
        extended.push(0);
        assert_eq!(split_frame(&extended), Err(KvError::Client));

        let mut shrunk = frame.clone();
        shrunk[2] -= 1; // first substring length prefix
        assert_eq!(split_frame(&shrunk), Err(KvError::Client));

        let mut truncated = frame;
        truncated.pop();
        assert_eq!(split_frame(&truncated), Err(KvError::Client));
    }

    #[test]
    fn short_frames_are_client_errors() {
        assert_eq!(split_frame(b""), Err(KvError::Client));
        assert_eq!(split_frame(b"\x01"), Err(KvError::Client));
        assert_eq!(split_frame(&[1, 0]), Err(KvError::Client));
    }

    #[test]
    fn oversized_frame_is_rejected_at_build_time() {
        let big = vec![0u8; MAX_MSG_SIZE];
        assert_eq!(build_frame(&[b"PUT", &big]), Err(KvError::Client));
    }

    #[test]
    fn response_constructors_set_status() {
        assert_eq!(Response::ok().status, STATUS_OK);
        assert_eq!(Response::with_payload(b"#1".to_vec()).payload, Some(b"#1".to_vec()));
        let resp = Response::from(KvError::BadKey);
        assert_eq!(resp.status, KvError::BadKey.code());
        assert_eq!(resp.payload, None);
    }
}
