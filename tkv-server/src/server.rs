//! # TCP Server
//!
//! Accept framed TypedKV connections, hand complete request bodies to the
//! dispatcher, and write back `u16`-length-prefixed responses. The core
//! never sees the socket; this module owns all connection state.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{trace, warn};

use tkv_common::{KvError, Response, MAX_MSG_SIZE};
use tkv_engine::Store;

/// Handles a single TCP client connection.
///
/// Requests arrive as a `u16` LE body length followed by the request
/// frame; responses leave as a `u16` LE body length followed by one status
/// byte and the optional payload.
pub async fn handle_connection(stream: TcpStream, store: Arc<Store>) -> std::io::Result<()> {
    let mut stream = stream;
    let mut buffer = BytesMut::with_capacity(8 * 1024);

    loop {
        let bytes = stream.read_buf(&mut buffer).await?;
        if bytes == 0 {
            break;
        }

        while let Some(body) = take_request(&mut buffer) {
            trace!(len = body.len(), "dispatching request");
            let response = store.dispatch(&body);
            stream.write_all(&serialize_response(&response)).await?;
        }
    }

    Ok(())
}

/// Pops one complete length-prefixed request body off the buffer.
///
/// Returns `None` while the prefix or body is still partial.
fn take_request(buffer: &mut BytesMut) -> Option<Vec<u8>> {
    if buffer.len() < 2 {
        return None;
    }
    let body_len = u16::from_le_bytes([buffer[0], buffer[1]]) as usize;
    if buffer.len() < 2 + body_len {
        return None;
    }
    buffer.advance(2);
    Some(buffer.split_to(body_len).to_vec())
}

/// Serializes a response onto the connection framing.
///
/// A payload that cannot fit the `u16` body limit degrades to a bare
/// server-error status; the driver never sends a partial payload.
fn serialize_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    let body_len = 1 + payload.len();
    if body_len > MAX_MSG_SIZE {
        warn!(body_len, "response payload exceeds wire limit");
        return serialize_response(&Response::from(KvError::Server));
    }

    let mut out = Vec::with_capacity(2 + body_len);
    out.extend_from_slice(&(body_len as u16).to_le_bytes());
    out.push(response.status);
    out.extend_from_slice(payload);
    out
}
