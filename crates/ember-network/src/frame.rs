//! Connection-level framing: a peer writes one message, shuts down its
//! write half, and the other side reads until end-of-stream.
//!
//! This mirrors the original protocol's "dial, write, close" shape exactly
//! (no request/response multiplexing on a single connection) but adds a
//! read timeout and a max-frame-size guard, since reading an unbounded
//! socket to EOF is not something idiomatic Rust lets a peer dictate.

use std::time::Duration;

use ember_core::error::NetworkError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::message::{Message, MAX_PAYLOAD_LEN};

/// Upper bound on time spent reading one frame before the connection is
/// dropped as unresponsive.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Dial `addr`, write `message`'s frame, and half-close so the peer's
/// read-to-EOF completes. Connection failures are swallowed (the caller
/// only cares whether the peer is reachable right now), matching the
/// original protocol's "peer unavailable, move on" behavior.
pub async fn send_message(addr: &str, message: &Message) -> Result<(), NetworkError> {
    let frame = message.encode()?;
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| NetworkError::Io(e.to_string()))?;
    stream
        .write_all(&frame)
        .await
        .map_err(|e| NetworkError::Io(e.to_string()))?;
    stream
        .shutdown()
        .await
        .map_err(|e| NetworkError::Io(e.to_string()))?;
    Ok(())
}

/// Read one frame from `stream` until end-of-stream, bounded by
/// [`MAX_PAYLOAD_LEN`] (plus command prefix) and [`READ_TIMEOUT`].
pub async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>, NetworkError> {
    let max_len = crate::message::COMMAND_LEN + MAX_PAYLOAD_LEN;
    let mut buf = Vec::new();

    let read = timeout(READ_TIMEOUT, async {
        let mut chunk = [0u8; 8192];
        loop {
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| NetworkError::Io(e.to_string()))?;
            if n == 0 {
                break;
            }
            if buf.len() + n > max_len {
                return Err(NetworkError::FrameTooLarge {
                    size: buf.len() + n,
                    max: max_len,
                });
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    })
    .await
    .map_err(|_| NetworkError::Io("read timed out".to_string()))?;

    read?;
    Ok(buf)
}

/// Read and decode one [`Message`] from `stream`.
pub async fn read_message(stream: &mut TcpStream) -> Result<Message, NetworkError> {
    let frame = read_frame(stream).await?;
    Message::decode(&frame)
}
