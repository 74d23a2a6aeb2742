//! Newline-delimited JSON framing
//!
//! Each message is one JSON object followed by `\n`. A reader also accepts a
//! last frame cut by EOF, so a peer that writes then shuts down its half is
//! understood. Reads are bounded in size and time; a peer that connects and
//! never sends cannot hold a handler forever.

use crate::error::FrameError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

const DELIMITER: u8 = b'\n';

/// Bounds applied to every frame read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub max_frame_bytes: usize,
    pub io_timeout: Duration,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_frame_bytes: 64 * 1024,
            io_timeout: Duration::from_secs(5),
        }
    }
}

/// Read and decode exactly one frame.
pub async fn read_frame<R, T>(reader: &mut R, limits: &FrameLimits) -> Result<T, FrameError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let limit = limits.max_frame_bytes;
    let mut buf = Vec::new();

    // one extra byte lets a frame of exactly `limit` bytes keep its delimiter
    let mut bounded = (&mut *reader).take(limit as u64 + 1);
    let read = bounded.read_until(DELIMITER, &mut buf);
    let n = match timeout(limits.io_timeout, read).await {
        Ok(res) => res?,
        Err(_) => return Err(FrameError::Timeout(limits.io_timeout)),
    };

    if n == 0 {
        return Err(FrameError::Empty);
    }
    if buf.last() == Some(&DELIMITER) {
        buf.pop();
    }
    if buf.len() > limit {
        return Err(FrameError::TooLarge { limit });
    }
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Err(FrameError::Empty);
    }

    Ok(serde_json::from_slice(&buf)?)
}

/// Encode and write one frame, then flush.
pub async fn write_frame<W, T>(writer: &mut W, value: &T, limits: &FrameLimits) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(value)?;
    if bytes.len() > limits.max_frame_bytes {
        return Err(FrameError::TooLarge {
            limit: limits.max_frame_bytes,
        });
    }
    bytes.push(DELIMITER);

    let write = async {
        writer.write_all(&bytes).await?;
        writer.flush().await
    };
    match timeout(limits.io_timeout, write).await {
        Ok(res) => Ok(res?),
        Err(_) => Err(FrameError::Timeout(limits.io_timeout)),
    }
}
