//! Length-prefixed message framing for the frame stream.
//!
//! Each message is a 4-byte big-endian length followed by that many bytes.
//! One message carries exactly one encoded frame.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default upper bound for a single message (64 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("message of {len} bytes exceeds the {max}-byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("stream closed inside a message, {expected} bytes expected")]
    UnexpectedEof { expected: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Prefix `payload` with its length.
pub fn encode_message(payload: &[u8], max: usize) -> Result<Vec<u8>, StreamError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|_| payload.len() <= max)
        .ok_or(StreamError::TooLarge {
            len: payload.len(),
            max,
        })?;

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Write one message and flush.
pub async fn write_message<W>(writer: &mut W, payload: &[u8], max: usize) -> Result<(), StreamError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = encode_message(payload, max)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between
/// messages.
pub async fn read_message<R>(reader: &mut R, max: usize) -> Result<Option<Vec<u8>>, StreamError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_SIZE {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(StreamError::UnexpectedEof {
                expected: LENGTH_PREFIX_SIZE,
            });
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max {
        return Err(StreamError::TooLarge { len, max });
    }

    let mut msg = vec![0u8; len];
    reader.read_exact(&mut msg).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            StreamError::UnexpectedEof { expected: len }
        } else {
            StreamError::Io(e)
        }
    })?;

    Ok(Some(msg))
}
