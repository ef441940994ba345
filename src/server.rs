//! Frame stream server and client.
//!
//! Every accepted connection is one surface. Connection tasks only read
//! and forward raw messages; decoding and compositing happen on the task
//! that owns the GL context.

use anyhow::{Context, Result};
use skylight_proto::{read_message, write_message};
use std::path::Path;
use tokio::io::AsyncRead;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::compositor::SurfaceId;

/// Frames buffered between connection tasks and the compositor.
pub const FRAME_QUEUE_DEPTH: usize = 8;

#[derive(Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Connected(SurfaceId),
    Frame { surface: SurfaceId, message: Vec<u8> },
    Disconnected(SurfaceId),
}

/// Bind `path`, replacing a stale socket file.
pub fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        debug!("Removing stale socket {:?}", path);
        std::fs::remove_file(path).with_context(|| format!("Failed to remove stale socket {:?}", path))?;
    }
    let listener = UnixListener::bind(path).with_context(|| format!("Failed to bind {:?}", path))?;
    info!("Listening for frame streams on {:?}", path);
    Ok(listener)
}

/// Accept connections until the receiver goes away.
pub async fn accept_loop(listener: UnixListener, tx: mpsc::Sender<StreamEvent>, max_message_size: usize) {
    let mut next_surface: SurfaceId = 1;
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!("Failed to accept frame stream: {}", e);
                continue;
            }
        };

        let surface = next_surface;
        next_surface += 1;

        if tx.send(StreamEvent::Connected(surface)).await.is_err() {
            break;
        }
        tokio::spawn(read_connection(stream, surface, tx.clone(), max_message_size));
    }
}

/// Forward every message of one connection, then report the disconnect.
pub async fn read_connection<R>(mut reader: R, surface: SurfaceId, tx: mpsc::Sender<StreamEvent>, max_message_size: usize)
where
    R: AsyncRead + Unpin,
{
    let mut count = 0u64;
    loop {
        match read_message(&mut reader, max_message_size).await {
            Ok(Some(message)) => {
                count += 1;
                if tx.send(StreamEvent::Frame { surface, message }).await.is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Surface {} stream error: {}", surface, e);
                break;
            }
        }
    }

    debug!("Surface {} stream ended after {} messages", surface, count);
    let _ = tx.send(StreamEvent::Disconnected(surface)).await;
}

/// Connect to `path` and send each encoded frame as one message.
pub async fn send_frames<I>(path: &Path, frames: I, max_message_size: usize) -> Result<usize>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let mut stream = UnixStream::connect(path)
        .await
        .with_context(|| format!("Failed to connect to {:?}", path))?;

    let mut sent = 0;
    for frame in frames {
        write_message(&mut stream, &frame, max_message_size)
            .await
            .with_context(|| format!("Failed to send frame {}", sent))?;
        sent += 1;
    }
    info!("Sent {} frames to {:?}", sent, path);
    Ok(sent)
}
