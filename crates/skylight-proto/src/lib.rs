//! Skylight wire protocol
//!
//! Byte-level formats shared between remote surface producers and the
//! compositor: the encoded frame container and the length-prefixed stream
//! that carries those frames over a Unix socket.

pub mod frame;
pub mod stream;

pub use frame::{decode, encode, EncodedFrame, Fragment, FrameError, FrameHeader};
pub use stream::{read_message, write_message, StreamError};

/// Socket path for the frame stream
pub fn socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));
    std::path::PathBuf::from(runtime_dir).join("skylight.sock")
}
