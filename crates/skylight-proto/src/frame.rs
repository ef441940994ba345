//! Binary container for encoded surface frames.
//!
//! Every frame pushed by a remote client travels as one self-contained
//! buffer. All integers are little-endian.
//!
//! # Layout
//!
//! | offset | type  | field            |
//! |--------|-------|------------------|
//! | 0      | `u32` | serial           |
//! | 4      | `u16` | encoding type    |
//! | 6      | `u16` | encoding options |
//! | 8      | `u16` | width            |
//! | 10     | `u16` | height           |
//! | 12     | `u32` | fragment count   |
//! | 16     | ...   | fragments        |
//!
//! The header only records how many fragments follow. Each fragment carries
//! its own `u32` length prefix, then its payload. Fragments are written and
//! read strictly in order; consumers treat that order as plane order
//! (Y, U, V, alpha-Y).

use serde::Serialize;
use thiserror::Error;

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Size of the inline length prefix in front of every fragment.
pub const FRAGMENT_PREFIX_SIZE: usize = 4;

/// Errors produced while encoding or decoding a frame container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("malformed frame: {len} bytes is shorter than the 16-byte header")]
    ShortHeader { len: usize },

    #[error("malformed frame: {count} fragments need at least {needed} bytes, buffer has {len}")]
    FragmentTableOverrun { count: u32, needed: usize, len: usize },

    #[error("malformed frame: fragment {index} declares {declared} bytes but only {remaining} remain")]
    FragmentOverrun {
        index: u32,
        declared: usize,
        remaining: usize,
    },

    #[error("malformed frame: {0} bytes trail the last fragment")]
    TrailingBytes(usize),

    #[error("fragment {index} is {len} bytes, too large for its length prefix")]
    FragmentTooLarge { index: usize, len: usize },

    #[error("{0} fragments do not fit the fragment count field")]
    TooManyFragments(usize),
}

impl FrameError {
    /// True for errors raised while decoding untrusted bytes.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::ShortHeader { .. }
                | Self::FragmentTableOverrun { .. }
                | Self::FragmentOverrun { .. }
                | Self::TrailingBytes(_)
        )
    }
}

/// Fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameHeader {
    pub serial: u32,
    pub encoding_type: u16,
    /// Reserved, always written as 0.
    pub encoding_options: u16,
    pub width: u16,
    pub height: u16,
    pub fragment_count: u32,
}

impl FrameHeader {
    /// Parse the header from the start of `bytes`.
    pub fn read_from(bytes: &[u8]) -> Result<Self, FrameError> {
        let Some(h) = bytes.first_chunk::<HEADER_SIZE>() else {
            return Err(FrameError::ShortHeader { len: bytes.len() });
        };

        Ok(Self {
            serial: u32::from_le_bytes([h[0], h[1], h[2], h[3]]),
            encoding_type: u16::from_le_bytes([h[4], h[5]]),
            encoding_options: u16::from_le_bytes([h[6], h[7]]),
            width: u16::from_le_bytes([h[8], h[9]]),
            height: u16::from_le_bytes([h[10], h[11]]),
            fragment_count: u32::from_le_bytes([h[12], h[13], h[14], h[15]]),
        })
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.serial.to_le_bytes());
        buf.extend_from_slice(&self.encoding_type.to_le_bytes());
        buf.extend_from_slice(&self.encoding_options.to_le_bytes());
        buf.extend_from_slice(&self.width.to_le_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.fragment_count.to_le_bytes());
    }
}

/// One ordered chunk of a frame payload, borrowed from its backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    bytes: &'a [u8],
}

impl<'a> Fragment<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes this fragment occupies on the wire, length prefix included.
    pub fn wire_size(&self) -> usize {
        FRAGMENT_PREFIX_SIZE + self.bytes.len()
    }
}

impl<'a> From<&'a [u8]> for Fragment<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

/// A decoded frame. Fragment payloads point into the buffer it was decoded
/// from, so the frame cannot outlive that buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame<'a> {
    pub serial: u32,
    pub encoding_type: u16,
    pub encoding_options: u16,
    pub width: u16,
    pub height: u16,
    fragments: Vec<Fragment<'a>>,
}

impl<'a> EncodedFrame<'a> {
    pub fn new(
        serial: u32,
        encoding_type: u16,
        width: u16,
        height: u16,
        fragments: Vec<Fragment<'a>>,
    ) -> Self {
        Self {
            serial,
            encoding_type,
            encoding_options: 0,
            width,
            height,
            fragments,
        }
    }

    pub fn fragments(&self) -> &[Fragment<'a>] {
        &self.fragments
    }

    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            serial: self.serial,
            encoding_type: self.encoding_type,
            encoding_options: self.encoding_options,
            width: self.width,
            height: self.height,
            fragment_count: self.fragments.len() as u32,
        }
    }

    /// Sum of all fragment payload sizes, prefixes excluded.
    pub fn payload_len(&self) -> usize {
        self.fragments.iter().map(Fragment::len).sum()
    }

    /// Total encoded size of this frame.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.fragments.iter().map(Fragment::wire_size).sum::<usize>()
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(
            self.serial,
            self.encoding_type,
            self.width,
            self.height,
            &self.fragments,
        )
    }
}

/// Serialize a frame into a freshly allocated buffer.
pub fn encode(
    serial: u32,
    encoding_type: u16,
    width: u16,
    height: u16,
    fragments: &[Fragment<'_>],
) -> Result<Vec<u8>, FrameError> {
    let fragment_count =
        u32::try_from(fragments.len()).map_err(|_| FrameError::TooManyFragments(fragments.len()))?;

    let header = FrameHeader {
        serial,
        encoding_type,
        encoding_options: 0, // no options defined yet
        width,
        height,
        fragment_count,
    };

    let total = HEADER_SIZE + fragments.iter().map(Fragment::wire_size).sum::<usize>();
    let mut buf = Vec::with_capacity(total);
    header.write_to(&mut buf);

    for (index, fragment) in fragments.iter().enumerate() {
        let len = u32::try_from(fragment.len()).map_err(|_| FrameError::FragmentTooLarge {
            index,
            len: fragment.len(),
        })?;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(fragment.bytes());
    }

    debug_assert_eq!(buf.len(), total);
    Ok(buf)
}

/// Parse a frame without copying fragment payloads.
pub fn decode(bytes: &[u8]) -> Result<EncodedFrame<'_>, FrameError> {
    let header = FrameHeader::read_from(bytes)?;

    // Every fragment needs at least its length prefix.
    let needed = (header.fragment_count as usize)
        .checked_mul(FRAGMENT_PREFIX_SIZE)
        .and_then(|n| n.checked_add(HEADER_SIZE));
    match needed {
        Some(needed) if needed <= bytes.len() => {}
        _ => {
            return Err(FrameError::FragmentTableOverrun {
                count: header.fragment_count,
                needed: needed.unwrap_or(usize::MAX),
                len: bytes.len(),
            });
        }
    }

    let mut fragments = Vec::with_capacity(header.fragment_count as usize);
    let mut rest = &bytes[HEADER_SIZE..];

    for index in 0..header.fragment_count {
        let Some((prefix, tail)) = rest.split_first_chunk::<FRAGMENT_PREFIX_SIZE>() else {
            return Err(FrameError::FragmentOverrun {
                index,
                declared: FRAGMENT_PREFIX_SIZE,
                remaining: rest.len(),
            });
        };

        let declared = u32::from_le_bytes(*prefix) as usize;
        if declared > tail.len() {
            return Err(FrameError::FragmentOverrun {
                index,
                declared,
                remaining: tail.len(),
            });
        }

        let (payload, next) = tail.split_at(declared);
        fragments.push(Fragment::new(payload));
        rest = next;
    }

    if !rest.is_empty() {
        return Err(FrameError::TrailingBytes(rest.len()));
    }

    Ok(EncodedFrame {
        serial: header.serial,
        encoding_type: header.encoding_type,
        encoding_options: header.encoding_options,
        width: header.width,
        height: header.height,
        fragments,
    })
}
