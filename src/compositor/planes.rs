//! Planar YUV 4:2:0 + alpha layout of a decoded frame payload.
//!
//! Fragments are walked as one ordered byte stream and sliced into the
//! Y, U, V and alpha-Y planes, in that order. Each plane must sit inside a
//! single fragment; nothing is copied.

use skylight_proto::{EncodedFrame, Fragment};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Which of the four planes a slice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
    Y,
    U,
    V,
    AlphaY,
}

impl fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Y => "Y",
            Self::U => "U",
            Self::V => "V",
            Self::AlphaY => "alpha-Y",
        })
    }
}

/// Largest supported plane alignment.
pub const MAX_PLANE_ALIGNMENT: u32 = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaneError {
    #[error("frame has an empty {width}x{height} extent")]
    EmptyFrame { width: u16, height: u16 },

    #[error("plane alignment {0} exceeds {MAX_PLANE_ALIGNMENT}")]
    UnsupportedAlignment(u32),

    #[error("{plane} plane is missing: frame payload ended")]
    Missing { plane: PlaneKind },

    #[error("{plane} plane needs {needed} bytes but fragment {fragment} has {available} left")]
    Truncated {
        plane: PlaneKind,
        fragment: usize,
        needed: usize,
        available: usize,
    },
}

/// Coded size of the planes for a logical frame size.
///
/// Encoders often pad rows and height to a macroblock multiple; `stride`
/// and `rows` are the padded luma extent, `width` and `height` the visible
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub rows: u32,
}

impl PlaneLayout {
    /// Layout for a visible size, padding both axes to `alignment`
    /// (0 and 1 mean unpadded).
    pub fn new(width: u32, height: u32, alignment: u32) -> Self {
        let align = |v: u32| match alignment {
            0 | 1 => v,
            a => v.div_ceil(a).saturating_mul(a),
        };
        Self {
            width,
            height,
            stride: align(width),
            rows: align(height),
        }
    }

    pub fn luma_size(&self) -> usize {
        (self.stride as usize).saturating_mul(self.rows as usize)
    }

    /// Each chroma plane is a quarter of the luma plane.
    pub fn chroma_size(&self) -> usize {
        self.luma_size() >> 2
    }

    pub fn chroma_width(&self) -> u32 {
        self.width / 2
    }

    pub fn chroma_height(&self) -> u32 {
        self.height / 2
    }

    pub fn chroma_stride(&self) -> u32 {
        self.stride / 2
    }

    /// Bytes of Y, U, V and alpha-Y together.
    pub fn total_size(&self) -> usize {
        self.luma_size()
            .saturating_add(self.chroma_size())
            .saturating_mul(2)
    }
}

/// One single-channel plane ready for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Row pitch of `data` in samples.
    pub stride: u32,
}

impl Plane<'_> {
    /// Sample at `(x, y)` of the visible area.
    pub fn sample(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.stride as usize + x as usize]
    }
}

/// The four planes of a YUVA 4:2:0 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YuvaPlanes<'a> {
    pub layout: PlaneLayout,
    pub y: Plane<'a>,
    pub u: Plane<'a>,
    pub v: Plane<'a>,
    pub alpha_y: Plane<'a>,
}

impl<'a> YuvaPlanes<'a> {
    /// Slice the planes out of a decoded frame.
    pub fn split(frame: &EncodedFrame<'a>, alignment: u32) -> Result<Self, PlaneError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(PlaneError::EmptyFrame {
                width: frame.width,
                height: frame.height,
            });
        }
        if alignment > MAX_PLANE_ALIGNMENT {
            return Err(PlaneError::UnsupportedAlignment(alignment));
        }

        let layout = PlaneLayout::new(frame.width.into(), frame.height.into(), alignment);
        Self::from_fragments(frame.fragments(), layout)
    }

    /// Slice the planes out of an ordered fragment list with a known layout.
    pub fn from_fragments(fragments: &[Fragment<'a>], layout: PlaneLayout) -> Result<Self, PlaneError> {
        let mut cursor = FragmentCursor::new(fragments);

        let luma = |data| Plane {
            data,
            width: layout.width,
            height: layout.height,
            stride: layout.stride,
        };
        let chroma = |data| Plane {
            data,
            width: layout.chroma_width(),
            height: layout.chroma_height(),
            stride: layout.chroma_stride(),
        };

        let y = luma(cursor.take(PlaneKind::Y, layout.luma_size())?);
        let u = chroma(cursor.take(PlaneKind::U, layout.chroma_size())?);
        let v = chroma(cursor.take(PlaneKind::V, layout.chroma_size())?);
        let alpha_y = luma(cursor.take(PlaneKind::AlphaY, layout.luma_size())?);

        let leftover = cursor.remaining();
        if leftover > 0 {
            debug!("Ignoring {} bytes of frame payload after the alpha plane", leftover);
        }

        Ok(Self {
            layout,
            y,
            u,
            v,
            alpha_y,
        })
    }
}

struct FragmentCursor<'f, 'a> {
    fragments: &'f [Fragment<'a>],
    index: usize,
    offset: usize,
}

impl<'f, 'a> FragmentCursor<'f, 'a> {
    fn new(fragments: &'f [Fragment<'a>]) -> Self {
        Self {
            fragments,
            index: 0,
            offset: 0,
        }
    }

    fn take(&mut self, plane: PlaneKind, len: usize) -> Result<&'a [u8], PlaneError> {
        if len == 0 {
            return Ok(&[]);
        }

        // Step over exhausted (and empty) fragments.
        while self
            .fragments
            .get(self.index)
            .is_some_and(|f| self.offset >= f.len())
        {
            self.index += 1;
            self.offset = 0;
        }

        let Some(fragment) = self.fragments.get(self.index) else {
            return Err(PlaneError::Missing { plane });
        };

        let available = fragment.len() - self.offset;
        if len > available {
            return Err(PlaneError::Truncated {
                plane,
                fragment: self.index,
                needed: len,
                available,
            });
        }

        let data = &fragment.bytes()[self.offset..self.offset + len];
        self.offset += len;
        Ok(data)
    }

    fn remaining(&self) -> usize {
        self.fragments
            .iter()
            .skip(self.index)
            .map(Fragment::len)
            .sum::<usize>()
            .saturating_sub(self.offset)
    }
}
