//! OpenGL YUVA surface renderer
//!
//! Every surface owns four single-channel textures (Y, U, V and alpha-Y)
//! and is drawn as one textured quad into an RGBA8 framebuffer object.
//! All calls require the owning GL context to be current.

use super::color::NEUTRAL_SAMPLE;
use super::planes::{Plane, PlaneKind, YuvaPlanes};
use std::ffi::CString;
use std::ptr;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Pass-through vertex stage: pixel coordinates through `uProjection`.
pub const YUVA_VERTEX_SHADER: &str = r#"
    #version 330 core
    layout (location = 0) in vec2 aPosition;
    layout (location = 1) in vec2 aTexCoord;

    uniform mat4 uProjection;

    out vec2 vTexCoord;

    void main() {
        vTexCoord = aTexCoord;
        gl_Position = uProjection * vec4(aPosition, 0.0, 1.0);
    }
"#;

/// BT.601 limited-range YUV to RGB, alpha taken from the alpha-Y plane.
pub const YUVA_FRAGMENT_SHADER: &str = r#"
    #version 330 core
    in vec2 vTexCoord;

    out vec4 FragColor;

    uniform sampler2D yTexture;
    uniform sampler2D uTexture;
    uniform sampler2D vTexture;
    uniform sampler2D alphaYTexture;

    const mat4 YUV2RGB = mat4(
        1.1643828125, 0, 1.59602734375, -0.87078515625,
        1.1643828125, -0.39176171875, -0.81296875, 0.52959375,
        1.1643828125, 2.017234375, 0, -1.081390625,
        0, 0, 0, 1
    );

    void main() {
        vec4 pix = vec4(
            texture(yTexture, vTexCoord).r,
            texture(uTexture, vTexCoord).r,
            texture(vTexture, vTexCoord).r,
            1.0
        ) * YUV2RGB;
        pix.a = (vec4(
            texture(alphaYTexture, vTexCoord).r,
            0.5019607843137255,
            0.5019607843137255,
            1.0
        ) * YUV2RGB).r;
        FragColor = pix;
    }
"#;

const SAMPLER_NAMES: [&[u8]; 4] = [b"yTexture\0", b"uTexture\0", b"vTexture\0", b"alphaYTexture\0"];

/// Floats per quad vertex: position (vec2) and texcoord (vec2).
const VERTEX_COMPONENTS: usize = 4;
const QUAD_VERTICES: usize = 6;

const MAX_QUEUED_ERRORS: usize = 16;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),

    #[error("program linking failed: {0}")]
    ShaderLink(String),

    #[error("framebuffer incomplete: status 0x{0:x}")]
    IncompleteFramebuffer(u32),

    #[error("{plane} plane of {len} bytes is too small for {width}x{height} with stride {stride}")]
    PlaneTooSmall {
        plane: PlaneKind,
        len: usize,
        width: u32,
        height: u32,
        stride: u32,
    },

    #[error("upload of {len} bytes is short, {needed} needed")]
    ShortUpload { len: usize, needed: usize },

    #[error("OpenGL error 0x{0:x}")]
    Gl(u32),
}

/// Column-major orthographic projection mapping pixel space, origin
/// top-left with y down, to clip space.
pub fn projection_matrix(width: f32, height: f32) -> [f32; 16] {
    [
        2.0 / width, 0.0, 0.0, 0.0, //
        0.0, -2.0 / height, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0, 1.0,
    ]
}

/// Two triangles covering `(0, 0)..(width, height)` with texcoords
/// `(0, 0)..(1, 1)`, interleaved as `x, y, u, v`.
pub fn quad_vertices(width: f32, height: f32) -> [f32; QUAD_VERTICES * VERTEX_COMPONENTS] {
    [
        0.0, 0.0, 0.0, 0.0, //
        width, 0.0, 1.0, 0.0, //
        width, height, 1.0, 1.0, //
        width, height, 1.0, 1.0, //
        0.0, height, 0.0, 1.0, //
        0.0, 0.0, 0.0, 0.0,
    ]
}

/// Pixel storage of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFormat {
    /// One 8-bit channel, sampled as `.r`.
    R8,
    Rgba8,
}

impl ChannelFormat {
    fn internal_format(self) -> i32 {
        match self {
            Self::R8 => gl::R8 as i32,
            Self::Rgba8 => gl::RGBA8 as i32,
        }
    }

    fn format(self) -> u32 {
        match self {
            Self::R8 => gl::RED,
            Self::Rgba8 => gl::RGBA,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::R8 => 1,
            Self::Rgba8 => 4,
        }
    }
}

/// Bytes a `width`x`height` upload with `row_stride` pixels per row reads.
pub fn required_len(width: u32, height: u32, row_stride: u32, bytes_per_pixel: usize) -> usize {
    if width == 0 || height == 0 {
        return 0;
    }
    ((height as usize - 1) * row_stride as usize + width as usize) * bytes_per_pixel
}

/// 2D texture with nearest filtering and edge clamping.
pub struct Texture {
    id: u32,
    format: ChannelFormat,
    size: (u32, u32),
}

impl Texture {
    pub fn new(format: ChannelFormat) -> Self {
        let mut id = 0;
        unsafe {
            gl::GenTextures(1, &mut id);
            gl::BindTexture(gl::TEXTURE_2D, id);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::NEAREST as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::NEAREST as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        Self { id, format, size: (0, 0) }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Upload `width`x`height` pixels read from `data` rows of
    /// `row_stride` pixels. Padding past `width` in each row is skipped.
    pub fn fill(&mut self, data: &[u8], width: u32, height: u32, row_stride: u32) -> Result<(), RenderError> {
        let needed = required_len(width, height, row_stride, self.format.bytes_per_pixel());
        if data.len() < needed {
            return Err(RenderError::ShortUpload {
                len: data.len(),
                needed,
            });
        }

        unsafe {
            gl::BindTexture(gl::TEXTURE_2D, self.id);
            gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
            gl::PixelStorei(gl::UNPACK_ROW_LENGTH, row_stride as i32);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                self.format.internal_format(),
                width as i32,
                height as i32,
                0,
                self.format.format(),
                gl::UNSIGNED_BYTE,
                if needed == 0 { ptr::null() } else { data.as_ptr() as *const _ },
            );
            gl::PixelStorei(gl::UNPACK_ROW_LENGTH, 0);
            gl::PixelStorei(gl::UNPACK_ALIGNMENT, 4);
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }

        self.size = (width, height);
        Ok(())
    }

    /// Allocate uninitialized storage, for render targets.
    pub fn allocate(&mut self, width: u32, height: u32) {
        unsafe {
            gl::BindTexture(gl::TEXTURE_2D, self.id);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                self.format.internal_format(),
                width as i32,
                height as i32,
                0,
                self.format.format(),
                gl::UNSIGNED_BYTE,
                ptr::null(),
            );
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        self.size = (width, height);
    }

    fn fill_plane(&mut self, kind: PlaneKind, plane: &Plane<'_>) -> Result<(), RenderError> {
        let (data, width, height, stride) = upload_source(plane);
        self.fill(data, width, height, stride)
            .map_err(|_| RenderError::PlaneTooSmall {
                plane: kind,
                len: plane.data.len(),
                width: plane.width,
                height: plane.height,
                stride: plane.stride,
            })
    }
}

const NEUTRAL_TEXEL: [u8; 1] = [NEUTRAL_SAMPLE];

/// Pixels to upload for `plane` as `(data, width, height, stride)`.
///
/// A plane with no texels (chroma of a 1-pixel-wide or -tall frame) is
/// replaced by one neutral texel so it samples like the CPU path.
fn upload_source<'a>(plane: &Plane<'a>) -> (&'a [u8], u32, u32, u32) {
    if plane.width == 0 || plane.height == 0 {
        (&NEUTRAL_TEXEL, 1, 1, 1)
    } else {
        (plane.data, plane.width, plane.height, plane.stride)
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteTextures(1, &self.id);
        }
    }
}

/// Linked YUVA program with its quad geometry.
pub struct SurfaceShader {
    program: u32,
    vao: u32,
    vbo: u32,
    projection_loc: i32,
    sampler_locs: [i32; 4],
}

impl SurfaceShader {
    pub fn new() -> Result<Self, RenderError> {
        unsafe {
            let vs = Self::compile_shader(YUVA_VERTEX_SHADER, gl::VERTEX_SHADER)?;
            let fs = match Self::compile_shader(YUVA_FRAGMENT_SHADER, gl::FRAGMENT_SHADER) {
                Ok(fs) => fs,
                Err(e) => {
                    gl::DeleteShader(vs);
                    return Err(e);
                }
            };
            let linked = Self::link_program(vs, fs);
            gl::DeleteShader(vs);
            gl::DeleteShader(fs);
            let program = linked?;

            let projection_loc = gl::GetUniformLocation(program, b"uProjection\0".as_ptr() as *const _);
            let sampler_locs = SAMPLER_NAMES.map(|name| gl::GetUniformLocation(program, name.as_ptr() as *const _));

            // Vertex attributes: position (vec2) and texcoord (vec2)
            let stride = (VERTEX_COMPONENTS * std::mem::size_of::<f32>()) as i32;
            let mut vao = 0;
            let mut vbo = 0;
            gl::GenVertexArrays(1, &mut vao);
            gl::GenBuffers(1, &mut vbo);

            gl::BindVertexArray(vao);
            gl::BindBuffer(gl::ARRAY_BUFFER, vbo);
            gl::VertexAttribPointer(0, 2, gl::FLOAT, gl::FALSE, stride, ptr::null());
            gl::EnableVertexAttribArray(0);
            gl::VertexAttribPointer(1, 2, gl::FLOAT, gl::FALSE, stride, (2 * std::mem::size_of::<f32>()) as *const _);
            gl::EnableVertexAttribArray(1);
            gl::BindVertexArray(0);
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);

            debug!("YUVA shader program {} linked", program);

            Ok(Self {
                program,
                vao,
                vbo,
                projection_loc,
                sampler_locs,
            })
        }
    }

    fn compile_shader(source: &str, shader_type: u32) -> Result<u32, RenderError> {
        let c_str = CString::new(source).map_err(|e| RenderError::ShaderCompile(e.to_string()))?;
        unsafe {
            let shader = gl::CreateShader(shader_type);
            gl::ShaderSource(shader, 1, &c_str.as_ptr(), ptr::null());
            gl::CompileShader(shader);

            let mut success = 0;
            gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut success);
            if success == 0 {
                let mut len = 0;
                gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
                let mut buffer = vec![0u8; len.max(0) as usize];
                gl::GetShaderInfoLog(shader, len, ptr::null_mut(), buffer.as_mut_ptr() as *mut _);
                let error = String::from_utf8_lossy(&buffer).trim_end_matches('\0').to_string();
                gl::DeleteShader(shader);
                return Err(RenderError::ShaderCompile(error));
            }

            Ok(shader)
        }
    }

    fn link_program(vs: u32, fs: u32) -> Result<u32, RenderError> {
        unsafe {
            let program = gl::CreateProgram();
            gl::AttachShader(program, vs);
            gl::AttachShader(program, fs);
            gl::LinkProgram(program);

            let mut success = 0;
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut success);
            if success == 0 {
                let mut len = 0;
                gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
                let mut buffer = vec![0u8; len.max(0) as usize];
                gl::GetProgramInfoLog(program, len, ptr::null_mut(), buffer.as_mut_ptr() as *mut _);
                let error = String::from_utf8_lossy(&buffer).trim_end_matches('\0').to_string();
                gl::DeleteProgram(program);
                return Err(RenderError::ShaderLink(error));
            }

            Ok(program)
        }
    }

    /// Draw the four planes as a `width`x`height` quad into the currently
    /// bound framebuffer. Texture units 0-3 carry Y, U, V and alpha-Y.
    pub fn draw(&self, textures: [&Texture; 4], width: u32, height: u32) {
        let (w, h) = (width as f32, height as f32);
        let projection = projection_matrix(w, h);
        let vertices = quad_vertices(w, h);
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);

        unsafe {
            gl::UseProgram(self.program);
            gl::UniformMatrix4fv(self.projection_loc, 1, gl::FALSE, projection.as_ptr());

            for (unit, (texture, loc)) in textures.iter().zip(self.sampler_locs).enumerate() {
                gl::ActiveTexture(gl::TEXTURE0 + unit as u32);
                gl::BindTexture(gl::TEXTURE_2D, texture.id());
                gl::Uniform1i(loc, unit as i32);
            }

            gl::BindVertexArray(self.vao);
            gl::BindBuffer(gl::ARRAY_BUFFER, self.vbo);
            gl::BufferData(
                gl::ARRAY_BUFFER,
                bytes.len() as isize,
                bytes.as_ptr() as *const _,
                gl::DYNAMIC_DRAW,
            );

            gl::DrawArrays(gl::TRIANGLES, 0, QUAD_VERTICES as i32);

            gl::BindVertexArray(0);
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
            for unit in (0..textures.len()).rev() {
                gl::ActiveTexture(gl::TEXTURE0 + unit as u32);
                gl::BindTexture(gl::TEXTURE_2D, 0);
            }
            gl::UseProgram(0);
        }
        trace!("Drew {}x{} YUVA quad", width, height);
    }
}

impl Drop for SurfaceShader {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteBuffers(1, &self.vbo);
            gl::DeleteVertexArrays(1, &self.vao);
            gl::DeleteProgram(self.program);
        }
    }
}

/// The four plane textures of one surface.
pub struct ViewState {
    pub y: Texture,
    pub u: Texture,
    pub v: Texture,
    pub alpha_y: Texture,
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            y: Texture::new(ChannelFormat::R8),
            u: Texture::new(ChannelFormat::R8),
            v: Texture::new(ChannelFormat::R8),
            alpha_y: Texture::new(ChannelFormat::R8),
        }
    }

    /// Replace all four textures with the planes of a new frame.
    pub fn upload(&mut self, planes: &YuvaPlanes<'_>) -> Result<(), RenderError> {
        self.y.fill_plane(PlaneKind::Y, &planes.y)?;
        self.u.fill_plane(PlaneKind::U, &planes.u)?;
        self.v.fill_plane(PlaneKind::V, &planes.v)?;
        self.alpha_y.fill_plane(PlaneKind::AlphaY, &planes.alpha_y)?;
        Ok(())
    }

    fn textures(&self) -> [&Texture; 4] {
        [&self.y, &self.u, &self.v, &self.alpha_y]
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

/// RGBA8 framebuffer object a surface is composited into.
pub struct RenderTarget {
    fbo: u32,
    texture: Texture,
}

impl RenderTarget {
    pub fn new() -> Self {
        let mut fbo = 0;
        unsafe {
            gl::GenFramebuffers(1, &mut fbo);
        }
        Self {
            fbo,
            texture: Texture::new(ChannelFormat::Rgba8),
        }
    }

    pub fn width(&self) -> u32 {
        self.texture.size().0
    }

    pub fn height(&self) -> u32 {
        self.texture.size().1
    }

    /// Bind for drawing, reallocating storage on a size change.
    fn bind(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, self.fbo);
        }

        if self.texture.size() != (width, height) {
            debug!("Resizing render target {} to {}x{}", self.fbo, width, height);
            self.texture.allocate(width, height);
            unsafe {
                gl::FramebufferTexture2D(
                    gl::FRAMEBUFFER,
                    gl::COLOR_ATTACHMENT0,
                    gl::TEXTURE_2D,
                    self.texture.id(),
                    0,
                );
            }
        }

        let status = unsafe { gl::CheckFramebufferStatus(gl::FRAMEBUFFER) };
        if status != gl::FRAMEBUFFER_COMPLETE {
            unsafe {
                gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
            }
            return Err(RenderError::IncompleteFramebuffer(status));
        }

        unsafe {
            gl::Viewport(0, 0, width as i32, height as i32);
        }
        Ok(())
    }

    /// Read the target back as tightly packed top-down RGBA8 rows.
    pub fn read_rgba(&self) -> Vec<u8> {
        let (width, height) = self.texture.size();
        let row = width as usize * 4;
        let mut pixels = vec![0u8; row * height as usize];
        if pixels.is_empty() {
            return pixels;
        }

        unsafe {
            gl::BindFramebuffer(gl::READ_FRAMEBUFFER, self.fbo);
            gl::PixelStorei(gl::PACK_ALIGNMENT, 1);
            gl::ReadPixels(
                0,
                0,
                width as i32,
                height as i32,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                pixels.as_mut_ptr() as *mut _,
            );
            gl::PixelStorei(gl::PACK_ALIGNMENT, 4);
            gl::BindFramebuffer(gl::READ_FRAMEBUFFER, 0);
        }

        // GL rows start at the bottom.
        flip_rows(&mut pixels, row);
        pixels
    }
}

impl Default for RenderTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteFramebuffers(1, &self.fbo);
        }
    }
}

/// Reverse the order of `row`-byte rows in place.
pub fn flip_rows(pixels: &mut [u8], row: usize) {
    if row == 0 {
        return;
    }
    let rows = pixels.len() / row;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (head, tail) = pixels.split_at_mut(bottom * row);
        head[top * row..(top + 1) * row].swap_with_slice(&mut tail[..row]);
    }
}

/// One surface: shader, plane textures and output target.
pub struct YuvaRenderer {
    shader: SurfaceShader,
    view: ViewState,
    target: RenderTarget,
    clear_color: [f32; 4],
}

impl YuvaRenderer {
    pub fn new(clear_color: [f32; 4]) -> Result<Self, RenderError> {
        let shader = SurfaceShader::new()?;
        info!("YUVA renderer initialized");
        Ok(Self {
            shader,
            view: ViewState::new(),
            target: RenderTarget::new(),
            clear_color,
        })
    }

    /// Upload the planes of a new frame.
    pub fn upload(&mut self, planes: &YuvaPlanes<'_>) -> Result<(), RenderError> {
        self.view.upload(planes)
    }

    /// Draw the last uploaded planes as a `width`x`height` quad.
    pub fn composite(&mut self, width: u32, height: u32) -> Result<&RenderTarget, RenderError> {
        self.target.bind(width, height)?;

        let [r, g, b, a] = self.clear_color;
        unsafe {
            gl::Disable(gl::BLEND);
            gl::ClearColor(r, g, b, a);
            gl::Clear(gl::COLOR_BUFFER_BIT);
        }

        self.shader.draw(self.view.textures(), width, height);

        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        }

        if let Err(e) = self.status() {
            warn!("Composite of {}x{} surface reported {}", width, height, e);
        }

        Ok(&self.target)
    }

    /// Upload and composite at the frame's visible size.
    pub fn render(&mut self, planes: &YuvaPlanes<'_>) -> Result<&RenderTarget, RenderError> {
        self.upload(planes)?;
        self.composite(planes.layout.width, planes.layout.height)
    }

    /// Drain the GL error queue, reporting the first error seen.
    pub fn status(&self) -> Result<(), RenderError> {
        let mut first = None;
        for _ in 0..MAX_QUEUED_ERRORS {
            let err = unsafe { gl::GetError() };
            if err == gl::NO_ERROR {
                break;
            }
            first.get_or_insert(err);
        }
        first.map_or(Ok(()), |err| Err(RenderError::Gl(err)))
    }
}

impl Drop for YuvaRenderer {
    fn drop(&mut self) {
        debug!("Releasing YUVA renderer resources");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::color::{NEUTRAL_CHROMA, YUV2RGB};

    fn apply(m: &[f32; 16], x: f32, y: f32) -> (f32, f32) {
        // Column-major mat4 times (x, y, 0, 1).
        (m[0] * x + m[4] * y + m[12], m[1] * x + m[5] * y + m[13])
    }

    fn assert_clip(actual: (f32, f32), expected: (f32, f32)) {
        assert!(
            (actual.0 - expected.0).abs() < 1e-5 && (actual.1 - expected.1).abs() < 1e-5,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn test_empty_plane_uploads_neutral_texel() {
        let empty = Plane {
            data: &[],
            width: 0,
            height: 3,
            stride: 0,
        };
        let (data, width, height, stride) = upload_source(&empty);
        assert_eq!(data, &[NEUTRAL_SAMPLE]);
        assert_eq!((width, height, stride), (1, 1, 1));

        let samples = [1u8, 2, 3, 4, 5, 6];
        let plane = Plane {
            data: &samples,
            width: 2,
            height: 2,
            stride: 3,
        };
        assert_eq!(upload_source(&plane), (&samples[..], 2, 2, 3));
    }

    #[test]
    fn test_projection_maps_corners() {
        let m = projection_matrix(300.0, 600.0);
        assert_clip(apply(&m, 0.0, 0.0), (-1.0, 1.0));
        assert_clip(apply(&m, 300.0, 600.0), (1.0, -1.0));
        assert_clip(apply(&m, 150.0, 300.0), (0.0, 0.0));
        assert_clip(apply(&m, 0.0, 600.0), (-1.0, -1.0));
    }

    #[test]
    fn test_quad_covers_surface() {
        let v = quad_vertices(4.0, 2.0);
        let corners: Vec<_> = v.chunks_exact(4).map(|c| (c[0], c[1], c[2], c[3])).collect();
        assert_eq!(corners.len(), QUAD_VERTICES);
        assert_eq!(corners[0], (0.0, 0.0, 0.0, 0.0));
        assert_eq!(corners[2], (4.0, 2.0, 1.0, 1.0));
        assert_eq!(corners[4], (0.0, 2.0, 0.0, 1.0));
        for (x, y, u, v) in corners {
            assert_eq!(x / 4.0, u);
            assert_eq!(y / 2.0, v);
        }
    }

    #[test]
    fn test_quad_vertex_bytes() {
        let v = quad_vertices(1.0, 1.0);
        let bytes: &[u8] = bytemuck::cast_slice(&v);
        assert_eq!(bytes.len(), QUAD_VERTICES * VERTEX_COMPONENTS * 4);
    }

    #[test]
    fn test_required_len_skips_final_padding() {
        assert_eq!(required_len(300, 600, 304, 1), 599 * 304 + 300);
        assert_eq!(required_len(2, 2, 2, 4), 16);
        assert_eq!(required_len(0, 10, 16, 1), 0);
    }

    #[test]
    fn test_flip_rows() {
        let mut pixels = vec![1, 1, 2, 2, 3, 3];
        flip_rows(&mut pixels, 2);
        assert_eq!(pixels, [3, 3, 2, 2, 1, 1]);

        let mut even = vec![1, 2, 3, 4];
        flip_rows(&mut even, 1);
        assert_eq!(even, [4, 3, 2, 1]);
    }

    #[test]
    fn test_shader_matches_cpu_coefficients() {
        let columns = [
            "1.1643828125, 0, 1.59602734375, -0.87078515625",
            "1.1643828125, -0.39176171875, -0.81296875, 0.52959375",
            "1.1643828125, 2.017234375, 0, -1.081390625",
        ];
        for (column, row) in columns.iter().zip(YUV2RGB) {
            assert!(YUVA_FRAGMENT_SHADER.contains(column));
            let parsed: Vec<f64> = column.split(", ").map(|v| v.parse().unwrap()).collect();
            assert_eq!(parsed, row);
        }
        assert!(YUVA_FRAGMENT_SHADER.contains(&NEUTRAL_CHROMA.to_string()));
    }
}
