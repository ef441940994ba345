//! BT.601 limited-range YUV to RGB conversion.
//!
//! The same coefficients drive the GPU fragment shader and the CPU
//! reference compositor, so the two produce matching pixels.

use super::planes::{Plane, YuvaPlanes};

/// 128/255, the normalized value of zero chroma.
pub const NEUTRAL_CHROMA: f64 = 0.501_960_784_313_725_5;

/// `NEUTRAL_CHROMA` as a stored 8-bit sample.
pub const NEUTRAL_SAMPLE: u8 = 128;

/// Rows of the conversion applied to `(Y, U, V, 1)` with samples
/// normalized to `0.0..=1.0`. The fourth column is the constant term.
pub const YUV2RGB: [[f64; 4]; 3] = [
    [1.164_382_812_5, 0.0, 1.596_027_343_75, -0.870_785_156_25],
    [1.164_382_812_5, -0.391_761_718_75, -0.812_968_75, 0.529_593_75],
    [1.164_382_812_5, 2.017_234_375, 0.0, -1.081_390_625],
];

fn normalize(sample: u8) -> f64 {
    f64::from(sample) / 255.0
}

fn to_unorm8(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn apply(row: &[f64; 4], y: f64, u: f64, v: f64) -> f64 {
    row[0] * y + row[1] * u + row[2] * v + row[3]
}

/// Unclamped normalized RGB for one 8-bit YUV sample.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [f64; 3] {
    let (y, u, v) = (normalize(y), normalize(u), normalize(v));
    YUV2RGB.map(|row| apply(&row, y, u, v))
}

/// Unclamped normalized alpha from an alpha-Y sample.
///
/// The alpha plane is coded as luma, so it goes through the red row of the
/// conversion with neutral chroma.
pub fn alpha_from_luma(alpha_y: u8) -> f64 {
    apply(&YUV2RGB[0], normalize(alpha_y), NEUTRAL_CHROMA, NEUTRAL_CHROMA)
}

/// One RGBA8 output pixel. Color is emitted as-is and is expected to be
/// premultiplied by the encoder.
pub fn yuva_to_rgba(y: u8, u: u8, v: u8, alpha_y: u8) -> [u8; 4] {
    let [r, g, b] = yuv_to_rgb(y, u, v);
    [to_unorm8(r), to_unorm8(g), to_unorm8(b), to_unorm8(alpha_from_luma(alpha_y))]
}

/// Nearest-texel index along one axis when a `texels`-wide texture is
/// stretched over `pixels` output pixels, sampled at pixel centers.
fn nearest_texel(pixel: u32, pixels: u32, texels: u32) -> u32 {
    let texel = ((2 * u64::from(pixel) + 1) * u64::from(texels)) / (2 * u64::from(pixels));
    (texel as u32).min(texels.saturating_sub(1))
}

fn sample_stretched(plane: &Plane<'_>, x: u32, y: u32, width: u32, height: u32) -> u8 {
    plane.sample(
        nearest_texel(x, width, plane.width),
        nearest_texel(y, height, plane.height),
    )
}

/// Composite a frame on the CPU into tightly packed top-down RGBA8 rows
/// at the frame's visible size.
///
/// Sampling is nearest-neighbour like the GPU path. Chroma planes of a
/// frame narrower than two pixels have no texels and sample as neutral.
pub fn composite_cpu(planes: &YuvaPlanes<'_>) -> Vec<u8> {
    let width = planes.layout.width;
    let height = planes.layout.height;
    let mut out = Vec::with_capacity(width as usize * height as usize * 4);

    for y in 0..height {
        for x in 0..width {
            let chroma = |plane: &Plane<'_>| {
                if plane.width == 0 || plane.height == 0 {
                    NEUTRAL_SAMPLE
                } else {
                    sample_stretched(plane, x, y, width, height)
                }
            };
            out.extend_from_slice(&yuva_to_rgba(
                planes.y.sample(x, y),
                chroma(&planes.u),
                chroma(&planes.v),
                planes.alpha_y.sample(x, y),
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::planes::PlaneLayout;
    use skylight_proto::Fragment;

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    fn assert_near(actual: &[u8], expected: [u8; 4]) {
        assert!(
            actual.iter().zip(expected).all(|(a, e)| a.abs_diff(e) <= 1),
            "{actual:?} is not within 1 of {expected:?}"
        );
    }

    #[test]
    fn test_limited_range_extremes() {
        assert_near(&yuva_to_rgba(235, 128, 128, 235), WHITE);
        assert_near(&yuva_to_rgba(16, 128, 128, 16), [0, 0, 0, 0]);
    }

    #[test]
    fn test_saturated_red() {
        assert_eq!(yuva_to_rgba(81, 90, 240, 235)[..3], [255, 0, 0]);
    }

    #[test]
    fn test_mid_alpha() {
        let alpha = yuva_to_rgba(16, 128, 128, 126)[3];
        assert!((128..=130).contains(&alpha), "alpha = {alpha}");
    }

    #[test]
    fn test_out_of_range_clamps() {
        assert_eq!(yuva_to_rgba(255, 255, 255, 255)[3], 255);
        assert_eq!(yuva_to_rgba(0, 0, 0, 0), [0, 135, 0, 0]);
    }

    #[test]
    fn test_alpha_row_matches_neutral_luma() {
        for sample in [0u8, 16, 100, 235, 255] {
            let [r, _, _] = yuv_to_rgb(sample, 128, 128);
            assert!((alpha_from_luma(sample) - r).abs() < 1e-12);
        }
    }

    #[test]
    fn test_nearest_texel_halves() {
        assert_eq!((0..4).map(|x| nearest_texel(x, 4, 2)).collect::<Vec<_>>(), [0, 0, 1, 1]);
        assert_eq!((0..5).map(|x| nearest_texel(x, 5, 2)).collect::<Vec<_>>(), [0, 0, 1, 1, 1]);
        assert_eq!(nearest_texel(3, 4, 4), 3);
    }

    #[test]
    fn test_composite_cpu_quadrants() {
        // 4x4 frame: left half red, right half white, bottom row transparent.
        let y = [
            81, 81, 235, 235, //
            81, 81, 235, 235, //
            81, 81, 235, 235, //
            81, 81, 235, 235,
        ];
        let u = [90, 128, 90, 128];
        let v = [240, 128, 240, 128];
        let alpha = [
            235, 235, 235, 235, //
            235, 235, 235, 235, //
            235, 235, 235, 235, //
            16, 16, 16, 16,
        ];
        let fragments = [
            Fragment::new(&y),
            Fragment::new(&u),
            Fragment::new(&v),
            Fragment::new(&alpha),
        ];
        let planes = YuvaPlanes::from_fragments(&fragments, PlaneLayout::new(4, 4, 1)).unwrap();

        let rgba = composite_cpu(&planes);
        assert_eq!(rgba.len(), 4 * 4 * 4);

        let pixel = |x: usize, y: usize| &rgba[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(pixel(0, 0), &[255, 0, 0, 255]);
        assert_eq!(pixel(1, 2), &[255, 0, 0, 255]);
        assert_near(pixel(3, 0), WHITE);
        assert_near(pixel(2, 2), WHITE);
        assert!(pixel(1, 3)[3] <= 1);
        assert!(pixel(2, 3)[3] <= 1);
    }

    #[test]
    fn test_composite_cpu_padded_planes() {
        // 2x2 visible inside 4x4 coded planes; padding must never be read.
        let layout = PlaneLayout::new(2, 2, 4);
        let mut y = vec![0u8; layout.luma_size()];
        for row in 0..2 {
            y[row * 4..row * 4 + 2].copy_from_slice(&[235, 235]);
        }
        let chroma = vec![128u8; layout.chroma_size()];
        let alpha = y.clone();
        let fragments = [
            Fragment::new(&y),
            Fragment::new(&chroma),
            Fragment::new(&chroma),
            Fragment::new(&alpha),
        ];
        let planes = YuvaPlanes::from_fragments(&fragments, layout).unwrap();

        let rgba = composite_cpu(&planes);
        assert_eq!(rgba.len(), 16);
        for pixel in rgba.chunks_exact(4) {
            assert_near(pixel, WHITE);
        }
    }
}
