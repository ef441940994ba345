// GPU compositing against the CPU reference.
//
// Needs an X server with GLX 1.3 (`DISPLAY`); run with `--ignored`.

use skylight::compositor::color::composite_cpu;
use skylight::compositor::planes::YuvaPlanes;
use skylight::compositor::{Compositor, Presented};
use skylight::config::RendererConfig;
use skylight::proto::{self, Fragment};

/// 8x6 frame with a horizontal luma ramp, four chroma blocks and an
/// alpha ramp down the rows, each plane in its own fragment.
fn test_frame(alignment: u32) -> Vec<u8> {
    let (width, height) = (8usize, 6usize);
    let stride = width.div_ceil(alignment as usize) * alignment as usize;
    let rows = height.div_ceil(alignment as usize) * alignment as usize;

    let mut y = vec![0u8; stride * rows];
    let mut alpha = vec![0u8; stride * rows];
    for row in 0..height {
        for col in 0..width {
            y[row * stride + col] = 16 + (col * 27) as u8;
            alpha[row * stride + col] = 16 + (row * 43) as u8;
        }
    }

    let chroma_stride = stride / 2;
    let chroma_len = (stride * rows) >> 2;
    let mut u = vec![128u8; chroma_len];
    let mut v = vec![128u8; chroma_len];
    for row in 0..height / 2 {
        for col in 0..width / 2 {
            u[row * chroma_stride + col] = if col < 2 { 90 } else { 200 };
            v[row * chroma_stride + col] = if row < 1 { 240 } else { 60 };
        }
    }

    let fragments = [
        Fragment::new(&y),
        Fragment::new(&u),
        Fragment::new(&v),
        Fragment::new(&alpha),
    ];
    proto::encode(42, 1, width as u16, height as u16, &fragments).unwrap()
}

fn assert_matches_cpu(alignment: u32) {
    let bytes = test_frame(alignment);
    let frame = proto::decode(&bytes).unwrap();
    let planes = YuvaPlanes::split(&frame, alignment).unwrap();
    let expected = composite_cpu(&planes);

    let config = RendererConfig {
        plane_alignment: alignment,
        ..RendererConfig::default()
    };
    let mut compositor = Compositor::new(&config).unwrap();
    let actual = match compositor.present(1, &frame).unwrap() {
        Presented::Frame(target) => {
            assert_eq!((target.width(), target.height()), (8, 6));
            target.read_rgba()
        }
        Presented::Stale { .. } => panic!("first frame reported stale"),
    };

    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(&expected).enumerate() {
        assert!(
            a.abs_diff(*e) <= 2,
            "pixel {} channel {}: gpu {} cpu {}",
            i / 4,
            i % 4,
            a,
            e
        );
    }
}

#[test]
#[ignore = "requires a GLX display"]
fn test_gpu_matches_cpu_unpadded() {
    assert_matches_cpu(1);
}

#[test]
#[ignore = "requires a GLX display"]
fn test_gpu_matches_cpu_padded() {
    assert_matches_cpu(16);
}

#[test]
#[ignore = "requires a GLX display"]
fn test_single_column_frame_matches_cpu() {
    // 1x4: chroma planes have no visible texels.
    let y = [16u8, 100, 180, 235];
    let alpha = [235u8; 4];
    let fragments = [
        Fragment::new(&y),
        Fragment::new(&[200]),
        Fragment::new(&[60]),
        Fragment::new(&alpha),
    ];
    let bytes = proto::encode(1, 1, 1, 4, &fragments).unwrap();
    let frame = proto::decode(&bytes).unwrap();
    let planes = YuvaPlanes::split(&frame, 1).unwrap();
    let expected = composite_cpu(&planes);

    let mut compositor = Compositor::new(&RendererConfig::default()).unwrap();
    let Presented::Frame(target) = compositor.present(1, &frame).unwrap() else {
        panic!("first frame reported stale");
    };
    let actual = target.read_rgba();
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(&expected) {
        assert!(a.abs_diff(*e) <= 2, "gpu {a} cpu {e}");
    }
}

#[test]
#[ignore = "requires a GLX display"]
fn test_stale_frame_is_dropped() {
    let newer = proto::encode(10, 1, 2, 2, &[Fragment::new(&[0u8; 10])]).unwrap();
    let older = proto::encode(9, 1, 2, 2, &[Fragment::new(&[0u8; 10])]).unwrap();

    let mut compositor = Compositor::new(&RendererConfig::default()).unwrap();
    assert!(matches!(
        compositor.present(5, &proto::decode(&newer).unwrap()).unwrap(),
        Presented::Frame(_)
    ));
    assert!(matches!(
        compositor.present(5, &proto::decode(&older).unwrap()).unwrap(),
        Presented::Stale { serial: 9, last: 10 }
    ));
    assert_eq!(compositor.surface_count(), 1);

    compositor.remove_surface(5);
    assert_eq!(compositor.surface_count(), 0);
}
