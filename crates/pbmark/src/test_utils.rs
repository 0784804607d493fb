//! Shared synthetic rasters for unit tests.

use image::{GrayImage, Luma};

/// Fill a convex quadrilateral with `fg` on a `bg` canvas.
///
/// A pixel is inside when it lies on the inner side of all four edges
/// (either winding is accepted).
pub(crate) fn draw_filled_quad(
    w: u32,
    h: u32,
    corners: &[[f64; 2]; 4],
    fg: u8,
    bg: u8,
) -> GrayImage {
    let side = |a: [f64; 2], b: [f64; 2], p: [f64; 2]| {
        (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
    };
    GrayImage::from_fn(w, h, |x, y| {
        let p = [x as f64, y as f64];
        let s: Vec<f64> = (0..4)
            .map(|i| side(corners[i], corners[(i + 1) % 4], p))
            .collect();
        let inside = s.iter().all(|&v| v >= 0.0) || s.iter().all(|&v| v <= 0.0);
        Luma([if inside { fg } else { bg }])
    })
}

/// One cosine grating with an integer wave vector (cycles per raster).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Grating {
    pub kx: i32,
    pub ky: i32,
    pub amplitude: f64,
}

impl Grating {
    pub(crate) fn new(kx: i32, ky: i32, amplitude: f64) -> Self {
        Self { kx, ky, amplitude }
    }
}

/// Square raster `127.5 + Σ a·cos(2π(kx·x + ky·y) / size)`, clamped to u8.
///
/// Integer wave vectors are exactly periodic on the raster, so each grating
/// lands on a single spectral bin pair.
pub(crate) fn render_gratings(size: u32, gratings: &[Grating]) -> GrayImage {
    let n = size as f64;
    GrayImage::from_fn(size, size, |x, y| {
        let mut v = 127.5;
        for g in gratings {
            let phase =
                2.0 * std::f64::consts::PI * (g.kx as f64 * x as f64 + g.ky as f64 * y as f64) / n;
            v += g.amplitude * phase.cos();
        }
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

/// Paste `pattern` at `origin` inside a bordered frame.
///
/// The pattern is surrounded by a dark margin of `border` pixels so the
/// localizer sees a clean outline against the `bg` canvas.
pub(crate) fn embed_pattern(
    pattern: &GrayImage,
    frame_w: u32,
    frame_h: u32,
    origin: (u32, u32),
    border: u32,
    bg: u8,
) -> GrayImage {
    let (pw, ph) = pattern.dimensions();
    let (ox, oy) = origin;
    GrayImage::from_fn(frame_w, frame_h, |x, y| {
        let in_outer = x + border >= ox
            && y + border >= oy
            && x < ox + pw + border
            && y < oy + ph + border;
        if !in_outer {
            return Luma([bg]);
        }
        if x >= ox && y >= oy && x < ox + pw && y < oy + ph {
            *pattern.get_pixel(x - ox, y - oy)
        } else {
            Luma([0])
        }
    })
}
