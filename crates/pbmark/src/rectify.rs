//! Perspective rectification of the marker quad into a canonical square.

use image::{GrayImage, Luma};

use crate::homography::{estimate_homography_dlt, project, reprojection_error};
use crate::localize::Quad;

/// Warp the region bounded by `quad` to a `size × size` raster.
///
/// Canonical corners `(0,0), (S-1,0), (S-1,S-1), (0,S-1)` map to the quad's
/// TL, TR, BR, BL corners. Output pixels that fall outside the frame are 0.
/// Returns `None` for a degenerate quad.
pub fn rectify(frame: &GrayImage, quad: &Quad, size: u32) -> Option<GrayImage> {
    if size < 2 || quad.area() < 1.0 {
        return None;
    }
    let s = (size - 1) as f64;
    let canonical = [[0.0, 0.0], [s, 0.0], [s, s], [0.0, s]];

    let h = match estimate_homography_dlt(&canonical, &quad.corners) {
        Ok(h) => h,
        Err(err) => {
            tracing::debug!("rectify: homography failed: {}", err);
            return None;
        }
    };
    let worst = canonical
        .iter()
        .zip(quad.corners.iter())
        .map(|(src, dst)| reprojection_error(&h, src, dst))
        .fold(0.0, f64::max);
    if !(worst < 1e-3 * s.max(1.0)) {
        tracing::debug!("rectify: corner reprojection error {:.3e}", worst);
        return None;
    }

    Some(GrayImage::from_fn(size, size, |u, v| {
        let [x, y] = project(&h, u as f64, v as f64);
        let value = bilinear_sample(frame, x, y).unwrap_or(0.0);
        Luma([value.round().clamp(0.0, 255.0) as u8])
    }))
}

/// Bilinear intensity in `[0, 255]`, or `None` outside the frame.
///
/// The last row/column is reachable: neighbours past the border are clamped.
#[inline]
fn bilinear_sample(img: &GrayImage, x: f64, y: f64) -> Option<f64> {
    let (w, h) = img.dimensions();
    if !x.is_finite() || !y.is_finite() || w == 0 || h == 0 {
        return None;
    }
    if x < 0.0 || y < 0.0 || x > (w - 1) as f64 || y > (h - 1) as f64 {
        return None;
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p = |px: u32, py: u32| img.get_pixel(px, py)[0] as f64;
    Some(
        (1.0 - fx) * (1.0 - fy) * p(x0, y0)
            + fx * (1.0 - fy) * p(x1, y0)
            + (1.0 - fx) * fy * p(x0, y1)
            + fx * fy * p(x1, y1),
    )
}
