//! Geometric localizer: finds the square marker outline in a frame.
//!
//! Blur → Canny edges → dilation → external contours → Douglas–Peucker
//! polygon approximation. Survivors must be convex quadrilaterals with a
//! near-square bounding box and an area inside a fraction-of-frame band; the
//! largest one wins.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

/// Configuration for marker localization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LocalizerConfig {
    /// Gaussian pre-blur sigma (pixels).
    pub blur_sigma: f32,
    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
    /// Dilation radius (L∞, pixels) used to close small gaps in the edge map.
    pub dilate_radius: u8,
    /// Minimum contour area as a fraction of the frame area.
    pub min_area_ratio: f64,
    /// Maximum contour area as a fraction of the frame area.
    pub max_area_ratio: f64,
    /// Douglas–Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_frac: f64,
    /// Maximum allowed `|w/h - 1|` of the quad's bounding box.
    pub aspect_tolerance: f64,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_radius: 1,
            min_area_ratio: 0.05,
            max_area_ratio: 0.9,
            approx_epsilon_frac: 0.02,
            aspect_tolerance: 0.3,
        }
    }
}

/// Marker outline with corners in canonical order: TL, TR, BR, BL.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Quad {
    pub corners: [[f64; 2]; 4],
}

impl Quad {
    /// Canonicalize an unordered 4-point set.
    ///
    /// Uses coordinate sum/difference extremes (min x+y = TL, max x+y = BR,
    /// min y−x = TR, max y−x = BL), so the result does not depend on the
    /// input winding or starting corner. When an extreme is shared by two
    /// points (a quad rotated by exactly 45°), corners are taken clockwise
    /// around the centroid starting from the smallest x+y, upper point first.
    /// Returns `None` for repeated points.
    pub fn from_unordered(points: [[f64; 2]; 4]) -> Option<Self> {
        let sum = |p: &[f64; 2]| p[0] + p[1];
        let diff = |p: &[f64; 2]| p[1] - p[0];

        let extremes = [
            arg_extreme(&points, sum, false),
            arg_extreme(&points, diff, false),
            arg_extreme(&points, sum, true),
            arg_extreme(&points, diff, true),
        ];
        let idx = match extremes {
            [Some(tl), Some(tr), Some(br), Some(bl)] if distinct(&[tl, tr, br, bl]) => {
                [tl, tr, br, bl]
            }
            _ => clockwise_from_top_left(&points)?,
        };
        Some(Self {
            corners: idx.map(|i| points[i]),
        })
    }

    /// Polygon area (shoelace), in square pixels.
    pub fn area(&self) -> f64 {
        polygon_area(&self.corners)
    }

    /// True when all turns have the same orientation.
    pub fn is_convex(&self) -> bool {
        is_convex(&self.corners)
    }

    /// Axis-aligned bounding box `[w, h]` (inclusive pixel extent).
    pub fn bbox_size(&self) -> [f64; 2] {
        bbox_size(&self.corners)
    }
}

/// First index attaining the min (or max) of `key` over `points`.
/// Index of the unique extreme of `key`, or `None` when two points share it.
fn arg_extreme<F>(points: &[[f64; 2]; 4], key: F, max: bool) -> Option<usize>
where
    F: Fn(&[f64; 2]) -> f64,
{
    let values = points.map(|p| key(&p));
    let mut best = 0;
    for i in 1..4 {
        let better = if max {
            values[i] > values[best]
        } else {
            values[i] < values[best]
        };
        if better {
            best = i;
        }
    }
    let shared = (0..4).any(|i| i != best && values[i] == values[best]);
    (!shared).then_some(best)
}

fn distinct(idx: &[usize; 4]) -> bool {
    (0..4).all(|i| ((i + 1)..4).all(|j| idx[i] != idx[j]))
}

/// Clockwise (in image coordinates) order around the centroid, rotated so
/// that the point with the smallest x+y comes first; ties go to smaller y.
fn clockwise_from_top_left(points: &[[f64; 2]; 4]) -> Option<[usize; 4]> {
    let cx = points.iter().map(|p| p[0]).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p[1]).sum::<f64>() / 4.0;
    let angle = |i: usize| (points[i][1] - cy).atan2(points[i][0] - cx);

    let mut order = [0usize, 1, 2, 3];
    order.sort_by(|&a, &b| angle(a).total_cmp(&angle(b)));
    if (0..4).any(|k| angle(order[k]) == angle(order[(k + 1) % 4])) {
        return None;
    }

    let rank = |i: usize| (points[i][0] + points[i][1], points[i][1]);
    let start = (0..4).min_by(|&a, &b| {
        let (sa, ya) = rank(order[a]);
        let (sb, yb) = rank(order[b]);
        sa.total_cmp(&sb).then(ya.total_cmp(&yb))
    })?;
    order.rotate_left(start);
    Some(order)
}

pub(crate) fn polygon_area(pts: &[[f64; 2]]) -> f64 {
    if pts.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..pts.len() {
        let a = pts[i];
        let b = pts[(i + 1) % pts.len()];
        acc += a[0] * b[1] - b[0] * a[1];
    }
    0.5 * acc.abs()
}

fn is_convex(pts: &[[f64; 2]]) -> bool {
    let n = pts.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f64;
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        let c = pts[(i + 2) % n];
        let cross = (b[0] - a[0]) * (c[1] - b[1]) - (b[1] - a[1]) * (c[0] - b[0]);
        if cross.abs() < 1e-12 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

fn bbox_size(pts: &[[f64; 2]]) -> [f64; 2] {
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for p in pts {
        for k in 0..2 {
            min[k] = min[k].min(p[k]);
            max[k] = max[k].max(p[k]);
        }
    }
    [max[0] - min[0] + 1.0, max[1] - min[1] + 1.0]
}

/// Remove vertices closer than `eps` to the chord joining their neighbours.
fn drop_collinear(mut pts: Vec<[f64; 2]>, eps: f64) -> Vec<[f64; 2]> {
    let mut i = 0;
    while pts.len() > 3 && i < pts.len() {
        let n = pts.len();
        let a = pts[(i + n - 1) % n];
        let b = pts[i];
        let c = pts[(i + 1) % n];
        let chord = ((c[0] - a[0]).powi(2) + (c[1] - a[1]).powi(2)).sqrt();
        let dist = if chord > 1e-12 {
            ((c[0] - a[0]) * (a[1] - b[1]) - (a[0] - b[0]) * (c[1] - a[1])).abs() / chord
        } else {
            0.0
        };
        if dist < eps {
            pts.remove(i);
        } else {
            i += 1;
        }
    }
    pts
}

fn to_f64(points: &[Point<i32>]) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p.x as f64, p.y as f64]).collect()
}

/// Locate the marker quadrilateral in a grayscale frame.
pub fn find_roi(frame: &GrayImage, config: &LocalizerConfig) -> Option<Quad> {
    let (w, h) = frame.dimensions();
    if w < 8 || h < 8 {
        return None;
    }

    let blurred = imageproc::filter::gaussian_blur_f32(frame, config.blur_sigma);
    let edges = imageproc::edges::canny(&blurred, config.canny_low, config.canny_high);
    let edges = if config.dilate_radius > 0 {
        imageproc::morphology::dilate(&edges, Norm::LInf, config.dilate_radius)
    } else {
        edges
    };

    let frame_area = w as f64 * h as f64;
    let min_area = frame_area * config.min_area_ratio;
    let max_area = frame_area * config.max_area_ratio;

    let mut best: Option<(f64, Quad)> = None;
    let contours = find_contours::<i32>(&edges);
    let n_contours = contours.len();

    for contour in contours {
        if contour.parent.is_some() || !matches!(contour.border_type, BorderType::Outer) {
            continue;
        }
        let area = polygon_area(&to_f64(&contour.points));
        if area < min_area || area > max_area {
            continue;
        }

        let perimeter = arc_length(&contour.points, true);
        let epsilon = config.approx_epsilon_frac * perimeter;
        let mut approx = approximate_polygon_dp(&contour.points, epsilon, true);
        if approx.len() > 1 && approx.first() == approx.last() {
            approx.pop();
        }
        // The trace start point is always kept by DP; drop it when it sits on an edge.
        let pts = drop_collinear(to_f64(&approx), epsilon);
        if pts.len() != 4 {
            continue;
        }

        if !is_convex(&pts) {
            continue;
        }
        let [bw, bh] = bbox_size(&pts);
        if ((bw / bh) - 1.0).abs() >= config.aspect_tolerance {
            continue;
        }

        let Some(quad) = Quad::from_unordered([pts[0], pts[1], pts[2], pts[3]]) else {
            continue;
        };
        if best.as_ref().map_or(true, |(best_area, _)| area > *best_area) {
            best = Some((area, quad));
        }
    }

    tracing::debug!("localizer: {} contours, roi={}", n_contours, best.is_some());
    best.map(|(_, quad)| quad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_filled_quad;

    const SKEWED: [[f64; 2]; 4] = [[42.0, 31.0], [205.0, 48.0], [191.0, 214.0], [36.0, 196.0]];

    #[test]
    fn canonical_order_from_any_cyclic_relabeling() {
        let expected = Quad::from_unordered(SKEWED).unwrap();
        assert_eq!(expected.corners, SKEWED);
        for shift in 0..4 {
            let mut pts = SKEWED;
            pts.rotate_left(shift);
            assert_eq!(Quad::from_unordered(pts).unwrap(), expected, "shift {shift}");
            pts.reverse();
            assert_eq!(Quad::from_unordered(pts).unwrap(), expected, "reversed {shift}");
        }
    }

    #[test]
    fn exact_diamond_orders_deterministically() {
        let top = [50.0, 0.0];
        let right = [100.0, 50.0];
        let bottom = [50.0, 100.0];
        let left = [0.0, 50.0];
        let expected = [top, right, bottom, left];
        for shift in 0..4 {
            let mut pts = expected;
            pts.rotate_left(shift);
            let quad = Quad::from_unordered(pts).expect("diamond is a valid quad");
            assert_eq!(quad.corners, expected, "shift {shift}");
            pts.reverse();
            assert_eq!(Quad::from_unordered(pts).unwrap().corners, expected, "reversed {shift}");
        }
        let quad = Quad::from_unordered(expected).unwrap();
        assert!(quad.is_convex());
        assert!((quad.area() - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn repeated_corner_is_rejected() {
        let pts = [[0.0, 0.0], [10.0, 0.0], [10.0, 0.0], [0.0, 10.0]];
        assert!(Quad::from_unordered(pts).is_none());
    }

    #[test]
    fn quad_area_and_convexity() {
        let sq =
            Quad::from_unordered([[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]).unwrap();
        assert!((sq.area() - 100.0).abs() < 1e-12);
        assert!(sq.is_convex());
        assert_eq!(sq.bbox_size(), [11.0, 11.0]);

        let dart = [[0.0, 0.0], [10.0, 0.0], [3.0, 3.0], [0.0, 10.0]];
        assert!(!is_convex(&dart));
    }

    #[test]
    fn finds_bright_square_on_dark_background() {
        let expected = [[100.0, 50.0], [260.0, 56.0], [256.0, 200.0], [96.0, 196.0]];
        let img = draw_filled_quad(320, 240, &expected, 230, 20);
        let quad = find_roi(&img, &LocalizerConfig::default()).expect("roi");
        for (c, e) in quad.corners.iter().zip(expected.iter()) {
            assert!(
                (c[0] - e[0]).abs() < 6.0 && (c[1] - e[1]).abs() < 6.0,
                "corner {:?} too far from {:?}",
                c,
                e
            );
        }
    }

    #[test]
    fn blank_frame_has_no_roi() {
        let img = GrayImage::from_pixel(200, 200, image::Luma([128]));
        assert!(find_roi(&img, &LocalizerConfig::default()).is_none());
    }

    #[test]
    fn tiny_square_is_rejected_by_area_band() {
        let corners = [[150.0, 110.0], [165.0, 110.0], [165.0, 125.0], [150.0, 125.0]];
        let img = draw_filled_quad(320, 240, &corners, 230, 20);
        assert!(find_roi(&img, &LocalizerConfig::default()).is_none());
    }

    #[test]
    fn elongated_rectangle_is_rejected_by_aspect() {
        let corners = [[20.0, 80.0], [300.0, 80.0], [300.0, 160.0], [20.0, 160.0]];
        let img = draw_filled_quad(320, 240, &corners, 230, 20);
        assert!(find_roi(&img, &LocalizerConfig::default()).is_none());
    }
}
