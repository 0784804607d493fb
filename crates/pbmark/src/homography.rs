//! Four-corner homography for the rectifier.
//!
//! Normalized DLT: both point sets are conditioned with a Hartley similarity,
//! the 9-vector is the smallest-eigenvalue eigenvector of AᵀA, and the
//! conditioning is undone afterwards. More than four pairs are accepted.

use nalgebra::{DMatrix, Matrix3, Vector3};

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HomographyError {
    /// Fewer than four correspondences.
    Underdetermined { got: usize },
    /// The point configuration admits no finite solution.
    Degenerate(String),
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Underdetermined { got } => {
                write!(f, "homography needs 4 correspondences, got {got}")
            }
            Self::Degenerate(msg) => write!(f, "degenerate homography: {msg}"),
        }
    }
}

impl std::error::Error for HomographyError {}

// ── Mapping ──────────────────────────────────────────────────────────────

/// Map `(x, y)` through `h`. Points sent to infinity come back as NaN.
#[inline]
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let q = h * Vector3::new(x, y, 1.0);
    if q.z.abs() < 1e-15 {
        [f64::NAN, f64::NAN]
    } else {
        [q.x / q.z, q.y / q.z]
    }
}

/// Euclidean distance between `h(src)` and `dst`.
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let [u, v] = project(h, src[0], src[1]);
    (u - dst[0]).hypot(v - dst[1])
}

// ── Hartley normalization ────────────────────────────────────────────────

/// Similarity moving the centroid to the origin with mean radius √2.
fn hartley(pts: &[[f64; 2]]) -> Matrix3<f64> {
    let n = pts.len() as f64;
    let (sx, sy) = pts
        .iter()
        .fold((0.0, 0.0), |(ax, ay), p| (ax + p[0], ay + p[1]));
    let (cx, cy) = (sx / n, sy / n);
    let spread = pts.iter().map(|p| (p[0] - cx).hypot(p[1] - cy)).sum::<f64>() / n;
    let s = if spread > 1e-15 {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn apply(t: &Matrix3<f64>, p: &[f64; 2]) -> [f64; 2] {
    [
        t[(0, 0)] * p[0] + t[(0, 2)],
        t[(1, 1)] * p[1] + t[(1, 2)],
    ]
}

// ── DLT ──────────────────────────────────────────────────────────────────

/// Estimate the homography mapping `src` onto `dst` (at least 4 pairs).
///
/// The result is scaled to `H[(2, 2)] == 1` unless that entry vanishes.
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
    let n = src.len().min(dst.len());
    if n < 4 {
        return Err(HomographyError::Underdetermined { got: n });
    }
    if src.len() != dst.len() {
        return Err(HomographyError::Degenerate(format!(
            "{} source points vs {} destination points",
            src.len(),
            dst.len()
        )));
    }

    let t_src = hartley(src);
    let t_dst = hartley(dst);

    // Two constraint rows per correspondence; rows go straight into AᵀA.
    let mut ata = DMatrix::<f64>::zeros(9, 9);
    for (s, d) in src.iter().zip(dst) {
        let [x, y] = apply(&t_src, s);
        let [u, v] = apply(&t_dst, d);
        let rows = [
            [0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v],
            [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u],
        ];
        for row in &rows {
            for i in 0..9 {
                for j in 0..9 {
                    ata[(i, j)] += row[i] * row[j];
                }
            }
        }
    }

    let eig = nalgebra::SymmetricEigen::new(ata);
    let null = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        .map(|(i, _)| i)
        .ok_or_else(|| HomographyError::Degenerate("empty eigen decomposition".into()))?;
    let h_norm = Matrix3::from_iterator(eig.eigenvectors.column(null).iter().copied()).transpose();

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HomographyError::Degenerate("degenerate destination points".into()))?;
    let h = t_dst_inv * h_norm * t_src;
    if h.iter().any(|v| !v.is_finite()) {
        return Err(HomographyError::Degenerate("non-finite homography".into()));
    }

    let w = h[(2, 2)];
    Ok(if w.abs() < 1e-15 { h } else { h / w })
}

// ── Tests ────────────────────────────────────────────────────────────────
