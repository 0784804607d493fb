//! 2-D spectral primitives shared by the analyzer and the fingerprint
//! extractor.
//!
//! Spectra are stored row-major in *centered* layout: the DC bin sits at
//! `(width / 2, height / 2)`, the same convention as `fftshift`.

use image::GrayImage;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Row-major real raster in `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

impl Field {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_gray(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        Self {
            width: w as usize,
            height: h as usize,
            data: img.as_raw().iter().map(|&v| v as f64).collect(),
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    /// Multiply by the separable Hann window.
    pub fn hann_windowed(&self) -> Self {
        let wx = hann_window(self.width);
        let wy = hann_window(self.height);
        let mut out = self.clone();
        for (y, row) in out.data.chunks_mut(self.width).enumerate() {
            for (x, v) in row.iter_mut().enumerate() {
                *v *= wx[x] * wy[y];
            }
        }
        out
    }

    /// Min-max normalize into an 8-bit raster. A constant field maps to 0.
    pub fn to_gray_normalized(&self) -> GrayImage {
        let (lo, hi) = self
            .data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let span = hi - lo;
        let pixels: Vec<u8> = self
            .data
            .iter()
            .map(|&v| {
                if span > 1e-12 {
                    ((v - lo) / span * 255.0).round().clamp(0.0, 255.0) as u8
                } else {
                    0
                }
            })
            .collect();
        GrayImage::from_raw(self.width as u32, self.height as u32, pixels)
            .unwrap_or_else(|| GrayImage::new(self.width as u32, self.height as u32))
    }
}

/// Symmetric Hann window `0.5 * (1 - cos(2πi / (n - 1)))`.
pub fn hann_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / denom).cos()))
        .collect()
}

/// Move index `(0, 0)` to `(w / 2, h / 2)`.
pub fn fftshift<T: Copy>(data: &[T], width: usize, height: usize) -> Vec<T> {
    roll(data, width, height, width / 2, height / 2)
}

/// Inverse of [`fftshift`] (differs from it for odd sizes).
pub fn ifftshift<T: Copy>(data: &[T], width: usize, height: usize) -> Vec<T> {
    roll(data, width, height, width - width / 2, height - height / 2)
}

fn roll<T: Copy>(data: &[T], width: usize, height: usize, sx: usize, sy: usize) -> Vec<T> {
    debug_assert_eq!(data.len(), width * height);
    let mut out = data.to_vec();
    for y in 0..height {
        let ty = (y + sy) % height;
        for x in 0..width {
            let tx = (x + sx) % width;
            out[ty * width + tx] = data[y * width + x];
        }
    }
    out
}

/// Planned 2-D transforms for one raster size.
pub struct Fft2d {
    width: usize,
    height: usize,
    row_fwd: Arc<dyn Fft<f64>>,
    col_fwd: Arc<dyn Fft<f64>>,
    row_inv: Arc<dyn Fft<f64>>,
    col_inv: Arc<dyn Fft<f64>>,
}

impl Fft2d {
    pub fn new(width: usize, height: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            width,
            height,
            row_fwd: planner.plan_fft_forward(width),
            col_fwd: planner.plan_fft_forward(height),
            row_inv: planner.plan_fft_inverse(width),
            col_inv: planner.plan_fft_inverse(height),
        }
    }

    /// Forward transform of a real field, returned in centered layout.
    pub fn forward(&self, field: &Field) -> Spectrum {
        debug_assert_eq!((field.width, field.height), (self.width, self.height));
        let mut buf: Vec<Complex64> = field.data.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.transform(&mut buf, false);
        Spectrum {
            width: self.width,
            height: self.height,
            bins: fftshift(&buf, self.width, self.height),
        }
    }

    /// Inverse transform of a centered spectrum, normalized by `1 / (w·h)`.
    pub fn inverse(&self, spectrum: &Spectrum) -> Vec<Complex64> {
        let mut buf = ifftshift(&spectrum.bins, self.width, self.height);
        self.transform(&mut buf, true);
        let norm = 1.0 / (self.width * self.height) as f64;
        for v in &mut buf {
            *v *= norm;
        }
        buf
    }

    fn transform(&self, buf: &mut [Complex64], inverse: bool) {
        let (w, h) = (self.width, self.height);
        let (row, col) = if inverse {
            (&self.row_inv, &self.col_inv)
        } else {
            (&self.row_fwd, &self.col_fwd)
        };

        // Rows are contiguous; rustfft processes each `w`-sized chunk.
        row.process(buf);

        let mut cols = vec![Complex64::new(0.0, 0.0); w * h];
        for y in 0..h {
            for x in 0..w {
                cols[x * h + y] = buf[y * w + x];
            }
        }
        col.process(&mut cols);
        for x in 0..w {
            for y in 0..h {
                buf[y * w + x] = cols[x * h + y];
            }
        }
    }
}

/// Centered 2-D spectrum.
#[derive(Debug, Clone)]
pub struct Spectrum {
    pub width: usize,
    pub height: usize,
    pub bins: Vec<Complex64>,
}

impl Spectrum {
    /// Location of the DC bin.
    #[inline]
    pub fn center(&self) -> (usize, usize) {
        (self.width / 2, self.height / 2)
    }

    /// Distance of bin `(x, y)` from the DC bin.
    #[inline]
    pub fn radius(&self, x: usize, y: usize) -> f64 {
        let (cx, cy) = self.center();
        let dx = x as f64 - cx as f64;
        let dy = y as f64 - cy as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn magnitude(&self) -> Vec<f64> {
        self.bins.iter().map(|c| c.norm()).collect()
    }

    /// Copy keeping only bins where `keep(x, y)` holds.
    pub fn masked<F>(&self, keep: F) -> Self
    where
        F: Fn(usize, usize) -> bool,
    {
        let zero = Complex64::new(0.0, 0.0);
        let mut bins = self.bins.clone();
        for y in 0..self.height {
            for x in 0..self.width {
                if !keep(x, y) {
                    bins[y * self.width + x] = zero;
                }
            }
        }
        Self {
            width: self.width,
            height: self.height,
            bins,
        }
    }

    /// Copy keeping only bins whose radius lies in `[r_min, r_max]`.
    pub fn annulus(&self, r_min: f64, r_max: f64) -> Self {
        self.masked(|x, y| {
            let r = self.radius(x, y);
            r >= r_min && r <= r_max
        })
    }

    /// Power spectrum `|F|²` as a (real) spectrum.
    pub fn power(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            bins: self
                .bins
                .iter()
                .map(|c| Complex64::new(c.norm_sqr(), 0.0))
                .collect(),
        }
    }

    /// Point-symmetric partner of bin `(x, y)` about the DC bin, if in range.
    pub fn conjugate_bin(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let (cx, cy) = self.center();
        let mx = (2 * cx).checked_sub(x)?;
        let my = (2 * cy).checked_sub(y)?;
        (mx < self.width && my < self.height).then_some((mx, my))
    }
}

/// Bin indices ranked by `values` descending; ties keep ascending index.
pub(crate) fn rank_descending(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
    order
}
