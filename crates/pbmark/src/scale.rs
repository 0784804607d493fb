//! Distance-invariant parallax scale.
//!
//! Parallax grows as the camera approaches while the marker's apparent area
//! grows quadratically, so `mean(parallax) / sqrt(mean(area))` is roughly
//! constant for one physical marker.

/// `mean(parallax) / sqrt(mean(area))`.
///
/// `None` when either list is empty or the mean area is not positive.
pub fn pbm_scale(parallax: &[f64], areas: &[f64]) -> Option<f64> {
    if parallax.is_empty() || areas.is_empty() {
        return None;
    }
    let mean_parallax = parallax.iter().sum::<f64>() / parallax.len() as f64;
    let mean_area = areas.iter().sum::<f64>() / areas.len() as f64;
    if !(mean_area > 0.0) {
        return None;
    }
    Some(mean_parallax / mean_area.sqrt())
}

/// Accumulates `(parallax, ROI area)` pairs over one session.
#[derive(Debug, Clone, Default)]
pub struct ScaleEstimator {
    parallax: Vec<f64>,
    areas: Vec<f64>,
}

impl ScaleEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, parallax: f64, area: f64) {
        self.parallax.push(parallax);
        self.areas.push(area);
    }

    pub fn estimate(&self) -> Option<f64> {
        pbm_scale(&self.parallax, &self.areas)
    }

    pub fn len(&self) -> usize {
        self.parallax.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parallax.is_empty()
    }

    pub fn reset(&mut self) {
        self.parallax.clear();
        self.areas.clear();
    }
}
