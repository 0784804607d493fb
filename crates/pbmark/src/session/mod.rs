//! Enrollment and verification protocols as explicit state machines.
//!
//! Each session owns its decision window, descriptor list and scale
//! samples. State changes go through one pure transition function per
//! protocol; [`driver::drive_session`] feeds frames until an outcome.

pub mod driver;
mod enroll;
mod verify;

use image::GrayImage;
use serde::Serialize;

use crate::error::PbmError;
use crate::liveness::{Liveness, WindowStats};
use crate::localize::Quad;
use crate::pipeline::FrameMeasurer;

pub use driver::{drive_session, drive_session_with};
pub use enroll::{next_enroll_state, EnrollEvent, EnrollState, EnrollmentSession};
pub use verify::{next_verify_state, VerificationOutcome, VerificationSession, VerifyEvent, VerifyState};

/// Boxed per-frame measurer owned by a session.
pub type Measurer = Box<dyn FrameMeasurer + Send>;

/// Per-frame summary for an overlay or log line.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub state: &'static str,
    pub roi: Option<Quad>,
    pub liveness: Liveness,
    pub stats: WindowStats,
    /// Descriptors collected so far in the collection state.
    pub collected: usize,
    pub required: usize,
    /// Recoverable error surfaced this frame (e.g. a rejected credential).
    pub error: Option<String>,
}

/// One protocol run, stepped one frame at a time.
pub trait Session {
    type Outcome: Clone;

    /// Process one frame. Errors are fatal to the session.
    fn step(&mut self, frame: &GrayImage) -> Result<FrameReport, PbmError>;

    /// Set once the protocol reached its final state.
    fn outcome(&self) -> Option<&Self::Outcome>;

    /// Return to the initial state, discarding everything accumulated.
    fn reset(&mut self);
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted measurer: white frames show the marker, black frames do not.

    use std::cell::Cell;

    use image::{GrayImage, Luma};

    use crate::analyzer::ShiftSample;
    use crate::fingerprint::FeatureDescriptor;
    use crate::localize::Quad;
    use crate::pipeline::{FrameMeasurer, FrameObservation};

    pub(crate) struct Scripted {
        /// Cycled through on successive marker frames.
        pub samples: [ShiftSample; 2],
        pub descriptor: FeatureDescriptor,
        seen: Cell<usize>,
    }

    impl Scripted {
        /// Coherent differential motion with parallax 1 on a 20×20 ROI. The
        /// near band alternates between two pitches so the window swings.
        pub(crate) fn genuine(descriptor: FeatureDescriptor) -> Self {
            let banded = |near: f64| ShiftSample::Banded {
                near: [near, 0.0],
                far: [near - 1.0, 0.0],
                confidence: 0.9,
            };
            Self {
                samples: [banded(3.0), banded(4.5)],
                descriptor,
                seen: Cell::new(0),
            }
        }
    }

    impl FrameMeasurer for Scripted {
        fn observe(&self, frame: &GrayImage) -> FrameObservation {
            if frame.get_pixel(0, 0)[0] == 0 {
                return FrameObservation {
                    roi: None,
                    roi_area: 0.0,
                    rectified: None,
                    sample: ShiftSample::missing(),
                };
            }
            let n = self.seen.get();
            self.seen.set(n + 1);
            let roi = Quad {
                corners: [[0.0, 0.0], [20.0, 0.0], [20.0, 20.0], [0.0, 20.0]],
            };
            FrameObservation {
                roi_area: roi.area(),
                roi: Some(roi),
                rectified: Some(GrayImage::new(8, 8)),
                sample: self.samples[n % 2],
            }
        }

        fn describe(&self, observation: &FrameObservation) -> Option<FeatureDescriptor> {
            observation.rectified.as_ref().map(|_| self.descriptor)
        }
    }

    pub(crate) fn descriptor(f1: f64) -> FeatureDescriptor {
        FeatureDescriptor {
            f1,
            a1: 30.0,
            f2: 0.20,
            a2: 120.0,
            rel_angle: 90.0,
        }
    }

    pub(crate) fn marker() -> GrayImage {
        GrayImage::from_pixel(4, 4, Luma([255]))
    }

    pub(crate) fn empty() -> GrayImage {
        GrayImage::new(4, 4)
    }
}
