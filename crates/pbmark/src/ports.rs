//! Collaborator interfaces at the edge of the pipeline.
//!
//! Camera capture, QR symbol coding and operator input live outside this
//! crate; sessions only see these traits.

use std::collections::VecDeque;

use image::GrayImage;

/// Source of grayscale frames.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted or unreadable.
    fn next_frame(&mut self) -> Option<GrayImage>;

    /// Release the underlying device. Called once by the driver.
    fn release(&mut self) {}
}

/// Opaque QR text codec.
pub trait QrCodec {
    fn encode(&self, text: &str) -> GrayImage;
    /// Decoded text of a QR symbol visible in `frame`, if any.
    fn decode(&self, frame: &GrayImage) -> Option<String>;
}

/// Operator request polled between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// Return the session to its initial state.
    Reset,
    /// Abort without an outcome.
    Quit,
}

pub trait ControlSignal {
    fn poll(&mut self) -> Control;
}

/// Never interrupts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoControl;

impl ControlSignal for NoControl {
    fn poll(&mut self) -> Control {
        Control::Continue
    }
}

/// In-memory frame source, mostly for tests and offline replay.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    frames: VecDeque<GrayImage>,
}

impl FrameQueue {
    pub fn new(frames: impl IntoIterator<Item = GrayImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for FrameQueue {
    fn next_frame(&mut self) -> Option<GrayImage> {
        self.frames.pop_front()
    }

    fn release(&mut self) {
        self.frames.clear();
    }
}

/// Codec for setups where the credential text arrives out of band: every
/// frame "decodes" to the same text.
#[derive(Debug, Clone)]
pub struct FixedText(pub String);

impl QrCodec for FixedText {
    fn encode(&self, _text: &str) -> GrayImage {
        GrayImage::new(1, 1)
    }

    fn decode(&self, _frame: &GrayImage) -> Option<String> {
        Some(self.0.clone())
    }
}
