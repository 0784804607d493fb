//! Cooperative frame loop.

use crate::error::PbmError;
use crate::ports::{Control, ControlSignal, FrameSource};

use super::{FrameReport, Session};

/// Drive `session` until it produces an outcome.
///
/// Returns `Ok(None)` when the operator quits. An exhausted frame source is
/// an acquisition error; reaching `max_frames` is a timeout. The source is
/// released on every exit path.
pub fn drive_session<S: Session>(
    session: &mut S,
    source: &mut dyn FrameSource,
    control: &mut dyn ControlSignal,
    max_frames: Option<usize>,
) -> Result<Option<S::Outcome>, PbmError> {
    drive_session_with(session, source, control, max_frames, |_| {})
}

/// [`drive_session`] with a callback receiving every frame report.
pub fn drive_session_with<S, F>(
    session: &mut S,
    source: &mut dyn FrameSource,
    control: &mut dyn ControlSignal,
    max_frames: Option<usize>,
    mut on_frame: F,
) -> Result<Option<S::Outcome>, PbmError>
where
    S: Session,
    F: FnMut(&FrameReport),
{
    let result = run(session, source, control, max_frames, &mut on_frame);
    source.release();
    result
}

fn run<S: Session>(
    session: &mut S,
    source: &mut dyn FrameSource,
    control: &mut dyn ControlSignal,
    max_frames: Option<usize>,
    on_frame: &mut dyn FnMut(&FrameReport),
) -> Result<Option<S::Outcome>, PbmError> {
    let mut frames = 0usize;
    loop {
        match control.poll() {
            Control::Continue => {}
            Control::Reset => {
                tracing::info!("session reset by operator");
                session.reset();
            }
            Control::Quit => {
                tracing::info!("session aborted after {} frames", frames);
                session.reset();
                return Ok(None);
            }
        }

        if let Some(cap) = max_frames {
            if frames >= cap {
                tracing::warn!("session timed out after {} frames", frames);
                return Err(PbmError::Timeout { frames });
            }
        }

        let Some(frame) = source.next_frame() else {
            tracing::warn!("frame source exhausted after {} frames", frames);
            return Err(PbmError::Acquisition(format!(
                "frame source exhausted after {frames} frames"
            )));
        };
        frames += 1;

        let report = session.step(&frame)?;
        if let Some(error) = report.error.as_deref() {
            tracing::debug!("frame {}: {}", frames, error);
        }
        on_frame(&report);

        if let Some(outcome) = session.outcome() {
            tracing::info!("session complete after {} frames", frames);
            return Ok(Some(outcome.clone()));
        }
    }
}
