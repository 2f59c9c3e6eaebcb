use crate::common::Frame;
use crate::error::{CaptureError, DeliveryError};
use crate::pipeline::Verdict;

/// Opaque capture operation: a frame or a failure.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<Frame, CaptureError>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Result<Frame, CaptureError> + Send,
{
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        self()
    }
}

/// Off-device delivery of a frame and its verdict.
pub trait OutputSink: Send {
    fn deliver(&mut self, frame: &Frame, verdict: &Verdict) -> Result<(), DeliveryError>;
}

/// External timer that resets the device unless fed.
pub trait Watchdog: Send {
    fn feed(&mut self);
}
