//! Capture source contract and scoped streaming session

use tracing::{debug, info};

use crate::capture::Frame;
use crate::error::{Error, ResourceError};

/// Outcome of one poll of a [`FrameSource`].
pub enum Captured {
    Frame(Frame),
    /// Nothing arrived within the poll window; ask again.
    Idle,
    /// The source has no more frames to give.
    Finished,
}

/// A device or generator producing raw frames at its own cadence.
///
/// `next_frame` must return within a bounded time (yielding [`Captured::Idle`]
/// when nothing arrived) so the processing thread can observe stop requests.
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    /// Acquire the underlying device and begin streaming.
    fn start(&mut self) -> Result<(), ResourceError>;

    /// Poll for the newest frame.
    ///
    /// A [`Error::Format`] drops only this frame; anything else ends the session.
    fn next_frame(&mut self) -> Result<Captured, Error>;

    /// Release streaming resources. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Streaming session that releases its source when dropped, on every exit path.
pub struct CaptureSession<'a> {
    source: &'a mut dyn FrameSource,
}

impl<'a> CaptureSession<'a> {
    pub fn open(source: &'a mut dyn FrameSource) -> Result<Self, ResourceError> {
        source.start()?;
        info!(source = source.name(), "Capture session opened");
        Ok(Self { source })
    }

    pub fn next_frame(&mut self) -> Result<Captured, Error> {
        self.source.next_frame()
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        debug!(source = self.source.name(), "Releasing capture source");
        self.source.stop();
    }
}
