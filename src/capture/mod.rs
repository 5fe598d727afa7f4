pub mod frame;
pub mod pattern;
pub mod source;
pub mod still;
pub mod v4l2;

pub use frame::{DisplayFrame, Frame, FrameMetadata, PixelFormat};
pub use pattern::TestPattern;
pub use source::{CaptureSession, Captured, FrameSource};
pub use still::StillImage;
pub use v4l2::V4l2Capture;
