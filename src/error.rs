//! Error taxonomy for the frame pipeline

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::capture::PixelFormat;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A single frame whose buffer does not match its declared shape.
///
/// Never fatal: the offending frame is dropped and counted, streaming goes on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("row stride {stride} is smaller than the {width} pixel wide row")]
    StrideTooSmall { stride: u32, width: u32 },

    #[error("{format:?} payload of {width}x{height} needs {expected} bytes, got {actual}")]
    PayloadSize {
        format: PixelFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("frame of {width}x{height} exceeds the {max} pixel texture limit")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("pixel format {0:?} cannot be used here")]
    Unsupported(PixelFormat),

    #[error("failed to decode {format:?} frame: {reason}")]
    Decode { format: PixelFormat, reason: String },
}

/// A capture device, image file or GPU context that is unusable.
///
/// Fatal to the subsystem that raised it; the core never retries on its own.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("capture device {path}: {source}")]
    Device {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("capture device {path} does not support {what}")]
    DeviceUnsupported { path: String, what: String },

    #[error("no suitable capture device found")]
    NoDevice,

    #[error("capture stream failed: {0}")]
    Stream(#[source] io::Error),

    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create display surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to open GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("display surface unusable: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("display shader rejected by the GPU: {0}")]
    Shader(String),

    #[error("window system failure: {0}")]
    Window(String),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} thread panicked")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Whether the pipeline may drop the frame at hand and keep streaming.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}
