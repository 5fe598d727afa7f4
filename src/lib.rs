//! Real-time camera edge detection with a GPU display surface.
//!
//! Frames flow from a [`capture::FrameSource`] through color conversion and
//! the edge filter on a processing thread, then through a single-slot
//! [`pipeline::FrameBuffer`] to the [`display::DisplaySurface`].

pub mod capture;
pub mod convert;
pub mod display;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod utils;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capture::PixelFormat;
use crate::convert::Rotation;
use crate::filter::FilterConfig;

pub use error::{Error, FormatError, ResourceError, Result};

/// Prefix of environment overrides, e.g. `EDGEVIEW__CAPTURE__FPS=15`
pub const ENV_PREFIX: &str = "EDGEVIEW";

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
    pub pipeline: PipelineConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Device node, empty to auto-detect
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    pub buffer_count: u32,
    pub rotation: Rotation,
    /// Upper bound on a single frame wait, keeps stop requests responsive
    pub poll_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Letterbox instead of stretching to the window
    pub preserve_aspect: bool,
    pub vsync: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// CPU core for the processing thread
    pub pin_core: Option<usize>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            width: 640,
            height: 480,
            fps: 30,
            format: PixelFormat::Yuyv,
            buffer_count: 4,
            rotation: Rotation::None,
            poll_timeout_ms: 200,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "EdgeView".into(),
            preserve_aspect: true,
            vsync: true,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file at `path` if given, then `EDGEVIEW__SECTION__KEY`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}
