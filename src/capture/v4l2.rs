//! V4L2 camera capture over memory-mapped streaming buffers

use std::io;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::frame::{Frame, FrameMetadata, PixelFormat};
use crate::capture::source::{Captured, FrameSource};
use crate::error::{Error, ResourceError};
use crate::CaptureConfig;

/// Camera source backed by a V4L2 device node
pub struct V4l2Capture {
    // Declared before the device so buffers are unmapped first
    stream: Option<MmapStream<'static>>,
    device: Box<Device>,
    config: CaptureConfig,
    negotiated: Negotiated,
    sequence: u64,
}

/// Format the driver actually agreed to
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
}

impl V4l2Capture {
    /// Open the device and negotiate the configured format
    #[instrument(skip(config), fields(device = %config.device))]
    pub fn new(config: CaptureConfig) -> Result<Self, ResourceError> {
        let path = config.device.clone();
        let device_err = |source: io::Error| ResourceError::Device {
            path: path.clone(),
            source,
        };

        let device = Device::with_path(&path).map_err(device_err)?;

        let caps = device.query_caps().map_err(device_err)?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(ResourceError::DeviceUnsupported {
                path: path.clone(),
                what: "video capture".into(),
            });
        }

        let mut fmt = device.format().map_err(device_err)?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = fourcc_for(config.format);

        let actual = device.set_format(&fmt).map_err(device_err)?;
        let format = pixel_format_for(actual.fourcc).ok_or_else(|| {
            ResourceError::DeviceUnsupported {
                path: path.clone(),
                what: format!("{:?} capture (driver offered {})", config.format, actual.fourcc),
            }
        })?;
        if actual.width != config.width || actual.height != config.height {
            warn!(
                "Requested {}x{}, driver chose {}x{}",
                config.width, config.height, actual.width, actual.height
            );
        }

        if let Err(e) = device.set_params(&Parameters::with_fps(config.fps)) {
            warn!("Could not request {} fps: {}", config.fps, e);
        }

        let negotiated = Negotiated {
            width: actual.width,
            height: actual.height,
            stride: actual.stride.max(format.min_stride(actual.width)),
            format,
        };
        info!(?negotiated, "Capture format negotiated");

        Ok(Self {
            stream: None,
            device: Box::new(device),
            config,
            negotiated,
            sequence: 0,
        })
    }
}

impl FrameSource for V4l2Capture {
    fn name(&self) -> &str {
        &self.config.device
    }

    /// Start streaming with memory-mapped buffers
    fn start(&mut self) -> Result<(), ResourceError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut stream =
            MmapStream::with_buffers(&self.device, Type::VideoCapture, self.config.buffer_count)
                .map_err(ResourceError::Stream)?;
        stream.set_timeout(Duration::from_millis(self.config.poll_timeout_ms));

        self.stream = Some(stream);
        info!(
            "Capture stream started with {} buffers",
            self.config.buffer_count
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Captured, Error> {
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Ok(Captured::Finished),
        };

        let (buf, meta) = match stream.next() {
            Ok(next) => next,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(Captured::Idle),
            Err(e) => return Err(ResourceError::Stream(e).into()),
        };

        // Some drivers leave bytesused at zero for uncompressed formats
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        let data = Bytes::copy_from_slice(&buf[..used]);

        self.sequence += 1;

        let frame = Frame::new(
            data,
            FrameMetadata {
                sequence: self.sequence,
                width: self.negotiated.width,
                height: self.negotiated.height,
                stride: self.negotiated.stride,
                format: self.negotiated.format,
            },
        )?;

        Ok(Captured::Frame(frame))
    }

    fn stop(&mut self) {
        // Dropping the stream turns streaming off and unmaps the buffers
        if self.stream.take().is_some() {
            debug!("Capture stream released after {} frames", self.sequence);
        }
    }
}

/// FourCC to request from the driver for a configured pixel format
pub fn fourcc_for(format: PixelFormat) -> FourCC {
    let code = match format {
        PixelFormat::Mjpeg => b"MJPG",
        PixelFormat::Yuyv => b"YUYV",
        PixelFormat::Nv12 => b"NV12",
        PixelFormat::Nv21 => b"NV21",
        PixelFormat::I420 => b"YU12",
        PixelFormat::Rgb24 => b"RGB3",
        PixelFormat::Bgr24 => b"BGR3",
        PixelFormat::Gray8 => b"GREY",
    };
    FourCC::new(code)
}

/// Pixel format matching a driver FourCC, if the pipeline can convert it
pub fn pixel_format_for(fourcc: FourCC) -> Option<PixelFormat> {
    match &fourcc.repr {
        b"MJPG" => Some(PixelFormat::Mjpeg),
        b"YUYV" => Some(PixelFormat::Yuyv),
        b"NV12" => Some(PixelFormat::Nv12),
        b"NV21" => Some(PixelFormat::Nv21),
        b"YU12" => Some(PixelFormat::I420),
        b"RGB3" => Some(PixelFormat::Rgb24),
        b"BGR3" => Some(PixelFormat::Bgr24),
        b"GREY" => Some(PixelFormat::Gray8),
        _ => None,
    }
}
