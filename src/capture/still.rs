//! Still image delivered as a repeating RGB24 stream

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::info;

use crate::capture::frame::{Frame, FrameMetadata, PixelFormat};
use crate::capture::source::{Captured, FrameSource};
use crate::error::{Error, ResourceError};

pub struct StillImage {
    path: PathBuf,
    name: String,
    interval: Duration,
    frame: Option<Frame>,
    sequence: u64,
}

impl StillImage {
    pub fn new(path: impl Into<PathBuf>, fps: u32) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
            interval: Duration::from_secs(1) / fps.max(1),
            frame: None,
            sequence: 0,
        }
    }
}

/// Load an image file as a tightly packed RGB24 frame
pub fn load_rgb(path: &Path) -> Result<Frame, Error> {
    let image = image::open(path)
        .map_err(|source| ResourceError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let (width, height) = image.dimensions();
    Ok(Frame::packed(image.into_raw(), width, height, PixelFormat::Rgb24, 0)?)
}

impl FrameSource for StillImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), ResourceError> {
        let frame = match load_rgb(&self.path) {
            Ok(frame) => frame,
            Err(Error::Resource(e)) => return Err(e),
            Err(e) => {
                return Err(ResourceError::DeviceUnsupported {
                    path: self.name.clone(),
                    what: e.to_string(),
                })
            }
        };
        info!("Loaded {} ({}x{})", self.name, frame.width(), frame.height());
        self.frame = Some(frame);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Captured, Error> {
        let Some(frame) = &self.frame else {
            return Ok(Captured::Finished);
        };
        // The first delivery is immediate, repeats follow at the frame interval
        if self.sequence > 0 {
            thread::sleep(self.interval);
        }
        self.sequence += 1;
        let meta = FrameMetadata {
            sequence: self.sequence,
            ..frame.meta().clone()
        };
        Ok(Captured::Frame(frame.restamped(meta)?))
    }

    fn stop(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_resource_error() {
        let mut source = StillImage::new("/nonexistent/edgeview.png", 30);
        assert!(matches!(
            source.start(),
            Err(ResourceError::Image { .. })
        ));
        assert!(matches!(source.next_frame().unwrap(), Captured::Finished));
    }

    fn frame(source: &mut StillImage) -> Frame {
        match source.next_frame().unwrap() {
            Captured::Frame(frame) => frame,
            _ => panic!("still image produced no frame"),
        }
    }

    #[test]
    fn repeats_carry_fresh_sequence_and_timestamp() {
        let path = std::env::temp_dir().join(format!("edgeview-still-{}.png", std::process::id()));
        image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let mut source = StillImage::new(&path, 500);
        source.start().unwrap();
        let first = frame(&mut source);
        let second = frame(&mut source);
        source.stop();
        std::fs::remove_file(&path).ok();

        assert_eq!(first.meta().sequence, 1);
        assert_eq!(second.meta().sequence, 2);
        assert!(second.timestamp() > first.timestamp());
        assert_eq!((second.width(), second.height()), (3, 2));
        assert_eq!(second.data(), first.data());
        assert_eq!(&second.data()[..3], &[10, 20, 30]);
    }
}
