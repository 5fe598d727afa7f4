//! Synthetic NV12 source for running without a camera

use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::info;

use crate::capture::frame::{Frame, FrameMetadata, PixelFormat};
use crate::capture::source::{Captured, FrameSource};
use crate::error::{Error, ResourceError};

const BLOCK: u32 = 32;
/// Row padding, so the stride handling is exercised like on real devices
const ROW_PADDING: u32 = 64;

/// Scrolling checkerboard paced to a target frame rate
pub struct TestPattern {
    width: u32,
    height: u32,
    stride: u32,
    interval: Option<Duration>,
    limit: Option<u64>,
    sequence: u64,
    next_due: Option<Instant>,
    running: bool,
}

impl TestPattern {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            stride: width + ROW_PADDING,
            interval: (fps > 0).then(|| Duration::from_secs(1) / fps),
            limit: None,
            sequence: 0,
            next_due: None,
            running: false,
        }
    }

    /// Finish after `frames` frames instead of streaming forever.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// NV12 payload for frame number `sequence`.
    pub fn render(&self, sequence: u64) -> Vec<u8> {
        let stride = self.stride as usize;
        let width = self.width as usize;
        let height = self.height as usize;
        let chroma_stride = PixelFormat::Nv12.chroma_stride(self.stride, self.width);
        let chroma_rows = height.div_ceil(2);
        let mut data = vec![0u8; stride * height + chroma_stride * chroma_rows];

        let shift = (sequence * 2) as usize;
        let (luma, chroma) = data.split_at_mut(stride * height);

        for (y, row) in luma.chunks_exact_mut(stride).enumerate() {
            for (x, px) in row[..width].iter_mut().enumerate() {
                let light = ((x + shift) / BLOCK as usize + y / BLOCK as usize) % 2 == 0;
                *px = if light { 200 } else { 40 };
            }
        }

        for (y, row) in chroma.chunks_exact_mut(chroma_stride).enumerate() {
            for x in 0..width.div_ceil(2) {
                row[2 * x] = (x * 255 / width.div_ceil(2).max(1)) as u8;
                row[2 * x + 1] = (y * 255 / chroma_rows.max(1)) as u8;
            }
        }

        data
    }

    fn pace(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        let due = *self.next_due.get_or_insert(now);
        if due > now {
            thread::sleep(due - now);
        }
        // Never accumulate a debt of frames after a stall
        self.next_due = Some(due.max(now) + interval);
    }
}

impl FrameSource for TestPattern {
    fn name(&self) -> &str {
        "test-pattern"
    }

    fn start(&mut self) -> Result<(), ResourceError> {
        info!(
            "Test pattern {}x{} (stride {})",
            self.width, self.height, self.stride
        );
        self.running = true;
        self.next_due = None;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Captured, Error> {
        if !self.running || self.limit.is_some_and(|limit| self.sequence >= limit) {
            return Ok(Captured::Finished);
        }

        self.pace();
        self.sequence += 1;

        let frame = Frame::new(
            Bytes::from(self.render(self.sequence)),
            FrameMetadata {
                sequence: self.sequence,
                width: self.width,
                height: self.height,
                stride: self.stride,
                format: PixelFormat::Nv12,
            },
        )?;
        Ok(Captured::Frame(frame))
    }

    fn stop(&mut self) {
        self.running = false;
    }
}
