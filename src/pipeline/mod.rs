//! Capture → convert → filter → publish, on a dedicated processing thread

pub mod controls;
pub mod frame_buffer;
pub mod rate;
pub mod signal;
pub mod stats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use crate::capture::{CaptureSession, Captured, DisplayFrame, Frame, FrameSource};
use crate::convert::{self, Rotation};
use crate::error::{Error, FormatError, ResourceError};
use crate::filter::{self, FilterConfig, Mode, QualityLevel};
use crate::Config;

pub use controls::FilterControls;
pub use frame_buffer::FrameBuffer;
pub use rate::RateMeter;
pub use signal::{RenderSignal, RenderTrigger};
pub use stats::{PipelineStats, StatsSnapshot};

const WORKER_NAME: &str = "edgeview-processing";

/// One full pass over a raw frame
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameProcessor {
    rotation: Rotation,
}

impl FrameProcessor {
    pub fn new(rotation: Rotation) -> Self {
        Self { rotation }
    }

    #[instrument(level = "debug", skip_all, fields(sequence = frame.meta().sequence))]
    pub fn process(&self, frame: &Frame, config: &FilterConfig) -> Result<DisplayFrame, FormatError> {
        let rgb = convert::frame_to_rgb(frame)?;
        let (rgb, width, height) =
            convert::rotate_rgb(rgb, frame.width(), frame.height(), self.rotation);
        let filtered = filter::apply_owned(rgb, width, height, config)?;
        DisplayFrame::new(
            filtered,
            width,
            height,
            frame.meta().sequence,
            frame.timestamp(),
        )
    }
}

/// Running pipeline and the handles the host talks to.
///
/// Dropping it stops the processing thread and releases the capture source.
pub struct Pipeline {
    controls: FilterControls,
    buffer: Arc<FrameBuffer>,
    stats: Arc<PipelineStats>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<(), Error>>>,
}

/// Everything the processing thread owns
struct Worker {
    processor: FrameProcessor,
    controls: FilterControls,
    buffer: Arc<FrameBuffer>,
    stats: Arc<PipelineStats>,
    stop: Arc<AtomicBool>,
    signal: Box<dyn RenderSignal>,
}

impl Pipeline {
    /// Spawn the processing thread. The source is started on that thread.
    pub fn start(
        mut source: Box<dyn FrameSource>,
        signal: Box<dyn RenderSignal>,
        config: &Config,
    ) -> Result<Self, ResourceError> {
        let controls = FilterControls::new(config.filter);
        let buffer = Arc::new(FrameBuffer::new());
        let stats = Arc::new(PipelineStats::new());
        let stop = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            processor: FrameProcessor::new(config.capture.rotation),
            controls: controls.clone(),
            buffer: Arc::clone(&buffer),
            stats: Arc::clone(&stats),
            stop: Arc::clone(&stop),
            signal,
        };
        let pin_core = config.pipeline.pin_core;

        let handle = thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || {
                if let Some(core) = pin_core {
                    pin_to_core(core);
                }
                let result = worker.run(source.as_mut());
                worker.buffer.close();
                worker.signal.pipeline_stopped();
                if let Err(e) = &result {
                    error!("Processing stopped: {}", e);
                }
                result
            })
            .map_err(|source| ResourceError::Spawn {
                name: WORKER_NAME.into(),
                source,
            })?;

        info!(filter = ?config.filter, "Pipeline started");

        Ok(Self {
            controls,
            buffer,
            stats,
            stop,
            worker: Some(handle),
        })
    }

    pub fn controls(&self) -> FilterControls {
        self.controls.clone()
    }

    pub fn set_mode(&self, mode: Mode) {
        self.controls.set_mode(mode);
    }

    pub fn set_quality_level(&self, quality: QualityLevel) {
        self.controls.set_quality_level(quality);
    }

    /// Consumer side of the frame handoff
    pub fn buffer(&self) -> Arc<FrameBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn fps(&self) -> f64 {
        self.stats.fps()
    }

    pub fn last_processing_time_ms(&self) -> f64 {
        self.stats.last_processing_time_ms()
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Ask the processing thread to finish and wait for it.
    ///
    /// Idempotent: only the first call reports how the thread ended.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.stop.store(true, Ordering::Release);
        self.join()
    }

    /// Wait for the source to run dry without requesting a stop.
    pub fn wait(&mut self) -> Result<(), Error> {
        self.join()
    }

    fn join(&mut self) -> Result<(), Error> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let result = worker
            .join()
            .unwrap_or_else(|_| Err(ResourceError::Panicked(WORKER_NAME.into()).into()));
        info!(stats = ?self.stats.snapshot(), "Pipeline stopped");
        result
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Pipeline ended with error: {}", e);
        }
    }
}

impl Worker {
    fn run(&self, source: &mut dyn FrameSource) -> Result<(), Error> {
        let mut session = CaptureSession::open(source)?;
        let mut meter = RateMeter::new();

        while !self.stop.load(Ordering::Acquire) {
            let frame = match session.next_frame() {
                Ok(Captured::Frame(frame)) => frame,
                Ok(Captured::Idle) => continue,
                Ok(Captured::Finished) => {
                    info!("Capture source finished");
                    break;
                }
                Err(Error::Format(e)) => {
                    warn!("Dropping malformed capture: {}", e);
                    self.stats.record_format_error();
                    continue;
                }
                Err(e) => return Err(e),
            };

            // One snapshot per frame, later changes apply to the next one
            let config = self.controls.current();
            let started = Instant::now();

            let display_frame = match self.processor.process(&frame, &config) {
                Ok(display_frame) => display_frame,
                Err(e) => {
                    warn!(sequence = frame.meta().sequence, "Dropping frame: {}", e);
                    self.stats.record_format_error();
                    continue;
                }
            };
            drop(frame);

            self.stats
                .record_processed(started.elapsed().as_secs_f64() * 1000.0);

            if self.buffer.publish(display_frame).is_some() {
                self.stats.record_dropped();
            }
            self.signal.request_render();

            if let Some(fps) = meter.frame() {
                self.stats.record_fps(fps);
                debug!(
                    fps,
                    processing_ms = self.stats.last_processing_time_ms(),
                    "Throughput window closed"
                );
            }
        }

        Ok(())
    }
}

fn pin_to_core(core: usize) {
    let Some(id) = core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|id| id.id == core))
    else {
        warn!("CPU core {} not available, processing thread left unpinned", core);
        return;
    };
    if core_affinity::set_for_current(id) {
        info!("Processing thread pinned to core {}", core);
    } else {
        warn!("Failed to pin processing thread to core {}", core);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PixelFormat;

    fn gray_frame(width: u32, height: u32, level: u8, sequence: u64) -> Frame {
        Frame::packed(
            vec![level; (width * height) as usize],
            width,
            height,
            PixelFormat::Gray8,
            sequence,
        )
        .unwrap()
    }

    #[test]
    fn processor_rotates_before_filtering() {
        let processor = FrameProcessor::new(Rotation::Cw90);
        let config = FilterConfig {
            mode: Mode::RawPassthrough,
            ..Default::default()
        };

        let out = processor.process(&gray_frame(4, 2, 9, 7), &config).unwrap();
        assert_eq!((out.width(), out.height()), (2, 4));
        assert_eq!(out.sequence(), 7);
        assert!(out.rgb().iter().all(|&v| v == 9));
    }

    #[test]
    fn processor_produces_edge_map() {
        let processor = FrameProcessor::default();
        let out = processor
            .process(&gray_frame(5, 5, 128, 1), &FilterConfig::default())
            .unwrap();
        assert!(out.rgb().iter().all(|&v| v == 0));
    }
}
