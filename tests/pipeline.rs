//! Processing thread lifecycle, backpressure and error isolation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use edgeview::capture::{Captured, Frame, FrameSource, PixelFormat, TestPattern};
use edgeview::error::{Error, FormatError, ResourceError};
use edgeview::filter::{FilterConfig, Mode};
use edgeview::pipeline::{Pipeline, RenderSignal};
use edgeview::Config;

#[derive(Clone, Default)]
struct Recorder {
    renders: Arc<AtomicU32>,
    stopped: Arc<AtomicBool>,
}

impl RenderSignal for Recorder {
    fn request_render(&self) {
        self.renders.fetch_add(1, Ordering::SeqCst);
    }

    fn pipeline_stopped(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Plays back a fixed script of poll results
struct Scripted {
    script: VecDeque<Result<Captured, Error>>,
    fail_start: bool,
    stops: Arc<AtomicU32>,
}

impl Scripted {
    fn new(script: Vec<Result<Captured, Error>>) -> Self {
        Self {
            script: script.into(),
            fail_start: false,
            stops: Arc::default(),
        }
    }
}

impl FrameSource for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn start(&mut self) -> Result<(), ResourceError> {
        if self.fail_start {
            return Err(ResourceError::NoDevice);
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Captured, Error> {
        self.script.pop_front().unwrap_or(Ok(Captured::Finished))
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Endless source that counts how often it was released
struct Endless {
    level: u8,
    stops: Arc<AtomicU32>,
}

impl FrameSource for Endless {
    fn name(&self) -> &str {
        "endless"
    }

    fn start(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Captured, Error> {
        thread::sleep(Duration::from_millis(1));
        Ok(Captured::Frame(gray(8, 8, self.level)))
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

fn gray(width: u32, height: u32, level: u8) -> Frame {
    Frame::packed(
        vec![level; (width * height) as usize],
        width,
        height,
        PixelFormat::Gray8,
        0,
    )
    .unwrap()
}

fn raw_config() -> Config {
    Config {
        filter: FilterConfig {
            mode: Mode::RawPassthrough,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn finite_source_runs_to_completion() {
    let recorder = Recorder::default();
    let source = TestPattern::new(64, 48, 0).with_limit(10);

    let mut pipeline =
        Pipeline::start(Box::new(source), Box::new(recorder.clone()), &Config::default()).unwrap();
    pipeline.wait().unwrap();

    let stats = pipeline.stats().snapshot();
    assert_eq!(stats.frames_processed, 10);
    assert_eq!(stats.format_errors, 0);
    // Nobody consumed, so every publish after the first displaced one
    assert_eq!(stats.frames_dropped, 9);
    assert_eq!(recorder.renders.load(Ordering::SeqCst), 10);
    assert!(recorder.stopped.load(Ordering::SeqCst));

    let buffer = pipeline.buffer();
    assert!(buffer.is_closed());
    let last = buffer.take_if_dirty().expect("last frame kept");
    assert_eq!((last.width(), last.height()), (64, 48));
    assert_eq!(last.sequence(), 10);
    assert!(buffer.take_if_dirty().is_none());
}

#[test]
fn malformed_frames_are_counted_and_skipped() {
    let garbage_jpeg = Frame::packed(vec![0x42u8; 64], 8, 8, PixelFormat::Mjpeg, 2).unwrap();
    let source = Scripted::new(vec![
        Ok(Captured::Frame(gray(8, 8, 10))),
        Err(FormatError::InvalidDimensions {
            width: 0,
            height: 8,
        }
        .into()),
        Ok(Captured::Idle),
        Ok(Captured::Frame(garbage_jpeg)),
        Ok(Captured::Frame(gray(8, 8, 20))),
    ]);
    let stops = Arc::clone(&source.stops);

    let mut pipeline =
        Pipeline::start(Box::new(source), Box::new(Recorder::default()), &raw_config()).unwrap();
    pipeline.wait().unwrap();

    let stats = pipeline.stats().snapshot();
    assert_eq!(stats.frames_processed, 2);
    assert_eq!(stats.format_errors, 2);
    assert_eq!(stops.load(Ordering::SeqCst), 1);

    let last = pipeline.buffer().take_if_dirty().unwrap();
    assert!(last.rgb().iter().all(|&v| v == 20));
}

#[test]
fn resource_failure_ends_the_pipeline() {
    let source = Scripted::new(vec![
        Ok(Captured::Frame(gray(4, 4, 1))),
        Err(ResourceError::NoDevice.into()),
        Ok(Captured::Frame(gray(4, 4, 2))),
    ]);
    let stops = Arc::clone(&source.stops);
    let recorder = Recorder::default();

    let mut pipeline =
        Pipeline::start(Box::new(source), Box::new(recorder.clone()), &raw_config()).unwrap();
    let err = pipeline.wait().unwrap_err();

    assert!(matches!(err, Error::Resource(ResourceError::NoDevice)));
    assert!(!err.is_frame_local());
    assert_eq!(pipeline.stats().snapshot().frames_processed, 1);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(recorder.stopped.load(Ordering::SeqCst));
    assert!(pipeline.buffer().is_closed());
}

#[test]
fn failed_start_is_reported_and_closes_buffer() {
    let mut source = Scripted::new(vec![]);
    source.fail_start = true;
    let stops = Arc::clone(&source.stops);
    let recorder = Recorder::default();

    let mut pipeline =
        Pipeline::start(Box::new(source), Box::new(recorder.clone()), &Config::default()).unwrap();

    assert!(matches!(
        pipeline.wait(),
        Err(Error::Resource(ResourceError::NoDevice))
    ));
    // Never started, so never stopped
    assert_eq!(stops.load(Ordering::SeqCst), 0);
    assert!(recorder.stopped.load(Ordering::SeqCst));
    assert!(pipeline.buffer().is_closed());
}

#[test]
fn stop_releases_source_and_is_idempotent() {
    let stops = Arc::new(AtomicU32::new(0));
    let source = Endless {
        level: 50,
        stops: Arc::clone(&stops),
    };

    let mut pipeline =
        Pipeline::start(Box::new(source), Box::new(Recorder::default()), &raw_config()).unwrap();

    thread::sleep(Duration::from_millis(30));
    assert!(pipeline.is_running());

    pipeline.stop().unwrap();
    pipeline.stop().unwrap();
    assert!(!pipeline.is_running());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(pipeline.buffer().is_closed());
    assert!(pipeline.stats().snapshot().frames_processed > 0);
}

#[test]
fn dropping_pipeline_stops_it() {
    let stops = Arc::new(AtomicU32::new(0));
    let source = Endless {
        level: 0,
        stops: Arc::clone(&stops),
    };

    let pipeline =
        Pipeline::start(Box::new(source), Box::new(Recorder::default()), &Config::default())
            .unwrap();
    let buffer = pipeline.buffer();
    drop(pipeline);

    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(buffer.is_closed());
}

#[test]
fn mode_change_applies_to_later_frames() {
    let source = Endless {
        level: 77,
        stops: Arc::default(),
    };
    let mut pipeline =
        Pipeline::start(Box::new(source), Box::new(Recorder::default()), &Config::default())
            .unwrap();
    let buffer = pipeline.buffer();

    // Uniform input has no edges
    let frame = wait_for_frame(&buffer);
    assert!(frame.rgb().iter().all(|&v| v == 0));

    pipeline.set_mode(Mode::RawPassthrough);
    assert_eq!(pipeline.controls().current().mode, Mode::RawPassthrough);

    // Frames already in flight may still be edge maps
    let raw = (0..200)
        .map(|_| wait_for_frame(&buffer))
        .find(|frame| frame.rgb().iter().all(|&v| v == 77));
    assert!(raw.is_some(), "passthrough never took effect");

    pipeline.stop().unwrap();
}

fn wait_for_frame(buffer: &edgeview::pipeline::FrameBuffer) -> edgeview::capture::DisplayFrame {
    for _ in 0..1000 {
        if let Some(frame) = buffer.take_if_dirty() {
            return frame;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("no frame published");
}
