//! winit host: window lifecycle, render-on-demand and keyboard controls

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::capture::FrameSource;
use crate::display::surface::DisplaySurface;
use crate::error::{Error, ResourceError};
use crate::filter::{FilterConfig, Mode, QualityLevel};
use crate::pipeline::{Pipeline, RenderSignal, RenderTrigger};
use crate::{Config, DisplayConfig};

const TITLE_REFRESH: Duration = Duration::from_secs(1);

/// Window title with live statistics
fn status_title(
    title: &str,
    fps: f64,
    processing_ms: f64,
    filter: &FilterConfig,
    frame_size: Option<(u32, u32)>,
) -> String {
    let mode = match filter.mode {
        Mode::EdgeDetect => format!("edges {:?}", filter.quality),
        Mode::RawPassthrough => "raw".to_string(),
    };
    let size = match frame_size {
        Some((width, height)) => format!("{}x{}", width, height),
        None => "no frame".to_string(),
    };
    format!(
        "{} | {} | {:.1} fps | {:.2} ms | {}",
        title, size, fps, processing_ms, mode
    )
}

/// Wakeups sent from the processing thread to the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    Render,
    PipelineStopped,
}

/// Render signal that posts to the event loop, at most once per pending draw
pub struct ProxySignal {
    proxy: EventLoopProxy<DisplayEvent>,
    trigger: Arc<RenderTrigger>,
}

impl ProxySignal {
    pub fn new(proxy: EventLoopProxy<DisplayEvent>, trigger: Arc<RenderTrigger>) -> Self {
        Self { proxy, trigger }
    }
}

impl RenderSignal for ProxySignal {
    fn request_render(&self) {
        if self.trigger.request() && self.proxy.send_event(DisplayEvent::Render).is_err() {
            // Event loop is gone, nothing left to draw into
            self.trigger.acknowledge();
        }
    }

    fn pipeline_stopped(&self) {
        let _ = self.proxy.send_event(DisplayEvent::PipelineStopped);
    }
}

/// Application state driven by the winit event loop
pub struct DisplayApp {
    config: DisplayConfig,
    pipeline: Pipeline,
    trigger: Arc<RenderTrigger>,
    surface: Option<DisplaySurface>,
    title_refreshed: Option<Instant>,
    result: Result<(), Error>,
}

impl DisplayApp {
    pub fn new(config: DisplayConfig, pipeline: Pipeline, trigger: Arc<RenderTrigger>) -> Self {
        Self {
            config,
            pipeline,
            trigger,
            surface: None,
            title_refreshed: None,
            result: Ok(()),
        }
    }

    /// Stop the pipeline and hand back the first failure seen, if any
    pub fn finish(mut self) -> Result<(), Error> {
        let stopped = self.pipeline.stop();
        self.result.and(stopped)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Error) {
        error!("Display failed: {}", err);
        if self.result.is_ok() {
            self.result = Err(err);
        }
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.pipeline.stop() {
            if self.result.is_ok() {
                self.result = Err(e);
            }
        }
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.trigger.acknowledge();

        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        match surface.render() {
            Ok(()) => {}
            Err(e) if e.is_frame_local() => warn!("Frame not displayed: {}", e),
            Err(e) => return self.fail(event_loop, e),
        }

        self.refresh_title();
    }

    fn refresh_title(&mut self) {
        let due = self
            .title_refreshed
            .map_or(true, |at| at.elapsed() >= TITLE_REFRESH);
        let Some(surface) = self.surface.as_ref() else {
            return;
        };
        if !due {
            return;
        }

        surface.window().set_title(&status_title(
            &self.config.title,
            self.pipeline.fps(),
            self.pipeline.last_processing_time_ms(),
            &self.pipeline.controls().current(),
            surface.frame_size(),
        ));
        self.title_refreshed = Some(Instant::now());
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }

        let controls = self.pipeline.controls();
        match event.logical_key.as_ref() {
            Key::Named(NamedKey::Escape) => {
                info!("Escape pressed, shutting down");
                self.shutdown(event_loop);
            }
            Key::Character("e" | "E") => {
                controls.toggle_mode();
            }
            Key::Character(digit @ ("1" | "2" | "3")) => {
                let level = digit
                    .parse::<u32>()
                    .ok()
                    .and_then(|n| QualityLevel::from_index(n - 1));
                if let Some(level) = level {
                    controls.set_quality_level(level);
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler<DisplayEvent> for DisplayApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.surface.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, ResourceError::Window(e.to_string()).into()),
        };

        match DisplaySurface::new(window, self.pipeline.buffer(), &self.config) {
            Ok(surface) => {
                surface.window().request_redraw();
                self.surface = Some(surface);
            }
            Err(e) => self.fail(event_loop, e.into()),
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: DisplayEvent) {
        match event {
            DisplayEvent::Render => {
                if let Some(surface) = self.surface.as_ref() {
                    surface.window().request_redraw();
                }
            }
            DisplayEvent::PipelineStopped => match self.pipeline.wait() {
                // Finite source ran dry, keep showing the last frame
                Ok(()) => info!("Pipeline finished, window stays open"),
                Err(e) => self.fail(event_loop, e),
            },
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Window close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::Resized(size) => {
                if let Some(surface) = self.surface.as_mut() {
                    surface.resize(size.width, size.height);
                    surface.window().request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            _ => {}
        }
    }
}

/// Run `source` through the pipeline into a window until it is closed
pub fn run(config: Config, source: Box<dyn FrameSource>) -> Result<(), Error> {
    let event_loop = EventLoop::<DisplayEvent>::with_user_event()
        .build()
        .map_err(|e| ResourceError::Window(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let trigger = Arc::new(RenderTrigger::new());
    let signal = ProxySignal::new(event_loop.create_proxy(), Arc::clone(&trigger));
    let pipeline = Pipeline::start(source, Box::new(signal), &config)?;

    let mut app = DisplayApp::new(config.display, pipeline, trigger);
    event_loop
        .run_app(&mut app)
        .map_err(|e| ResourceError::Window(e.to_string()))?;

    app.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_shows_resolution_and_rates() {
        let filter = FilterConfig {
            mode: Mode::EdgeDetect,
            quality: QualityLevel::High,
        };
        assert_eq!(
            status_title("EdgeView", 29.94, 3.456, &filter, Some((640, 480))),
            "EdgeView | 640x480 | 29.9 fps | 3.46 ms | edges High"
        );

        let raw = FilterConfig {
            mode: Mode::RawPassthrough,
            ..filter
        };
        assert_eq!(
            status_title("EdgeView", 0.0, 0.0, &raw, None),
            "EdgeView | no frame | 0.0 fps | 0.00 ms | raw"
        );
    }
}
