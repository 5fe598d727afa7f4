//! WebGPU window surface that redraws on demand from the frame buffer

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use wgpu::*;
use winit::window::Window;

use crate::display::renderer::{fit_viewport, QuadRenderer};
use crate::error::{Error, ResourceError};
use crate::pipeline::FrameBuffer;
use crate::DisplayConfig;

/// GPU context bound to one window, consumer side of the [`FrameBuffer`].
///
/// Only constructed fully initialized, so there is no draw-before-init state.
pub struct DisplaySurface {
    window: Arc<Window>,
    surface: Surface<'static>,
    device: Device,
    queue: Queue,
    surface_config: SurfaceConfiguration,
    renderer: QuadRenderer,
    buffer: Arc<FrameBuffer>,
    preserve_aspect: bool,
}

impl DisplaySurface {
    /// Acquire an adapter and device for `window` and configure its surface
    #[instrument(skip_all)]
    pub fn new(
        window: Arc<Window>,
        buffer: Arc<FrameBuffer>,
        config: &DisplayConfig,
    ) -> Result<Self, ResourceError> {
        pollster::block_on(Self::init(window, buffer, config))
    }

    async fn init(
        window: Arc<Window>,
        buffer: Arc<FrameBuffer>,
        config: &DisplayConfig,
    ) -> Result<Self, ResourceError> {
        info!("Initializing WebGPU display");

        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ResourceError::NoAdapter)?;

        let info = adapter.get_info();
        info!("GPU: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("EdgeView Device"),
                    required_features: Features::empty(),
                    required_limits: Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(TextureFormat::is_srgb)
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| ResourceError::Window("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(CompositeAlphaMode::Auto);

        let size = window.inner_size();
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if config.vsync {
                PresentMode::AutoVsync
            } else {
                PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&device, &surface_config);

        let renderer = QuadRenderer::new(&device, format)?;

        Ok(Self {
            window,
            surface,
            device,
            queue,
            surface_config,
            renderer,
            buffer,
            preserve_aspect: config.preserve_aspect,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Size of the last frame put on screen
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.renderer.frame_size()
    }

    /// Viewport size changed. Zero-sized (minimized) windows keep the old configuration.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        debug!("Surface resized to {}x{}", width, height);
    }

    /// Upload the newest frame, if any, then draw the texture.
    ///
    /// Without a new frame the previous texture is drawn again. A frame that
    /// fails upload validation is dropped and reported as [`Error::Format`].
    #[instrument(level = "debug", skip(self))]
    pub fn render(&mut self) -> Result<(), Error> {
        let render_start = Instant::now();

        if let Some(frame) = self.buffer.take_if_dirty() {
            self.renderer.upload(&self.device, &self.queue, &frame)?;
            if let Some(latency) = Instant::now().checked_duration_since(frame.captured_at()) {
                metrics::histogram!("edgeview_frame_latency_ms")
                    .record(latency.as_secs_f64() * 1000.0);
            }
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                warn!("Surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
                self.window.request_redraw();
                return Ok(());
            }
            Err(SurfaceError::Timeout) => {
                debug!("Surface timed out, skipping draw");
                return Ok(());
            }
            Err(e) => return Err(ResourceError::Surface(e).into()),
        };

        let view = output
            .texture
            .create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some((width, height)) = self.renderer.frame_size() {
                let viewport = fit_viewport(
                    self.surface_config.width,
                    self.surface_config.height,
                    width,
                    height,
                    self.preserve_aspect,
                );
                self.renderer.draw(&mut pass, viewport);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();

        metrics::histogram!("edgeview_render_time_us")
            .record(render_start.elapsed().as_micros() as f64);

        Ok(())
    }
}
