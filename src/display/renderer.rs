//! Textured full-screen quad fed from packed RGB frames

use bytemuck::{Pod, Zeroable};
use tracing::{debug, info, instrument};
use wgpu::util::DeviceExt;
use wgpu::*;

use crate::capture::frame::{rgb_len, PixelFormat};
use crate::capture::DisplayFrame;
use crate::error::{FormatError, ResourceError};

const SHADER: &str = include_str!("shader.wgsl");

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
    uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    fn layout() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

// Texture row 0 is the top of the image
const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    Vertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    Vertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    Vertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Region of the surface the quad is drawn into, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Place a `frame_width` x `frame_height` image on the surface.
///
/// Stretches over the whole surface unless `preserve_aspect` is set, in which
/// case the image is scaled to fit and centered with black bars.
pub fn fit_viewport(
    surface_width: u32,
    surface_height: u32,
    frame_width: u32,
    frame_height: u32,
    preserve_aspect: bool,
) -> Viewport {
    let (sw, sh) = (surface_width as f32, surface_height as f32);
    let full = Viewport {
        x: 0.0,
        y: 0.0,
        width: sw,
        height: sh,
    };
    if !preserve_aspect || frame_width == 0 || frame_height == 0 {
        return full;
    }

    let scale = (sw / frame_width as f32).min(sh / frame_height as f32);
    let width = (frame_width as f32 * scale).min(sw);
    let height = (frame_height as f32 * scale).min(sh);
    Viewport {
        x: ((sw - width) / 2.0).floor(),
        y: ((sh - height) / 2.0).floor(),
        width,
        height,
    }
}

/// Expand tightly packed RGB into RGBA with opaque alpha.
///
/// `rgb` must hold exactly `width * height * 3` bytes. `out` is reused across
/// calls so steady-state uploads do not allocate.
pub fn rgb_to_rgba(
    rgb: &[u8],
    width: u32,
    height: u32,
    out: &mut Vec<u8>,
) -> Result<(), FormatError> {
    if width == 0 || height == 0 {
        return Err(FormatError::InvalidDimensions { width, height });
    }
    let expected = rgb_len(width, height);
    if rgb.len() != expected {
        return Err(FormatError::PayloadSize {
            format: PixelFormat::Rgb24,
            width,
            height,
            expected,
            actual: rgb.len(),
        });
    }

    out.clear();
    out.reserve(expected / 3 * 4);
    for px in rgb.chunks_exact(3) {
        out.extend_from_slice(&[px[0], px[1], px[2], u8::MAX]);
    }
    Ok(())
}

struct FrameTexture {
    texture: Texture,
    bind_group: BindGroup,
    width: u32,
    height: u32,
}

/// Owns the GPU texture and the quad it is drawn on.
///
/// The last uploaded frame stays in the texture, so a draw without a new
/// upload repeats the previous image.
pub struct QuadRenderer {
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    texture_format: TextureFormat,
    frame: Option<FrameTexture>,
    staging: Vec<u8>,
}

impl QuadRenderer {
    /// Build the render pipeline for a target of `target_format`.
    ///
    /// Shader compilation and pipeline validation errors are reported instead
    /// of being left to the device's uncaptured error handler.
    #[instrument(skip(device))]
    pub fn new(device: &Device, target_format: TextureFormat) -> Result<Self, ResourceError> {
        device.push_error_scope(ErrorFilter::Validation);

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Frame Shader"),
            source: ShaderSource::Wgsl(SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Frame Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Frame Pipeline"),
            layout: Some(&pipeline_layout),
            cache: None,
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout()],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(ColorTargetState {
                    format: target_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(ResourceError::Shader(err.to_string()));
        }

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("Frame Sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            ..Default::default()
        });

        let vertex_buffer = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("Quad Vertices"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("Quad Indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: BufferUsages::INDEX,
        });

        // Same encoding as the target so sampled values land unchanged
        let texture_format = if target_format.is_srgb() {
            TextureFormat::Rgba8UnormSrgb
        } else {
            TextureFormat::Rgba8Unorm
        };

        info!(?target_format, ?texture_format, "Quad renderer ready");

        Ok(Self {
            pipeline,
            bind_group_layout,
            sampler,
            vertex_buffer,
            index_buffer,
            texture_format,
            frame: None,
            staging: Vec::new(),
        })
    }

    /// Copy a processed frame into the texture
    pub fn upload(
        &mut self,
        device: &Device,
        queue: &Queue,
        frame: &DisplayFrame,
    ) -> Result<(), FormatError> {
        self.upload_rgb(device, queue, frame.rgb(), frame.width(), frame.height())
    }

    /// Copy packed RGB into the texture, resizing it when the frame size changes.
    #[instrument(level = "debug", skip(self, device, queue, rgb))]
    pub fn upload_rgb(
        &mut self,
        device: &Device,
        queue: &Queue,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(), FormatError> {
        let max = device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(FormatError::TooLarge { width, height, max });
        }
        rgb_to_rgba(rgb, width, height, &mut self.staging)?;

        let size = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let stale = self
            .frame
            .as_ref()
            .map_or(true, |f| f.width != width || f.height != height);
        if stale {
            debug!("Creating {}x{} frame texture", width, height);
            self.frame = Some(self.create_texture(device, size));
        }
        let Some(frame) = self.frame.as_ref() else {
            return Ok(());
        };

        queue.write_texture(
            ImageCopyTexture {
                texture: &frame.texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            &self.staging,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        Ok(())
    }

    /// Size of the texture currently on the GPU, if any frame was uploaded
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame.as_ref().map(|f| (f.width, f.height))
    }

    /// Record the quad into `pass`. Draws nothing before the first upload.
    pub fn draw(&self, pass: &mut RenderPass<'_>, viewport: Viewport) {
        let Some(frame) = self.frame.as_ref() else {
            return;
        };
        if viewport.width < 1.0 || viewport.height < 1.0 {
            return;
        }

        pass.set_viewport(
            viewport.x,
            viewport.y,
            viewport.width,
            viewport.height,
            0.0,
            1.0,
        );
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &frame.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), IndexFormat::Uint16);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
    }

    fn create_texture(&self, device: &Device, size: Extent3d) -> FrameTexture {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("Frame Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: self.texture_format,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        FrameTexture {
            texture,
            bind_group,
            width: size.width,
            height: size.height,
        }
    }
}
