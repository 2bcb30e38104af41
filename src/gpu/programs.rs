// ============================================================================
// PROGRAM CACHE — the fixed set of render pipelines plus instancing buffers
// ============================================================================
//
// Four programs, all built once at startup:
//
//   brush     — instanced capsules, premultiplied "over" into scratch
//   blur      — one axis of the separable Gaussian, no blending
//   composite — scratch over canvas, premultiplied "over"
//   present   — saturation/hue grading onto the visible surface
//
// Each program is built inside a validation error scope; any failure is a
// `ProgramCompileFailure` and the painter cannot start.
// ============================================================================

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::error::{PainterError, PainterResult};
use crate::stroke::Stamp;

use super::context::GpuContext;
use super::texture::TARGET_FORMAT;

/// Unit quad (-0.5..0.5) as two triangles; stretched per stamp.
const BRUSH_QUAD: [[f32; 2]; 6] = [
    [-0.5, -0.5],
    [0.5, -0.5],
    [-0.5, 0.5],
    [-0.5, 0.5],
    [0.5, -0.5],
    [0.5, 0.5],
];

/// Instance buffer starts with room for this many stamps and doubles.
const INITIAL_INSTANCE_CAPACITY: usize = 64;

/// Longest single instanced draw; longer strokes are drawn in batches.
const MAX_INSTANCES_PER_DRAW: usize = 1 << 16;

const STAMP_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    1 => Float32x2, // center
    2 => Float32x2, // size
    3 => Float32,   // angle
    4 => Float32x4, // premultiplied color
    5 => Float32,   // sigma_px
];

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct BrushUniforms {
    pub resolution: [f32; 2],
    pub _pad: [f32; 2],
}

pub struct ProgramCache {
    pub brush_pipeline: wgpu::RenderPipeline,
    pub blur_pipeline: wgpu::RenderPipeline,
    pub composite_pipeline: wgpu::RenderPipeline,
    /// Present pipelines keyed by output format: the configured surface
    /// format, plus `TARGET_FORMAT` for offscreen graded exports.
    present_pipelines: Vec<(wgpu::TextureFormat, wgpu::RenderPipeline)>,

    /// Group with a single uniform buffer (vertex + fragment).
    pub uniform_bgl: wgpu::BindGroupLayout,
    /// Texture read via `textureLoad` (no sampler).
    pub load_bgl: wgpu::BindGroupLayout,
    /// Texture + filtering sampler.
    pub sample_bgl: wgpu::BindGroupLayout,

    pub sampler_linear: wgpu::Sampler,

    pub quad_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    /// Batch size the compositor splits stamp lists into.
    pub max_instances_per_draw: usize,
}

impl ProgramCache {
    pub fn new(ctx: &GpuContext, present_format: wgpu::TextureFormat) -> PainterResult<Self> {
        let device = &ctx.device;

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let load_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("load_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let sample_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sample_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let brush_pipeline = build(ctx, "brush", |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("brush_shader"),
                source: wgpu::ShaderSource::Wgsl(super::shaders::BRUSH_SHADER.into()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("brush_pipeline_layout"),
                bind_group_layouts: &[&uniform_bgl],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("brush_pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_brush",
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                        },
                        wgpu::VertexBufferLayout {
                            array_stride: std::mem::size_of::<Stamp>() as u64,
                            step_mode: wgpu::VertexStepMode::Instance,
                            attributes: &STAMP_ATTRIBUTES,
                        },
                    ],
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_brush",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        // ONE, ONE_MINUS_SRC_ALPHA for color and alpha
                        blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                multiview: None,
            })
        })?;

        let blur_pipeline = build(ctx, "blur", |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("blur_shader"),
                source: wgpu::ShaderSource::Wgsl(super::shaders::BLUR_SHADER.into()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("blur_pipeline_layout"),
                bind_group_layouts: &[&uniform_bgl, &load_bgl],
                push_constant_ranges: &[],
            });
            fullscreen_pipeline(device, "blur_pipeline", &layout, &shader, "fs_blur", TARGET_FORMAT, None)
        })?;

        let composite_pipeline = build(ctx, "composite", |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("composite_shader"),
                source: wgpu::ShaderSource::Wgsl(super::shaders::COMPOSITE_SHADER.into()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("composite_pipeline_layout"),
                bind_group_layouts: &[&load_bgl],
                push_constant_ranges: &[],
            });
            fullscreen_pipeline(
                device,
                "composite_pipeline",
                &layout,
                &shader,
                "fs_composite",
                TARGET_FORMAT,
                Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            )
        })?;

        let mut present_formats = vec![present_format];
        if present_format != TARGET_FORMAT {
            present_formats.push(TARGET_FORMAT);
        }
        let mut present_pipelines = Vec::with_capacity(present_formats.len());
        for format in present_formats {
            let pipeline = build(ctx, "present", |device| {
                let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("present_shader"),
                    source: wgpu::ShaderSource::Wgsl(super::shaders::PRESENT_SHADER.into()),
                });
                let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("present_pipeline_layout"),
                    bind_group_layouts: &[&uniform_bgl, &sample_bgl],
                    push_constant_ranges: &[],
                });
                fullscreen_pipeline(device, "present_pipeline", &layout, &shader, "fs_present", format, None)
            })?;
            present_pipelines.push((format, pipeline));
        }

        let sampler_linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sampler_linear"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("brush_quad"),
            contents: bytemuck::cast_slice(&BRUSH_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let instance_buffer = create_instance_buffer(device, INITIAL_INSTANCE_CAPACITY);

        Ok(Self {
            brush_pipeline,
            blur_pipeline,
            composite_pipeline,
            present_pipelines,
            uniform_bgl,
            load_bgl,
            sample_bgl,
            sampler_linear,
            quad_buffer,
            instance_buffer,
            instance_capacity: INITIAL_INSTANCE_CAPACITY,
            max_instances_per_draw: instances_per_draw(device.limits().max_buffer_size),
        })
    }

    pub fn present_pipeline(&self, format: wgpu::TextureFormat) -> Option<&wgpu::RenderPipeline> {
        self.present_pipelines
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, p)| p)
    }

    /// Upload one batch of stamps, growing the buffer when needed.  A batch
    /// longer than `max_instances_per_draw`, or a buffer the driver cannot
    /// allocate, is `ResourceExhausted`.
    pub fn upload_stamps(&mut self, ctx: &GpuContext, stamps: &[Stamp]) -> PainterResult<()> {
        if stamps.len() > self.max_instances_per_draw {
            return Err(PainterError::exhausted(format!(
                "{} stamps exceed the draw batch of {}",
                stamps.len(),
                self.max_instances_per_draw
            )));
        }
        if stamps.len() > self.instance_capacity {
            let capacity = stamps.len().next_power_of_two().min(self.max_instances_per_draw);
            let (buffer, error) = ctx.scoped(wgpu::ErrorFilter::OutOfMemory, |device| {
                create_instance_buffer(device, capacity)
            });
            if let Some(e) = error {
                buffer.destroy();
                tracing::error!(%e, capacity, "stamp buffer allocation failed");
                return Err(PainterError::exhausted(e.to_string()));
            }
            self.instance_buffer.destroy();
            self.instance_buffer = buffer;
            self.instance_capacity = capacity;
            tracing::debug!(capacity, "grew stamp instance buffer");
        }
        if !stamps.is_empty() {
            ctx.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(stamps));
        }
        Ok(())
    }

    pub fn instance_buffer(&self) -> &wgpu::Buffer {
        &self.instance_buffer
    }

    /// Bind a uniform buffer to group 0 of any program.
    pub fn uniform_bind_group(&self, device: &wgpu::Device, buffer: &wgpu::Buffer, label: &str) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    pub fn load_bind_group(&self, device: &wgpu::Device, view: &wgpu::TextureView) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("load_bg"),
            layout: &self.load_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            }],
        })
    }

    pub fn sample_bind_group(&self, device: &wgpu::Device, view: &wgpu::TextureView) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sample_bg"),
            layout: &self.sample_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler_linear),
                },
            ],
        })
    }
}

fn build<T>(
    ctx: &GpuContext,
    program: &'static str,
    f: impl FnOnce(&wgpu::Device) -> T,
) -> PainterResult<T> {
    let (value, error) = ctx.scoped(wgpu::ErrorFilter::Validation, f);
    match error {
        Some(e) => {
            tracing::error!(program, %e, "program failed validation");
            Err(PainterError::compile(program, e.to_string()))
        }
        None => Ok(value),
    }
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    fs_entry: &str,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_fullscreen",
            buffers: &[],
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: fs_entry,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview: None,
    })
}

/// Stamps that fit in one vertex buffer of at most `max_buffer_size` bytes.
fn instances_per_draw(max_buffer_size: u64) -> usize {
    let fit = max_buffer_size / std::mem::size_of::<Stamp>() as u64;
    (fit.min(MAX_INSTANCES_PER_DRAW as u64) as usize).max(1)
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("stamp_instances"),
        size: (capacity * std::mem::size_of::<Stamp>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_batches_fit_the_buffer_limit() {
        // downlevel default max_buffer_size
        assert_eq!(instances_per_draw(256 << 20), MAX_INSTANCES_PER_DRAW);
        assert_eq!(instances_per_draw(400), 10);
        assert_eq!(instances_per_draw(439), 10);
        assert_eq!(instances_per_draw(0), 1);
    }
}
