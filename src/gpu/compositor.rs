// ============================================================================
// COMPOSITOR — per-stroke pipeline: stamps → scratch → blur → canvas
// ============================================================================
//
//   1. clear scratch A
//   2. instanced draws of the stamps into A (premultiplied "over", so
//      overlapping stamps of the same stroke blend with each other first);
//      one draw unless the stroke is longer than a draw batch
//   3. sigma > 0: horizontal blur A → B, vertical blur B → A
//   4. A over the canvas (premultiplied "over")
//
// Extra batches are submitted ahead; the last batch, blur and composite
// share one encoder.  Everything is submitted before returning, so the
// canvas write is complete from the caller's point of view.
// ============================================================================

use wgpu::util::DeviceExt;

use crate::error::PainterResult;
use crate::stroke::Stamp;

use super::blur::{BlurAxis, BlurKernel, BlurUniforms, encode_blur_pass};
use super::context::GpuContext;
use super::pool::{RenderTargetPool, TargetId};
use super::programs::{BrushUniforms, ProgramCache};
use super::texture::RenderTarget;

/// The persistent canvas and its two same-sized scratch buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasTargets {
    pub canvas: TargetId,
    pub scratch: [TargetId; 2],
}

pub struct Compositor {
    brush_uniforms: wgpu::Buffer,
    /// Separate buffers per axis: both passes share one submit.
    blur_uniforms: [wgpu::Buffer; 2],
    radius_cap: u32,
}

impl Compositor {
    pub fn new(device: &wgpu::Device, radius_cap: u32) -> Self {
        let brush_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("brush_uniform_buf"),
            contents: bytemuck::bytes_of(&BrushUniforms {
                resolution: [1.0, 1.0],
                _pad: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let blur_buffer = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: std::mem::size_of::<BlurUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            brush_uniforms,
            blur_uniforms: [blur_buffer("blur_uniform_h"), blur_buffer("blur_uniform_v")],
            radius_cap,
        }
    }

    /// Rasterize `stamps`, blur with `sigma`, and blend the result over the
    /// canvas.
    pub fn composite_stroke(
        &self,
        ctx: &GpuContext,
        programs: &mut ProgramCache,
        pool: &RenderTargetPool,
        targets: CanvasTargets,
        stamps: &[Stamp],
        sigma: f32,
    ) -> PainterResult<()> {
        let device = &ctx.device;
        let queue = &ctx.queue;

        let canvas = pool.get(targets.canvas)?;
        let scratch_a = pool.get(targets.scratch[0])?;
        let scratch_b = pool.get(targets.scratch[1])?;

        queue.write_buffer(
            &self.brush_uniforms,
            0,
            bytemuck::bytes_of(&BrushUniforms {
                resolution: [scratch_a.width as f32, scratch_a.height as f32],
                _pad: [0.0; 2],
            }),
        );
        let brush_bg = programs.uniform_bind_group(device, &self.brush_uniforms, "brush_uniform_bg");

        // ---- Stamps → scratch A (cleared by the first batch) ----
        let mut batches: Vec<&[Stamp]> = stamps.chunks(programs.max_instances_per_draw.max(1)).collect();
        let last = batches.pop().unwrap_or(&[]);
        for (i, batch) in batches.iter().enumerate() {
            programs.upload_stamps(ctx, batch)?;
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("stamp_batch_encoder"),
            });
            encode_stamp_pass(&mut encoder, programs, &brush_bg, scratch_a, batch.len(), i == 0);
            ctx.submit_one(encoder);
        }
        programs.upload_stamps(ctx, last)?;
        let programs = &*programs;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("stroke_encoder"),
        });
        encode_stamp_pass(&mut encoder, programs, &brush_bg, scratch_a, last.len(), batches.is_empty());

        // ---- Separable blur A → B → A ----
        if let Some(kernel) = BlurKernel::new(sigma, self.radius_cap) {
            let [h_buf, v_buf] = &self.blur_uniforms;
            queue.write_buffer(
                h_buf,
                0,
                bytemuck::bytes_of(&BlurUniforms::new(BlurAxis::Horizontal, &kernel)),
            );
            queue.write_buffer(
                v_buf,
                0,
                bytemuck::bytes_of(&BlurUniforms::new(BlurAxis::Vertical, &kernel)),
            );
            encode_blur_pass(&mut encoder, device, programs, h_buf, scratch_a, scratch_b);
            encode_blur_pass(&mut encoder, device, programs, v_buf, scratch_b, scratch_a);
        }

        // ---- Scratch A over canvas ----
        let src_bg = programs.load_bind_group(device, &scratch_a.view);
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &canvas.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&programs.composite_pipeline);
            pass.set_bind_group(0, &src_bg, &[]);
            pass.draw(0..3, 0..1);
        }

        ctx.submit_one(encoder);
        tracing::debug!(stamps = stamps.len(), sigma, "stroke composited");
        Ok(())
    }
}

fn encode_stamp_pass(
    encoder: &mut wgpu::CommandEncoder,
    programs: &ProgramCache,
    brush_bg: &wgpu::BindGroup,
    target: &RenderTarget,
    count: usize,
    clear: bool,
) {
    let load = if clear {
        wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
    } else {
        wgpu::LoadOp::Load
    };
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("stamp_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &target.view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    if count > 0 {
        pass.set_pipeline(&programs.brush_pipeline);
        pass.set_bind_group(0, brush_bg, &[]);
        pass.set_vertex_buffer(0, programs.quad_buffer.slice(..));
        pass.set_vertex_buffer(1, programs.instance_buffer().slice(..));
        pass.draw(0..6, 0..count as u32);
    }
}
