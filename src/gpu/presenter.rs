// ============================================================================
// PRESENTER — graded draw of the canvas onto an output view
// ============================================================================
//
// Reads the canvas, applies saturation then hue rotation, writes the result
// to whatever view the host hands in.  The canvas itself is never written.
// ============================================================================

use bytemuck::{Pod, Zeroable};

use crate::error::{PainterError, PainterResult};
use crate::grade::hue_rotation_matrix;

use super::context::GpuContext;
use super::pool::{RenderTargetPool, TargetId};
use super::programs::ProgramCache;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PresentUniforms {
    /// Rows of the hue matrix, one per output channel (xyz used).
    pub hue_rows: [[f32; 4]; 3],
    pub saturation: f32,
    pub _pad: [f32; 3],
}

impl PresentUniforms {
    pub fn new(saturation: f32, hue_deg: f32) -> Self {
        let m = hue_rotation_matrix(hue_deg);
        Self {
            hue_rows: m.map(|[a, b, c]| [a, b, c, 0.0]),
            saturation,
            _pad: [0.0; 3],
        }
    }
}

/// Bind groups are built once; the canvas group is rebuilt only when the
/// canvas target changes (resize).
pub struct Presenter {
    uniforms: wgpu::Buffer,
    uniform_bg: wgpu::BindGroup,
    canvas_bg: Option<(TargetId, wgpu::BindGroup)>,
}

impl Presenter {
    pub fn new(device: &wgpu::Device, programs: &ProgramCache) -> Self {
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("present_uniform_buf"),
            size: std::mem::size_of::<PresentUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bg = programs.uniform_bind_group(device, &uniforms, "present_uniform_bg");
        Self {
            uniforms,
            uniform_bg,
            canvas_bg: None,
        }
    }

    /// Point the presenter at `canvas`.  Must be called again whenever the
    /// canvas target is replaced.
    pub fn bind_canvas(
        &mut self,
        device: &wgpu::Device,
        programs: &ProgramCache,
        pool: &RenderTargetPool,
        canvas: TargetId,
    ) -> PainterResult<()> {
        let target = pool.get(canvas)?;
        let bg = programs.sample_bind_group(device, &target.view);
        self.canvas_bg = Some((canvas, bg));
        tracing::debug!(?canvas, "presenter bound to canvas");
        Ok(())
    }

    pub fn bound_canvas(&self) -> Option<TargetId> {
        self.canvas_bg.as_ref().map(|(id, _)| *id)
    }

    /// Draw `canvas` into `output` with the given grade.  `format` must be
    /// one the program cache built a present pipeline for.
    #[allow(clippy::too_many_arguments)]
    pub fn present(
        &self,
        ctx: &GpuContext,
        programs: &ProgramCache,
        pool: &RenderTargetPool,
        canvas: TargetId,
        output: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        saturation: f32,
        hue_deg: f32,
    ) -> PainterResult<()> {
        let pipeline = programs.present_pipeline(format).ok_or_else(|| {
            PainterError::compile("present", format!("no present program for {format:?}"))
        })?;
        // stale ids are rejected by the pool before the cached group is used
        pool.get(canvas)?;
        let canvas_bg = match &self.canvas_bg {
            Some((id, bg)) if *id == canvas => bg,
            _ => return Err(PainterError::UnknownTarget(canvas.slot())),
        };

        ctx.queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&PresentUniforms::new(saturation, hue_deg)),
        );

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("present_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("present_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: output,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.uniform_bg, &[]);
            pass.set_bind_group(1, canvas_bg, &[]);
            pass.draw(0..3, 0..1);
        }
        ctx.submit_one(encoder);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_are_std140_sized() {
        assert_eq!(std::mem::size_of::<PresentUniforms>(), 64);
    }

    #[test]
    fn neutral_grade_packs_identity_rows() {
        let u = PresentUniforms::new(1.0, 0.0);
        for (i, row) in u.hue_rows.iter().enumerate() {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((row[j] - expected).abs() < 1e-5, "row {i} col {j}: {}", row[j]);
            }
            assert_eq!(row[3], 0.0);
        }
        assert_eq!(u.saturation, 1.0);
    }
}
