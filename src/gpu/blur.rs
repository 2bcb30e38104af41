// ============================================================================
// SEPARABLE GAUSSIAN BLUR — kernel construction and pass encoding
// ============================================================================

use bytemuck::{Pod, Zeroable};

use crate::config::MAX_BLUR_RADIUS;

use super::programs::ProgramCache;
use super::texture::RenderTarget;

/// vec4 slots in the shader's weight table (4 * 9 = 36 >= 33 taps).
const WEIGHT_VEC4S: usize = 9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlurAxis {
    Horizontal,
    Vertical,
}

impl BlurAxis {
    fn direction(self) -> [i32; 2] {
        match self {
            BlurAxis::Horizontal => [1, 0],
            BlurAxis::Vertical => [0, 1],
        }
    }
}

/// One-sided Gaussian weights: `weights[0]` is the centre tap, `weights[i]`
/// applies to both `+i` and `-i`.  Normalized so that
/// `weights[0] + 2 * sum(weights[1..]) == 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct BlurKernel {
    pub radius: u32,
    pub weights: Vec<f32>,
}

impl BlurKernel {
    /// `None` when sigma is not positive: the blur stage is skipped.
    pub fn new(sigma: f32, radius_cap: u32) -> Option<Self> {
        if sigma.is_nan() || sigma <= 0.0 {
            return None;
        }
        let cap = radius_cap.min(MAX_BLUR_RADIUS);
        let radius = ((3.0 * sigma).ceil() as u32).min(cap);

        let mut weights: Vec<f32> = (0..=radius)
            .map(|i| {
                let x = i as f32 / sigma;
                (-0.5 * x * x).exp()
            })
            .collect();
        let norm = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
        for w in &mut weights {
            *w /= norm;
        }
        Some(Self { radius, weights })
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct BlurUniforms {
    pub direction: [i32; 2],
    pub radius: i32,
    pub _pad: i32,
    pub weights: [[f32; 4]; WEIGHT_VEC4S],
}

impl BlurUniforms {
    pub fn new(axis: BlurAxis, kernel: &BlurKernel) -> Self {
        let mut weights = [[0.0f32; 4]; WEIGHT_VEC4S];
        for (i, w) in kernel.weights.iter().enumerate() {
            weights[i / 4][i % 4] = *w;
        }
        Self {
            direction: axis.direction(),
            radius: kernel.radius as i32,
            _pad: 0,
            weights,
        }
    }
}

/// Record one blur pass reading `src` and overwriting `dst`.
pub fn encode_blur_pass(
    encoder: &mut wgpu::CommandEncoder,
    device: &wgpu::Device,
    programs: &ProgramCache,
    uniforms: &wgpu::Buffer,
    src: &RenderTarget,
    dst: &RenderTarget,
) {
    let uniform_bg = programs.uniform_bind_group(device, uniforms, "blur_uniform_bg");
    let src_bg = programs.load_bind_group(device, &src.view);

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("blur_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &dst.view,
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
    pass.set_pipeline(&programs.blur_pipeline);
    pass.set_bind_group(0, &uniform_bg, &[]);
    pass.set_bind_group(1, &src_bg, &[]);
    pass.draw(0..3, 0..1);
}

/// CPU reference of one blur pass over premultiplied RGBA f32 pixels,
/// matching the shader's edge clamping.
pub fn blur_axis_cpu(src: &[[f32; 4]], width: usize, height: usize, axis: BlurAxis, kernel: &BlurKernel) -> Vec<[f32; 4]> {
    let r = kernel.radius as isize;
    let [dx, dy] = axis.direction().map(|d| d as isize);
    let mut out = vec![[0.0f32; 4]; src.len()];
    for y in 0..height as isize {
        for x in 0..width as isize {
            let mut acc = [0.0f32; 4];
            for i in -r..=r {
                let sx = (x + dx * i).clamp(0, width as isize - 1) as usize;
                let sy = (y + dy * i).clamp(0, height as isize - 1) as usize;
                let w = kernel.weights[i.unsigned_abs()];
                let px = src[sy * width + sx];
                for c in 0..4 {
                    acc[c] += px[c] * w;
                }
            }
            out[y as usize * width + x as usize] = acc;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_sigma_skips_blur() {
        assert!(BlurKernel::new(0.0, 32).is_none());
        assert!(BlurKernel::new(-2.0, 32).is_none());
        assert!(BlurKernel::new(f32::NAN, 32).is_none());
    }

    #[test]
    fn radius_is_three_sigma_capped() {
        assert_eq!(BlurKernel::new(1.0, 32).unwrap().radius, 3);
        assert_eq!(BlurKernel::new(2.4, 32).unwrap().radius, 8);
        assert_eq!(BlurKernel::new(50.0, 32).unwrap().radius, 32);
        assert_eq!(BlurKernel::new(50.0, 10).unwrap().radius, 10);
        assert_eq!(BlurKernel::new(50.0, 1000).unwrap().radius, MAX_BLUR_RADIUS);
    }

    #[test]
    fn weights_normalize_over_both_sides() {
        for sigma in [0.3, 1.0, 6.0, 20.0] {
            let k = BlurKernel::new(sigma, 32).unwrap();
            let total = k.weights[0] + 2.0 * k.weights[1..].iter().sum::<f32>();
            assert!((total - 1.0).abs() < 1e-5, "sigma {sigma}: {total}");
            assert!(k.weights.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn uniforms_pack_weights_in_order() {
        let k = BlurKernel::new(2.0, 32).unwrap();
        let u = BlurUniforms::new(BlurAxis::Vertical, &k);
        assert_eq!(u.direction, [0, 1]);
        assert_eq!(u.radius, 6);
        assert_eq!(u.weights[0][0], k.weights[0]);
        assert_eq!(u.weights[1][2], k.weights[6]);
        assert_eq!(u.weights[1][3], 0.0);
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 16 + 16 * WEIGHT_VEC4S);
    }

    #[test]
    fn cpu_pass_preserves_flat_fields_and_energy() {
        let k = BlurKernel::new(1.5, 32).unwrap();
        let flat = vec![[0.25, 0.5, 0.75, 1.0]; 16 * 8];
        for px in blur_axis_cpu(&flat, 16, 8, BlurAxis::Horizontal, &k) {
            for c in 0..4 {
                assert!((px[c] - flat[0][c]).abs() < 1e-5);
            }
        }

        // A single lit pixel far from the edges spreads but keeps its sum.
        let mut dot = vec![[0.0; 4]; 32];
        dot[16] = [1.0; 4];
        let out = blur_axis_cpu(&dot, 32, 1, BlurAxis::Horizontal, &k);
        let sum: f32 = out.iter().map(|p| p[3]).sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(out[16][3] < 1.0);
    }
}
