// ============================================================================
// RENDER TARGET POOL — arena of GPU color buffers with explicit lifetimes
// ============================================================================
//
// Targets are addressed by `TargetId` (slot index + generation).  Nothing is
// reclaimed implicitly: every `create` must be paired with one `destroy`.  A
// stale id (already destroyed, or its slot reused) is reported as
// `UnknownTarget` instead of touching someone else's texture.
// ============================================================================

use crate::error::{PainterError, PainterResult};

use super::context::GpuContext;
use super::texture::RenderTarget;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId {
    index: u32,
    generation: u32,
}

impl TargetId {
    pub(crate) fn slot(&self) -> u32 {
        self.index
    }
}

struct Slot {
    generation: u32,
    target: Option<RenderTarget>,
}

pub struct RenderTargetPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl RenderTargetPool {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Allocate a transparent `width`×`height` target.
    pub fn create(
        &mut self,
        ctx: &GpuContext,
        width: u32,
        height: u32,
        label: &str,
    ) -> PainterResult<TargetId> {
        if width == 0 || height == 0 {
            return Err(PainterError::InvalidDimensions { width, height });
        }
        if !ctx.supports_size(width, height) {
            return Err(PainterError::exhausted(format!(
                "{width}x{height} exceeds device limit {}",
                ctx.max_texture_dim
            )));
        }

        let (target, error) = ctx.scoped(wgpu::ErrorFilter::OutOfMemory, |device| {
            RenderTarget::new(device, width, height, label)
        });
        if let Some(e) = error {
            target.texture.destroy();
            tracing::error!(%e, width, height, "render target allocation failed");
            return Err(PainterError::exhausted(e.to_string()));
        }

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.target = Some(target);
                TargetId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    target: Some(target),
                });
                TargetId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        Ok(id)
    }

    /// Release the target's GPU memory.  The id is invalid afterwards.
    pub fn destroy(&mut self, id: TargetId) -> PainterResult<()> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .ok_or(PainterError::UnknownTarget(id.index))?;
        let target = slot.target.take().ok_or(PainterError::UnknownTarget(id.index))?;
        target.texture.destroy();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Ok(())
    }

    pub fn get(&self, id: TargetId) -> PainterResult<&RenderTarget> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.target.as_ref())
            .ok_or(PainterError::UnknownTarget(id.index))
    }

    /// Direct GPU copy `src` → `dst`; no shader pass.
    pub fn copy(&self, ctx: &GpuContext, src: TargetId, dst: TargetId) -> PainterResult<()> {
        let s = self.get(src)?;
        let d = self.get(dst)?;
        if !s.same_size(d) {
            return Err(PainterError::DimensionMismatch {
                src_w: s.width,
                src_h: s.height,
                dst_w: d.width,
                dst_h: d.height,
            });
        }
        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("target_copy_encoder"),
        });
        d.encode_copy_from(&mut encoder, s);
        ctx.submit_one(encoder);
        Ok(())
    }

    /// Allocate a new target holding a copy of `src`.
    pub fn duplicate(&mut self, ctx: &GpuContext, src: TargetId, label: &str) -> PainterResult<TargetId> {
        let (w, h) = {
            let s = self.get(src)?;
            (s.width, s.height)
        };
        let copy = self.create(ctx, w, h, label)?;
        if let Err(e) = self.copy(ctx, src, copy) {
            let _ = self.destroy(copy);
            return Err(e);
        }
        Ok(copy)
    }

    pub fn clear(&self, ctx: &GpuContext, id: TargetId) -> PainterResult<()> {
        let target = self.get(id)?;
        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("target_clear_encoder"),
        });
        target.encode_clear(&mut encoder);
        ctx.submit_one(encoder);
        Ok(())
    }

    pub fn read_pixels(&self, ctx: &GpuContext, id: TargetId) -> PainterResult<Vec<u8>> {
        self.get(id)?.read_pixels(ctx)
    }

    /// Number of live (created, not yet destroyed) targets.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.target.is_some()).count()
    }

    /// Approximate GPU memory held by live targets (bytes).
    pub fn live_memory_bytes(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|s| s.target.as_ref())
            .map(RenderTarget::memory_bytes)
            .sum()
    }

    /// Destroy every live target (teardown).
    pub fn destroy_all(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(target) = slot.target.take() {
                target.texture.destroy();
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
    }
}

impl Default for RenderTargetPool {
    fn default() -> Self {
        Self::new()
    }
}
