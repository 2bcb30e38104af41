// ============================================================================
// PAINTER — top-level coordinator: canvas, scratch buffers, history, grading
// ============================================================================
//
// Owns every GPU resource.  All mutations take `&mut self` and submit their
// command buffers before returning, so a later `present` or readback always
// observes the finished write.
// ============================================================================

use std::ops::ControlFlow;

use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::PainterConfig;
use crate::error::{PainterError, PainterResult};
use crate::frame_loop::FrameLoop;
use crate::history::{HistoryManager, SnapshotStore};
use crate::stroke::{self, StrokeSettings};

use super::compositor::{CanvasTargets, Compositor};
use super::context::GpuContext;
use super::pool::{RenderTargetPool, TargetId};
use super::presenter::Presenter;
use super::programs::ProgramCache;
use super::texture::{RenderTarget, TARGET_FORMAT};

pub struct Painter {
    pub ctx: GpuContext,
    programs: ProgramCache,
    pool: RenderTargetPool,
    compositor: Compositor,
    presenter: Presenter,
    targets: CanvasTargets,
    history: HistoryManager<TargetId>,
    rng: StdRng,
    config: PainterConfig,
    width: u32,
    height: u32,
}

impl Painter {
    /// Bring up the GPU, build every program, and allocate a transparent
    /// `width`×`height` canvas with its scratch buffers.
    pub fn new(config: PainterConfig, width: u32, height: u32) -> PainterResult<Self> {
        Self::with_rng(config, width, height, StdRng::from_entropy())
    }

    /// Same as `new` with a deterministic stroke random source.
    pub fn with_seed(config: PainterConfig, width: u32, height: u32, seed: u64) -> PainterResult<Self> {
        Self::with_rng(config, width, height, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: PainterConfig, width: u32, height: u32, rng: StdRng) -> PainterResult<Self> {
        if width == 0 || height == 0 {
            return Err(PainterError::InvalidDimensions { width, height });
        }
        let ctx = GpuContext::new(&config)?;
        let programs = ProgramCache::new(&ctx, config.present_format())?;
        let compositor = Compositor::new(&ctx.device, config.blur_radius_cap());
        let mut presenter = Presenter::new(&ctx.device, &programs);
        let mut pool = RenderTargetPool::new();
        let targets = allocate_targets(&ctx, &mut pool, width, height)?;
        presenter.bind_canvas(&ctx.device, &programs, &pool, targets.canvas)?;

        tracing::info!(width, height, adapter = %ctx.adapter_name, "painter ready");
        Ok(Self {
            ctx,
            programs,
            pool,
            compositor,
            presenter,
            targets,
            history: HistoryManager::new(),
            rng,
            config,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn config(&self) -> &PainterConfig {
        &self.config
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    /// Canvas, scratch buffers and every history snapshot.
    pub fn live_targets(&self) -> usize {
        self.pool.live_count()
    }

    pub fn live_memory_bytes(&self) -> usize {
        self.pool.live_memory_bytes()
    }

    // ========================================================================
    // STROKES
    // ========================================================================

    /// Generate one procedural stroke starting at `(from_x, from_y)` and
    /// composite it onto the canvas.
    pub fn paint_stroke(&mut self, from_x: f32, from_y: f32, settings: &StrokeSettings) -> PainterResult<()> {
        let stamps = stroke::generate(from_x, from_y, settings, &mut self.rng);
        self.compositor.composite_stroke(
            &self.ctx,
            &mut self.programs,
            &self.pool,
            self.targets,
            &stamps,
            settings.representative_sigma(),
        )
    }

    /// `paint_stroke` with a caller-supplied random source.
    pub fn paint_stroke_with_rng<R: Rng + ?Sized>(
        &mut self,
        from_x: f32,
        from_y: f32,
        settings: &StrokeSettings,
        rng: &mut R,
    ) -> PainterResult<()> {
        let stamps = stroke::generate(from_x, from_y, settings, rng);
        self.compositor.composite_stroke(
            &self.ctx,
            &mut self.programs,
            &self.pool,
            self.targets,
            &stamps,
            settings.representative_sigma(),
        )
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    pub fn capture_restore_point(&mut self, limit: usize) -> PainterResult<()> {
        let mut store = CanvasStore {
            ctx: &self.ctx,
            pool: &mut self.pool,
            canvas: self.targets.canvas,
        };
        self.history.capture_restore_point(&mut store, limit)
    }

    pub fn undo(&mut self) -> PainterResult<bool> {
        let mut store = CanvasStore {
            ctx: &self.ctx,
            pool: &mut self.pool,
            canvas: self.targets.canvas,
        };
        self.history.undo(&mut store)
    }

    pub fn redo(&mut self) -> PainterResult<bool> {
        let mut store = CanvasStore {
            ctx: &self.ctx,
            pool: &mut self.pool,
            canvas: self.targets.canvas,
        };
        self.history.redo(&mut store)
    }

    /// Wipe the canvas to transparent and drop all history.
    pub fn clear(&mut self) -> PainterResult<()> {
        self.pool.clear(&self.ctx, self.targets.canvas)?;
        let mut store = CanvasStore {
            ctx: &self.ctx,
            pool: &mut self.pool,
            canvas: self.targets.canvas,
        };
        self.history.clear(&mut store);
        Ok(())
    }

    /// Reallocate canvas and scratch buffers at the new size.  Contents and
    /// history are discarded.  Resizing to the current size does nothing.
    /// On allocation failure the painter keeps its previous size and state.
    pub fn resize(&mut self, width: u32, height: u32) -> PainterResult<()> {
        if width == self.width && height == self.height {
            return Ok(());
        }
        let targets = allocate_targets(&self.ctx, &mut self.pool, width, height)?;
        if let Err(e) = self
            .presenter
            .bind_canvas(&self.ctx.device, &self.programs, &self.pool, targets.canvas)
        {
            for id in [targets.canvas, targets.scratch[0], targets.scratch[1]] {
                let _ = self.pool.destroy(id);
            }
            return Err(e);
        }

        let mut store = CanvasStore {
            ctx: &self.ctx,
            pool: &mut self.pool,
            canvas: self.targets.canvas,
        };
        self.history.clear(&mut store);
        for id in [self.targets.canvas, self.targets.scratch[0], self.targets.scratch[1]] {
            self.pool.destroy(id)?;
        }

        self.targets = targets;
        self.width = width;
        self.height = height;
        tracing::info!(width, height, "canvas resized");
        Ok(())
    }

    // ========================================================================
    // OUTPUT
    // ========================================================================

    /// Graded draw of the canvas into `output`.  `format` must be the
    /// configured present format or `Rgba8Unorm`.
    pub fn present(
        &self,
        output: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        saturation: f32,
        hue_deg: f32,
    ) -> PainterResult<()> {
        self.presenter.present(
            &self.ctx,
            &self.programs,
            &self.pool,
            self.targets.canvas,
            output,
            format,
            saturation,
            hue_deg,
        )
    }

    /// Present every frame of `frames` until its handle is stopped.  The
    /// first failing present ends the loop with that error.
    pub fn run_presenter(
        &self,
        frames: &FrameLoop,
        output: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        saturation: f32,
        hue_deg: f32,
    ) -> PainterResult<u64> {
        frames.run(|_| match self.present(output, format, saturation, hue_deg) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => ControlFlow::Break(Err(e)),
        })
    }

    /// Raw canvas bytes: tightly packed, premultiplied RGBA8.
    pub fn read_pixels(&self) -> PainterResult<Vec<u8>> {
        self.pool.read_pixels(&self.ctx, self.targets.canvas)
    }

    /// Flattened canvas with straight alpha.
    pub fn export_image(&self) -> PainterResult<RgbaImage> {
        let pixels = self.read_pixels()?;
        to_straight_image(pixels, self.width, self.height)
    }

    /// Flattened canvas as the presenter shows it.
    pub fn export_graded(&self, saturation: f32, hue_deg: f32) -> PainterResult<RgbaImage> {
        let output = RenderTarget::new(&self.ctx.device, self.width, self.height, "graded_export");
        let result = self
            .present(&output.view, TARGET_FORMAT, saturation, hue_deg)
            .and_then(|()| output.read_pixels(&self.ctx));
        output.texture.destroy();
        to_straight_image(result?, self.width, self.height)
    }
}

impl Drop for Painter {
    fn drop(&mut self) {
        self.pool.destroy_all();
    }
}

fn allocate_targets(
    ctx: &GpuContext,
    pool: &mut RenderTargetPool,
    width: u32,
    height: u32,
) -> PainterResult<CanvasTargets> {
    let canvas = pool.create(ctx, width, height, "canvas")?;
    let scratch_a = match pool.create(ctx, width, height, "scratch_a") {
        Ok(id) => id,
        Err(e) => {
            let _ = pool.destroy(canvas);
            return Err(e);
        }
    };
    let scratch_b = match pool.create(ctx, width, height, "scratch_b") {
        Ok(id) => id,
        Err(e) => {
            let _ = pool.destroy(canvas);
            let _ = pool.destroy(scratch_a);
            return Err(e);
        }
    };
    Ok(CanvasTargets {
        canvas,
        scratch: [scratch_a, scratch_b],
    })
}

/// Premultiplied RGBA8 → straight-alpha image.
fn to_straight_image(mut pixels: Vec<u8>, width: u32, height: u32) -> PainterResult<RgbaImage> {
    pixels.par_chunks_exact_mut(4).for_each(|px| {
        let a = px[3] as u32;
        if a == 0 {
            px[..3].fill(0);
        } else if a < 255 {
            for c in &mut px[..3] {
                *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
            }
        }
    });
    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| PainterError::readback("pixel buffer does not match canvas size"))
}

/// History storage backed by the render target pool.  Snapshots are pool
/// targets; restoring copies pixels into the canvas, whose id never changes.
struct CanvasStore<'a> {
    ctx: &'a GpuContext,
    pool: &'a mut RenderTargetPool,
    canvas: TargetId,
}

impl SnapshotStore for CanvasStore<'_> {
    type Snapshot = TargetId;

    fn snapshot(&mut self) -> PainterResult<TargetId> {
        self.pool.duplicate(self.ctx, self.canvas, "history_snapshot")
    }

    fn restore(&mut self, snapshot: &TargetId) -> PainterResult<()> {
        self.pool.copy(self.ctx, *snapshot, self.canvas)
    }

    fn release(&mut self, snapshot: TargetId) {
        if let Err(e) = self.pool.destroy(snapshot) {
            report_release_failure(&e);
        }
    }
}

/// A snapshot id the history owns must always be live.
fn report_release_failure(e: &PainterError) {
    tracing::warn!(%e, "history snapshot already released");
    debug_assert!(false, "history released a dead snapshot: {e}");
}
