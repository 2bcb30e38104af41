// ============================================================================
// GPU MODULE — stroke compositing and presentation on wgpu
// ============================================================================
//
// Architecture:
//   context.rs    — wgpu Device, Queue, adapter init
//   shaders.rs    — all WGSL shader source (inline strings)
//   texture.rs    — RenderTarget wrapper, clears, copies, readback
//   pool.rs       — generational arena of render targets
//   programs.rs   — brush / blur / composite / present pipelines
//   blur.rs       — Gaussian kernel and one-axis blur pass
//   compositor.rs — stamps → scratch → blur → canvas
//   presenter.rs  — saturation/hue graded draw to the visible surface
//   renderer.rs   — top-level Painter coordinator
// ============================================================================

pub mod blur;
pub mod compositor;
pub mod context;
pub mod pool;
pub mod presenter;
pub mod programs;
pub mod renderer;
pub mod shaders;
pub mod texture;

pub use renderer::Painter;
