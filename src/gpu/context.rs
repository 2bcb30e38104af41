// ============================================================================
// GPU CONTEXT — wgpu Device, Queue, and adapter initialization
// ============================================================================

use std::sync::Arc;

use crate::config::PainterConfig;
use crate::error::{PainterError, PainterResult};

/// Holds the core wgpu resources shared by every painter component.
/// Created once at startup; everything else borrows from it.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Maximum texture dimension supported by this device.
    pub max_texture_dim: u32,
}

impl GpuContext {
    /// Create a GPU context.  Tries a hardware adapter first, then a
    /// software rasterizer (`force_fallback_adapter`), unless the config
    /// already forces the fallback.
    pub fn new(config: &PainterConfig) -> PainterResult<Self> {
        if !config.force_fallback_adapter {
            match pollster::block_on(Self::new_async(config, false)) {
                Ok(ctx) => return Ok(ctx),
                Err(PainterError::NoAdapter) => {
                    tracing::warn!("hardware adapter unavailable, trying software fallback");
                }
                Err(e) => return Err(e),
            }
        }
        pollster::block_on(Self::new_async(config, true))
    }

    async fn new_async(config: &PainterConfig, force_fallback: bool) -> PainterResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference(),
                compatible_surface: None, // offscreen only; the host owns the surface
                force_fallback_adapter: force_fallback,
            })
            .await
            .ok_or(PainterError::NoAdapter)?;

        let adapter_name = adapter.get_info().name.clone();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("arcdrawer GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .map_err(|e| PainterError::DeviceRequest(e.to_string()))?;

        tracing::info!(
            adapter = %adapter_name,
            fallback = force_fallback,
            max_texture_dim = limits.max_texture_dimension_2d,
            "gpu context ready"
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name,
            max_texture_dim: limits.max_texture_dimension_2d,
        })
    }

    /// Check if a texture of the given dimensions can be created.
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    /// Submit a single encoder's commands.
    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Run `f` inside an error scope and report whatever the scope caught.
    /// Used around allocations and program creation so driver failures
    /// become typed errors instead of uncaptured-error panics.
    pub fn scoped<T>(
        &self,
        filter: wgpu::ErrorFilter,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(filter);
        let value = f(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }
}
