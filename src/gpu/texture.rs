// ============================================================================
// RENDER TARGET — one color texture usable as attachment, sample source,
// and copy source/destination
// ============================================================================

use crate::error::{PainterError, PainterResult};

use super::context::GpuContext;

/// Every target shares one format so snapshot copies are plain
/// texture-to-texture copies.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A GPU-resident offscreen image.  wgpu zero-initializes new textures, so a
/// fresh target reads back fully transparent.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn same_size(&self, other: &RenderTarget) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn memory_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Record a pass that clears this target to transparent black.
    pub fn encode_clear(&self, encoder: &mut wgpu::CommandEncoder) {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear_target"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
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
    }

    /// Record a pixel-exact copy of `src` into this target.
    pub fn encode_copy_from(&self, encoder: &mut wgpu::CommandEncoder, src: &RenderTarget) {
        encoder.copy_texture_to_texture(
            src.texture.as_image_copy(),
            self.texture.as_image_copy(),
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Read the whole target back as tightly packed RGBA8 (premultiplied,
    /// exactly as stored).  Blocks until the GPU has finished.
    pub fn read_pixels(&self, ctx: &GpuContext) -> PainterResult<Vec<u8>> {
        self.read_pixels_banded(ctx, ctx.device.limits().max_buffer_size)
    }

    /// Readback through a staging buffer of at most `max_staging_bytes`,
    /// copying as many whole rows per round trip as fit.
    pub(crate) fn read_pixels_banded(&self, ctx: &GpuContext, max_staging_bytes: u64) -> PainterResult<Vec<u8>> {
        let device = &ctx.device;
        let bytes_per_row = aligned_bytes_per_row(self.width);
        let band = band_rows(self.height, bytes_per_row, max_staging_bytes).ok_or_else(|| {
            PainterError::exhausted(format!(
                "one {}px row ({bytes_per_row} bytes) exceeds the staging limit of {max_staging_bytes}",
                self.width
            ))
        })?;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size: (bytes_per_row * band) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let actual_row = self.width as usize * 4;
        let mut result = Vec::with_capacity(actual_row * self.height as usize);
        let mut y = 0;
        while y < self.height {
            let rows = band.min(self.height - y);
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture: &self.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d { x: 0, y, z: 0 },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::ImageCopyBuffer {
                    buffer: &staging,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(bytes_per_row),
                        rows_per_image: Some(rows),
                    },
                },
                wgpu::Extent3d {
                    width: self.width,
                    height: rows,
                    depth_or_array_layers: 1,
                },
            );
            ctx.submit_one(encoder);

            let slice = staging.slice(..(bytes_per_row * rows) as u64);
            let (tx, rx) = std::sync::mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
            device.poll(wgpu::Maintain::Wait);
            match rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(PainterError::readback(format!("map error: {e:?}"))),
                Err(e) => return Err(PainterError::readback(format!("channel error: {e}"))),
            }

            let mapped = slice.get_mapped_range();
            for row in 0..rows as usize {
                let start = row * bytes_per_row as usize;
                result.extend_from_slice(&mapped[start..start + actual_row]);
            }
            drop(mapped);
            staging.unmap();
            y += rows;
        }
        staging.destroy();

        Ok(result)
    }
}

/// Rows per readback band, or `None` when not even one row fits.
fn band_rows(height: u32, bytes_per_row: u32, max_staging_bytes: u64) -> Option<u32> {
    let fit = max_staging_bytes / bytes_per_row as u64;
    if fit == 0 {
        return None;
    }
    Some(fit.min(height as u64) as u32)
}

/// WGPU requires `bytes_per_row` of buffer copies to be a multiple of 256.
pub(crate) fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(aligned_bytes_per_row(1), 256);
        assert_eq!(aligned_bytes_per_row(64), 256);
        assert_eq!(aligned_bytes_per_row(65), 512);
        assert_eq!(aligned_bytes_per_row(1920), 7680);
    }

    #[test]
    fn readback_bands_fit_the_staging_limit() {
        // 9000x9000 against the downlevel 256 MiB buffer limit
        let bpr = aligned_bytes_per_row(9000);
        let rows = band_rows(9000, bpr, 256 << 20).unwrap();
        assert!(rows < 9000);
        assert!(rows as u64 * bpr as u64 <= 256 << 20);

        assert_eq!(band_rows(10, 256, 1 << 20), Some(10));
        assert_eq!(band_rows(10, 256, 768), Some(3));
        assert_eq!(band_rows(10, 512, 511), None);
    }
}
