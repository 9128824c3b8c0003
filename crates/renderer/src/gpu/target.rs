use image::imageops::flip_vertical_in_place;
use image::RgbaImage;

use crate::error::{RenderError, Result};

/// Color format of every framebuffer; readback is tightly packed RGBA8.
pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const BYTES_PER_PIXEL: u32 = 4;

/// A pixel-backed render target that can also be sampled and copied.
///
/// The texture is destroyed when the framebuffer drops, so replacing a
/// framebuffer on resize releases the old one exactly once.
pub(crate) struct Framebuffer {
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl Framebuffer {
    pub fn new(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
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
        tracing::trace!(label, width, height, "allocated framebuffer");
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Records a clear to transparent black.
    pub fn encode_clear(&self, encoder: &mut wgpu::CommandEncoder) {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("framebuffer clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
    }

    /// Records a full-size copy of `self` into `destination`.
    pub fn encode_copy_to(&self, encoder: &mut wgpu::CommandEncoder, destination: &Framebuffer) {
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &destination.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            self.extent(),
        );
    }

    /// Submits `encoder` with a trailing copy of this framebuffer and returns
    /// tightly packed RGBA8 rows with a top-left origin.
    pub fn read_pixels(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mut encoder: wgpu::CommandEncoder,
    ) -> Result<Vec<u8>> {
        let unpadded_bytes_per_row = self
            .width
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or_else(|| RenderError::Readback("frame width overflow".into()))?;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback buffer"),
            size: u64::from(padded_bytes_per_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            self.extent(),
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| RenderError::Readback(format!("device poll failed: {err}")))?;
        receiver
            .recv()
            .map_err(|_| RenderError::Readback("map callback never fired".into()))?
            .map_err(|err| RenderError::Readback(format!("buffer mapping failed: {err}")))?;

        let frame = {
            let mapped = slice.get_mapped_range();
            copy_tight_rows(&mapped, unpadded_bytes_per_row, padded_bytes_per_row, self.height)?
        };
        readback.unmap();
        readback.destroy();
        flip_to_top_left(frame, self.width, self.height)
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

fn copy_tight_rows(
    mapped: &[u8],
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let required_len = padded_bytes_per_row as usize * height as usize;
    if mapped.len() < required_len {
        return Err(RenderError::Readback(format!(
            "mapped frame too small: expected at least {required_len} bytes, got {}",
            mapped.len()
        )));
    }

    let row = unpadded_bytes_per_row as usize;
    let mut frame = Vec::with_capacity(row * height as usize);
    for chunk in mapped.chunks(padded_bytes_per_row as usize).take(height as usize) {
        frame.extend_from_slice(&chunk[..row]);
    }
    Ok(frame)
}

/// Framebuffers store the bottom row first; consumers expect the top row first.
fn flip_to_top_left(frame: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut image = RgbaImage::from_raw(width, height, frame)
        .ok_or_else(|| RenderError::Readback("readback size does not match frame".into()))?;
    flip_vertical_in_place(&mut image);
    Ok(image.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_aligned_to_copy_alignment() {
        assert_eq!(align_to(4, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn padding_is_dropped_from_each_row() {
        let mut mapped = vec![0u8; 16];
        mapped[..4].copy_from_slice(&[1, 2, 3, 4]);
        mapped[8..12].copy_from_slice(&[5, 6, 7, 8]);
        let frame = copy_tight_rows(&mapped, 4, 8, 2).unwrap();
        assert_eq!(frame, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn short_mapping_is_an_error() {
        assert!(copy_tight_rows(&[0u8; 7], 4, 8, 1).is_err());
    }

    #[test]
    fn flip_puts_last_row_first() {
        let frame = vec![1, 1, 1, 1, 2, 2, 2, 2];
        let flipped = flip_to_top_left(frame, 1, 2).unwrap();
        assert_eq!(flipped, vec![2, 2, 2, 2, 1, 1, 1, 1]);
    }
}
