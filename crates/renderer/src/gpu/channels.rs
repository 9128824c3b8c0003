use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::types::CHANNEL_COUNT;

use super::target::TARGET_FORMAT;

/// Shared sampling state for `iChannel0`/`iChannel1`.
///
/// Unbound channels sample a 1×1 transparent placeholder so every program can
/// use the same bind group layout whether or not it reads its inputs.
pub(crate) struct ChannelResources {
    pub layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    _placeholder: wgpu::Texture,
    placeholder_view: wgpu::TextureView,
}

impl ChannelResources {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("channel layout"),
            entries: &build_channel_layout_entries(),
        });

        let placeholder = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("placeholder channel texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TARGET_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            &[0u8, 0, 0, 0],
        );
        let placeholder_view = placeholder.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("channel sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            layout,
            sampler,
            _placeholder: placeholder,
            placeholder_view,
        }
    }

    /// Binds the given views, substituting the placeholder for `None`.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        inputs: [Option<&wgpu::TextureView>; CHANNEL_COUNT],
    ) -> wgpu::BindGroup {
        let views = inputs.map(|input| input.unwrap_or(&self.placeholder_view));
        let mut entries = Vec::with_capacity(CHANNEL_COUNT * 2);
        for (index, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: (index as u32) * 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: (index as u32) * 2 + 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("channel bind group"),
            layout: &self.layout,
            entries: &entries,
        })
    }
}

fn build_channel_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(CHANNEL_COUNT * 2);
    for index in 0..CHANNEL_COUNT as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}
