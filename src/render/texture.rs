//! Texture holding the most recent simulation image
//!
//! One texture sized to the grid, refreshed from the host pixel buffer every
//! frame and sampled by the blit pass.

use crate::grid::{GridDims, PixelBuffer};

/// GPU texture, view and sampler bundled for the blit pass
pub struct PixelTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    dims: GridDims,
}

impl PixelTexture {
    /// Matches the byte order the transition kernel writes
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(device: &wgpu::Device, dims: GridDims) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Grid Image"),
            size: Self::extent(dims),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Nearest filtering: one cell maps to a solid block of screen pixels
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Grid Image Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            dims,
        }
    }

    fn extent(dims: GridDims) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: dims.width,
            height: dims.height,
            depth_or_array_layers: 1,
        }
    }

    /// Copies `pixels` into the texture; sizes must match
    pub fn upload(&self, queue: &wgpu::Queue, pixels: &PixelBuffer) {
        debug_assert_eq!(pixels.dims(), self.dims);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.dims.width),
                rows_per_image: Some(self.dims.height),
            },
            Self::extent(self.dims),
        );
    }
}
