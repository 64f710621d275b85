//! Read-only asset loading: the equirectangular HDR source and material textures.

use std::path::Path;

use half::f16;
use wgpu::util::DeviceExt;

use crate::error::{RenderError, RenderResult};

// ── HDR source ────────────────────────────────────────────────────────────────

/// Decoded equirectangular radiance map, RGBA32F row-major, top row first.
#[derive(Clone, Debug, PartialEq)]
pub struct HdrImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<f32>,
}

impl HdrImage {
    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let i = ((y * self.width + x) * 4) as usize;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }

    /// Texel data packed as half floats for an `Rgba16Float` upload.
    pub fn to_f16_bytes(&self) -> Vec<u8> {
        let halves: Vec<f16> = self.rgba.iter().map(|&v| f16::from_f32(v)).collect();
        bytemuck::cast_slice(&halves).to_vec()
    }

    /// Upload as a linearly filtered 2-D `Rgba16Float` texture.
    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Texture {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("equirect_hdr"),
                size: wgpu::Extent3d { width: self.width, height: self.height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba16Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &self.to_f16_bytes(),
        );
        Texture::from_texture(device, texture, wgpu::FilterMode::Linear, wgpu::AddressMode::ClampToEdge)
    }
}

/// Load a Radiance `.hdr` file. Failure is fatal to the environment stage.
pub fn load_hdr(path: &Path) -> RenderResult<HdrImage> {
    let img = image::open(path).map_err(|e| RenderError::asset(path, e))?;
    let img = img.to_rgba32f();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(RenderError::asset(path, "empty image"));
    }
    log::info!("loaded HDR {:?} ({}x{})", path, width, height);
    Ok(HdrImage { width, height, rgba: img.into_raw() })
}

// ── Material textures ─────────────────────────────────────────────────────────

/// A sampled 2-D texture with its view and sampler.
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    fn from_texture(
        device: &wgpu::Device,
        texture: wgpu::Texture,
        filter: wgpu::FilterMode,
        address: wgpu::AddressMode,
    ) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        });
        Self { texture, view, sampler }
    }

    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
        srgb: bool,
    ) -> Self {
        let format = if srgb { wgpu::TextureFormat::Rgba8UnormSrgb } else { wgpu::TextureFormat::Rgba8Unorm };
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            pixels,
        );
        Self::from_texture(device, texture, wgpu::FilterMode::Linear, wgpu::AddressMode::Repeat)
    }

    /// Half-float RGBA texture, nearest filtered with repeat wrap.
    pub fn from_rgba_f32(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        texels: &[[f32; 4]],
    ) -> Self {
        let halves: Vec<f16> = texels.iter().flatten().map(|&v| f16::from_f32(v)).collect();
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba16Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(&halves),
        );
        Self::from_texture(device, texture, wgpu::FilterMode::Nearest, wgpu::AddressMode::Repeat)
    }
}

pub const WHITE_TEXEL: [u8; 4] = [255, 255, 255, 255];

/// 1×1 opaque white, bound wherever a material texture is missing.
pub fn default_white_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> Texture {
    Texture::from_rgba8(device, queue, "default_white", 1, 1, &WHITE_TEXEL, false)
}

/// Tangent-space +Z encoded as a normal-map texel.
pub const FLAT_NORMAL_TEXEL: [u8; 4] = [128, 128, 255, 255];

/// 1×1 flat normal map, bound wherever a material has no normal map.
pub fn default_normal_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> Texture {
    Texture::from_rgba8(device, queue, "default_normal", 1, 1, &FLAT_NORMAL_TEXEL, false)
}

/// Load a material texture, falling back to the white default on failure.
pub fn load_texture(device: &wgpu::Device, queue: &wgpu::Queue, path: &Path, srgb: bool) -> Texture {
    match decode_rgba8(path) {
        Ok((w, h, pixels)) => {
            let label = path.to_string_lossy();
            Texture::from_rgba8(device, queue, &label, w, h, &pixels, srgb)
        }
        Err(e) => {
            log::warn!("{e}; using default white texture");
            default_white_texture(device, queue)
        }
    }
}

fn decode_rgba8(path: &Path) -> RenderResult<(u32, u32, Vec<u8>)> {
    let img = image::open(path).map_err(|e| RenderError::asset(path, e))?.to_rgba8();
    let (w, h) = img.dimensions();
    Ok((w, h, img.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_hdr_is_an_asset_error() {
        let err = load_hdr(Path::new("does/not/exist.hdr")).unwrap_err();
        assert_eq!(err.category(), "Asset");
    }

    #[test]
    fn missing_texture_decodes_to_error() {
        assert!(decode_rgba8(Path::new("nope.png")).is_err());
    }

    #[test]
    fn texel_lookup_clamps() {
        let img = HdrImage { width: 2, height: 1, rgba: vec![1.0, 0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 1.0] };
        assert_eq!(img.texel(1, 0), [0.0, 2.0, 0.0, 1.0]);
        assert_eq!(img.texel(5, 9), [0.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn half_packing_is_eight_bytes_per_texel() {
        let img = HdrImage { width: 1, height: 1, rgba: vec![1.0, 0.5, 0.25, 1.0] };
        let bytes = img.to_f16_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(f16::from_le_bytes([bytes[2], bytes[3]]).to_f32(), 0.5);
    }
}
