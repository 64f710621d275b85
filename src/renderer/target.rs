use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

// ── Pixel formats ─────────────────────────────────────────────────────────────

/// Storage formats a render target may be created with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    R8Unorm,
    R16Float,
    Rg16Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Depth24PlusStencil8,
    Depth32Float,
}

impl PixelFormat {
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            PixelFormat::R16Float => wgpu::TextureFormat::R16Float,
            PixelFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
            PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            PixelFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            PixelFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, PixelFormat::Depth24PlusStencil8 | PixelFormat::Depth32Float)
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, PixelFormat::Depth24PlusStencil8)
    }

    pub fn channels(self) -> u32 {
        match self {
            PixelFormat::R8Unorm | PixelFormat::R16Float => 1,
            PixelFormat::Rg16Float => 2,
            PixelFormat::Rgba8Unorm
            | PixelFormat::Rgba8UnormSrgb
            | PixelFormat::Rgba16Float
            | PixelFormat::Rgba32Float => 4,
            PixelFormat::Depth24PlusStencil8 | PixelFormat::Depth32Float => 1,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            PixelFormat::R16Float
                | PixelFormat::Rg16Float
                | PixelFormat::Rgba16Float
                | PixelFormat::Rgba32Float
                | PixelFormat::Depth32Float
        )
    }

    /// Whether a linear sampler may be used on this format without extra device features.
    pub fn is_filterable(self) -> bool {
        !matches!(
            self,
            PixelFormat::Rgba32Float | PixelFormat::Depth24PlusStencil8 | PixelFormat::Depth32Float
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    Nearest,
    Linear,
}

impl Filter {
    fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            Filter::Nearest => wgpu::FilterMode::Nearest,
            Filter::Linear => wgpu::FilterMode::Linear,
        }
    }

    fn to_mip(self) -> wgpu::MipmapFilterMode {
        match self {
            Filter::Nearest => wgpu::MipmapFilterMode::Nearest,
            Filter::Linear => wgpu::MipmapFilterMode::Linear,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wrap {
    Repeat,
    ClampToEdge,
}

impl Wrap {
    fn to_wgpu(self) -> wgpu::AddressMode {
        match self {
            Wrap::Repeat => wgpu::AddressMode::Repeat,
            Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    D2,
    Cube,
}

impl Shape {
    pub fn layers(self) -> u32 {
        match self {
            Shape::D2 => 1,
            Shape::Cube => 6,
        }
    }
}

/// Number of levels in a full mip chain for a square of side `size`.
pub fn full_mip_count(size: u32) -> u32 {
    32 - size.max(1).leading_zeros()
}

/// Side length of mip `level` for a base side of `size`, never below 1.
pub fn mip_extent(size: u32, level: u32) -> u32 {
    size.checked_shr(level).unwrap_or(0).max(1)
}

// ── TargetDesc ────────────────────────────────────────────────────────────────

/// Creation parameters for a [`RenderTarget`].
#[derive(Clone, Debug, PartialEq)]
pub struct TargetDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter: Filter,
    /// Filter between mip levels. Only meaningful when `mip_levels > 1`.
    pub mip_filter: Filter,
    pub wrap: Wrap,
    pub shape: Shape,
    pub mip_levels: u32,
    /// Depth targets sampled through `textureSampleCompare`.
    pub compare: Option<wgpu::CompareFunction>,
}

impl TargetDesc {
    pub fn new(label: &str, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            label: label.to_string(),
            width,
            height,
            format,
            filter: if format.is_filterable() { Filter::Linear } else { Filter::Nearest },
            mip_filter: Filter::Nearest,
            wrap: Wrap::ClampToEdge,
            shape: Shape::D2,
            mip_levels: 1,
            compare: None,
        }
    }

    pub fn cube(label: &str, size: u32, format: PixelFormat) -> Self {
        Self { shape: Shape::Cube, ..Self::new(label, size, size, format) }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self { self.filter = filter; self }
    pub fn with_wrap(mut self, wrap: Wrap) -> Self { self.wrap = wrap; self }

    /// Sample through a comparison sampler. The compared results are filtered
    /// linearly, which depth formats allow only in this mode.
    pub fn with_compare(mut self, compare: wgpu::CompareFunction) -> Self {
        self.compare = Some(compare);
        self.filter = Filter::Linear;
        self
    }

    /// Allocate `levels` mip levels, sampled with trilinear filtering.
    pub fn with_mips(mut self, levels: u32) -> Self {
        self.mip_levels = levels;
        self.mip_filter = Filter::Linear;
        self
    }

    /// Allocate the full chain down to 1×1.
    pub fn with_full_mips(self) -> Self {
        let levels = full_mip_count(self.width.max(self.height));
        self.with_mips(levels)
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::storage(&self.label, "zero-sized target"));
        }
        if self.shape == Shape::Cube && self.width != self.height {
            return Err(RenderError::storage(
                &self.label,
                format!("cube faces must be square, got {}x{}", self.width, self.height),
            ));
        }
        let max = full_mip_count(self.width.max(self.height));
        if self.mip_levels == 0 || self.mip_levels > max {
            return Err(RenderError::storage(
                &self.label,
                format!("{} mip levels requested, {} available", self.mip_levels, max),
            ));
        }
        if self.filter == Filter::Linear && !self.format.is_filterable() && self.compare.is_none() {
            return Err(RenderError::storage(
                &self.label,
                format!("{:?} cannot be linearly filtered", self.format),
            ));
        }
        Ok(())
    }

    pub fn extent(&self, mip: u32) -> (u32, u32) {
        (mip_extent(self.width, mip), mip_extent(self.height, mip))
    }
}

// ── RenderTarget ──────────────────────────────────────────────────────────────

/// Owned pixel store with its sampling attributes.
///
/// The format is fixed for the lifetime of the target. Cube maps and depth
/// stores may reallocate their storage through [`RenderTarget::resize_storage`].
pub struct RenderTarget {
    desc: TargetDesc,
    texture: wgpu::Texture,
    /// Whole-resource view for sampling (`D2` or `Cube`, all mips).
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, desc: TargetDesc) -> RenderResult<Self> {
        desc.validate()?;
        let texture = create_texture(device, &desc);
        let view = create_sample_view(&texture, &desc);
        let sampler = create_sampler(device, &desc);
        log::debug!(
            "render target `{}`: {}x{} {:?} {:?} mips={}",
            desc.label, desc.width, desc.height, desc.format, desc.shape, desc.mip_levels
        );
        Ok(Self { desc, texture, view, sampler })
    }

    pub fn desc(&self) -> &TargetDesc { &self.desc }
    pub fn label(&self) -> &str { &self.desc.label }
    pub fn format(&self) -> PixelFormat { self.desc.format }
    pub fn shape(&self) -> Shape { self.desc.shape }
    pub fn mip_levels(&self) -> u32 { self.desc.mip_levels }
    pub fn size(&self) -> (u32, u32) { (self.desc.width, self.desc.height) }
    pub fn extent(&self, mip: u32) -> (u32, u32) { self.desc.extent(mip) }
    pub fn texture(&self) -> &wgpu::Texture { &self.texture }
    pub fn view(&self) -> &wgpu::TextureView { &self.view }
    pub fn sampler(&self) -> &wgpu::Sampler { &self.sampler }

    /// View usable as a render attachment: one array layer, one mip.
    pub fn attachment_view(&self, face: Option<u32>, mip: Option<u32>) -> RenderResult<wgpu::TextureView> {
        let face = face.unwrap_or(0);
        let mip = mip.unwrap_or(0);
        if face >= self.desc.shape.layers() {
            return Err(RenderError::incomplete(
                &self.desc.label,
                format!("face {} out of range for {:?} target", face, self.desc.shape),
            ));
        }
        if mip >= self.desc.mip_levels {
            return Err(RenderError::incomplete(
                &self.desc.label,
                format!("mip {} out of range ({} levels)", mip, self.desc.mip_levels),
            ));
        }
        Ok(self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{}_f{}_m{}", self.desc.label, face, mip)),
            dimension: Some(wgpu::TextureViewDimension::D2),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: mip,
            mip_level_count: Some(1),
            base_array_layer: face,
            array_layer_count: Some(1),
            ..Default::default()
        }))
    }

    /// Sampling view restricted to a single mip (used by downsampling passes).
    pub fn mip_view(&self, mip: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{}_mip{}", self.desc.label, mip)),
            dimension: Some(sample_dimension(self.desc.shape)),
            aspect: sample_aspect(self.desc.format),
            base_mip_level: mip,
            mip_level_count: Some(1),
            ..Default::default()
        })
    }

    /// Reallocate the backing storage at a new size, keeping every other attribute.
    ///
    /// Only cube maps and depth stores may be resized; resolution-matched
    /// colour targets are recreated by their owning stage instead.
    pub fn resize_storage(&mut self, device: &wgpu::Device, width: u32, height: u32) -> RenderResult<()> {
        if self.desc.shape != Shape::Cube && !self.desc.format.is_depth() {
            return Err(RenderError::storage(
                &self.desc.label,
                "only cube maps and depth stores can be resized in place",
            ));
        }
        if (width, height) == self.size() {
            return Ok(());
        }
        let mut desc = self.desc.clone();
        desc.width = width;
        desc.height = height;
        desc.mip_levels = desc.mip_levels.min(full_mip_count(width.max(height)));
        desc.validate()?;
        log::debug!("resize `{}` {:?} -> {}x{}", desc.label, self.size(), width, height);
        self.texture = create_texture(device, &desc);
        self.view = create_sample_view(&self.texture, &desc);
        self.desc = desc;
        Ok(())
    }

    /// Recreate a resolution-matched target (G-Buffer, SSAO, bloom) after a window resize.
    pub fn recreate(&mut self, device: &wgpu::Device, width: u32, height: u32) -> RenderResult<()> {
        let mut desc = self.desc.clone();
        desc.width = width.max(1);
        desc.height = height.max(1);
        desc.validate()?;
        self.texture = create_texture(device, &desc);
        self.view = create_sample_view(&self.texture, &desc);
        self.desc = desc;
        Ok(())
    }
}

fn create_texture(device: &wgpu::Device, desc: &TargetDesc) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&desc.label),
        size: wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: desc.shape.layers(),
        },
        mip_level_count: desc.mip_levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: desc.format.to_wgpu(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn create_sample_view(texture: &wgpu::Texture, desc: &TargetDesc) -> wgpu::TextureView {
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(&format!("{}_view", desc.label)),
        dimension: Some(sample_dimension(desc.shape)),
        aspect: sample_aspect(desc.format),
        base_mip_level: 0,
        mip_level_count: Some(desc.mip_levels),
        base_array_layer: 0,
        array_layer_count: Some(desc.shape.layers()),
        ..Default::default()
    })
}

fn create_sampler(device: &wgpu::Device, desc: &TargetDesc) -> wgpu::Sampler {
    let address = desc.wrap.to_wgpu();
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("{}_sampler", desc.label)),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: desc.filter.to_wgpu(),
        min_filter: desc.filter.to_wgpu(),
        mipmap_filter: desc.mip_filter.to_mip(),
        compare: desc.compare,
        ..Default::default()
    })
}

fn sample_dimension(shape: Shape) -> wgpu::TextureViewDimension {
    match shape {
        Shape::D2 => wgpu::TextureViewDimension::D2,
        Shape::Cube => wgpu::TextureViewDimension::Cube,
    }
}

fn sample_aspect(format: PixelFormat) -> wgpu::TextureAspect {
    // Sampling a combined depth/stencil texture must select one aspect.
    if format.has_stencil() {
        wgpu::TextureAspect::DepthOnly
    } else {
        wgpu::TextureAspect::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mip_count_matches_log2_plus_one() {
        assert_eq!(full_mip_count(1), 1);
        assert_eq!(full_mip_count(8), 4);
        assert_eq!(full_mip_count(128), 8);
        assert_eq!(full_mip_count(512), 10);
        assert_eq!(full_mip_count(600), 10);
    }

    #[test]
    fn mip_extent_halves_and_floors_at_one() {
        assert_eq!(mip_extent(128, 0), 128);
        assert_eq!(mip_extent(128, 4), 8);
        assert_eq!(mip_extent(128, 7), 1);
        assert_eq!(mip_extent(128, 12), 1);
        assert_eq!(mip_extent(128, 40), 1);
    }

    #[test]
    fn cube_desc_must_be_square() {
        let mut d = TargetDesc::cube("env", 64, PixelFormat::Rgba16Float);
        assert!(d.validate().is_ok());
        d.height = 32;
        assert!(matches!(d.validate(), Err(RenderError::InvalidStorage { .. })));
    }

    #[test]
    fn too_many_mips_rejected() {
        let d = TargetDesc::cube("prefilter", 128, PixelFormat::Rgba16Float).with_mips(9);
        assert!(d.validate().is_err());
        let d = TargetDesc::cube("prefilter", 128, PixelFormat::Rgba16Float).with_mips(5);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn unfilterable_formats_default_to_nearest() {
        let d = TargetDesc::new("depth", 4, 4, PixelFormat::Depth32Float);
        assert_eq!(d.filter, Filter::Nearest);
        let d = TargetDesc::new("hdr", 4, 4, PixelFormat::Rgba32Float).with_filter(Filter::Linear);
        assert!(d.validate().is_err());
    }

    #[test]
    fn shadow_maps_filter_through_comparison() {
        let d = TargetDesc::new("shadow", 4, 4, PixelFormat::Depth32Float)
            .with_compare(wgpu::CompareFunction::LessEqual);
        assert_eq!(d.filter, Filter::Linear);
        assert_eq!(d.compare, Some(wgpu::CompareFunction::LessEqual));
        assert!(d.validate().is_ok());
        let d = TargetDesc::new("shadow", 4, 4, PixelFormat::Depth32Float).with_filter(Filter::Linear);
        assert!(d.validate().is_err());
    }

    #[test]
    fn format_channel_counts() {
        assert_eq!(PixelFormat::R8Unorm.channels(), 1);
        assert_eq!(PixelFormat::Rg16Float.channels(), 2);
        assert_eq!(PixelFormat::Rgba16Float.channels(), 4);
        assert!(PixelFormat::Depth24PlusStencil8.is_depth());
        assert!(!PixelFormat::Rgba8Unorm.is_float());
    }
}
