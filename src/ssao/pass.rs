use glam::Vec3;

use crate::assets::Texture;
use crate::camera::CAMERA_WGSL;
use crate::config::{SsaoConfig, TargetFormats};
use crate::deferred::gbuffer::GBufferTargets;
use crate::error::RenderResult;
use crate::renderer::framebuffer::{Framebuffer, Load};
use crate::renderer::params::{ProgramParams, UniformBlock, uniform_entry};
use crate::renderer::quad::{FULLSCREEN_VS, create_fullscreen_pipeline, draw_quad, texture_entry};
use crate::renderer::target::{Filter, RenderTarget, TargetDesc};

use super::kernel::{MAX_KERNEL_SIZE, generate_kernel, generate_noise};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SsaoParams {
    pub samples: [[f32; 4]; MAX_KERNEL_SIZE],
    pub radius: f32,
    pub bias: f32,
    pub power: f32,
    pub kernel_size: u32,
}

impl ProgramParams for SsaoParams {
    const LABEL: &'static str = "ssao";
}

impl SsaoParams {
    pub fn new(config: &SsaoConfig) -> Self {
        let size = (config.kernel_size as usize).min(MAX_KERNEL_SIZE);
        let kernel = generate_kernel(size, config.seed);
        Self {
            samples: std::array::from_fn(|i| kernel.get(i).copied().unwrap_or(Vec3::ZERO).extend(0.0).to_array()),
            radius: config.radius,
            bias: config.bias,
            power: config.power,
            kernel_size: size as u32,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlurParams {
    /// Side of the box; matches the noise tile so its pattern averages out.
    pub size: u32,
    pub _pad: [u32; 3],
}

impl ProgramParams for BlurParams {
    const LABEL: &'static str = "ssao_blur";
}

const OCCLUSION_FS: &str = "
struct SsaoParams {
    samples: array<vec4<f32>, 64>,
    radius: f32,
    bias: f32,
    power: f32,
    kernel_size: u32,
};

@group(1) @binding(0) var<uniform> params: SsaoParams;
@group(1) @binding(1) var g_position: texture_2d<f32>;
@group(1) @binding(2) var g_normal: texture_2d<f32>;
@group(1) @binding(3) var noise: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let coord = vec2<i32>(in.pos.xy);
    let n_raw = textureLoad(g_normal, coord, 0).xyz;
    if (length(n_raw) < 0.5) {
        return vec4<f32>(1.0);
    }
    let p = textureLoad(g_position, coord, 0).xyz;
    let n = normalize(n_raw);
    let noise_dims = vec2<i32>(textureDimensions(noise));
    let random = textureLoad(noise, coord % noise_dims, 0).xyz;
    var tangent = random - n * dot(random, n);
    if (length(tangent) < 1e-4) {
        tangent = select(vec3<f32>(1.0, 0.0, 0.0), vec3<f32>(0.0, 1.0, 0.0), abs(n.x) > 0.9);
        tangent = tangent - n * dot(tangent, n);
    }
    tangent = normalize(tangent);
    let tbn = mat3x3<f32>(tangent, cross(n, tangent), n);

    let dims = vec2<i32>(textureDimensions(g_position));
    var occlusion = 0.0;
    for (var i = 0u; i < params.kernel_size; i = i + 1u) {
        let sample_pos = p + tbn * params.samples[i].xyz * params.radius;
        let clip = camera.projection * vec4<f32>(sample_pos, 1.0);
        let ndc = clip.xy / clip.w;
        let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
        if (uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0) {
            continue;
        }
        let texel = clamp(vec2<i32>(uv * vec2<f32>(dims)), vec2<i32>(0), dims - vec2<i32>(1));
        if (length(textureLoad(g_normal, texel, 0).xyz) < 0.5) {
            continue;
        }
        let depth = textureLoad(g_position, texel, 0).z;
        let range = smoothstep(0.0, 1.0, params.radius / max(abs(p.z - depth), 1e-4));
        if (depth >= sample_pos.z + params.bias) {
            occlusion = occlusion + range;
        }
    }
    let count = f32(max(params.kernel_size, 1u));
    let v = pow(clamp(1.0 - occlusion / count, 0.0, 1.0), params.power);
    return vec4<f32>(v, v, v, 1.0);
}
";

pub(crate) fn occlusion_source() -> String {
    format!("{FULLSCREEN_VS}{CAMERA_WGSL}{OCCLUSION_FS}")
}

const BLUR_FS: &str = "
struct BlurParams {
    size: u32,
};

@group(0) @binding(0) var<uniform> blur: BlurParams;
@group(0) @binding(1) var ssao_input: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let coord = vec2<i32>(in.pos.xy);
    let dims = vec2<i32>(textureDimensions(ssao_input));
    let size = i32(max(blur.size, 1u));
    let half_size = size / 2;
    var sum = 0.0;
    for (var y = 0; y < size; y = y + 1) {
        for (var x = 0; x < size; x = x + 1) {
            let texel = clamp(coord + vec2<i32>(x - half_size, y - half_size), vec2<i32>(0), dims - vec2<i32>(1));
            sum = sum + textureLoad(ssao_input, texel, 0).r;
        }
    }
    let v = sum / f32(size * size);
    return vec4<f32>(v, v, v, 1.0);
}
";

pub(crate) fn blur_source() -> String {
    format!("{FULLSCREEN_VS}{BLUR_FS}")
}

/// Occlusion estimate followed by a box blur, both at G-Buffer resolution.
pub struct SsaoPass {
    raw: RenderTarget,
    output: RenderTarget,
    occlusion_fb: Framebuffer,
    blur_fb: Framebuffer,
    occlusion_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    params: UniformBlock<SsaoParams>,
    blur_params: UniformBlock<BlurParams>,
    noise: Texture,
    input_layout: wgpu::BindGroupLayout,
    input_group: wgpu::BindGroup,
    blur_layout: wgpu::BindGroupLayout,
    blur_group: wgpu::BindGroup,
}

impl SsaoPass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera_layout: &wgpu::BindGroupLayout,
        formats: &TargetFormats,
        config: &SsaoConfig,
        gbuffer: &GBufferTargets,
    ) -> RenderResult<Self> {
        let (w, h) = gbuffer.size();
        let raw = RenderTarget::new(device, TargetDesc::new("ssao_raw", w, h, formats.ssao).with_filter(Filter::Nearest))?;
        let output = RenderTarget::new(device, TargetDesc::new("ssao", w, h, formats.ssao).with_filter(Filter::Nearest))?;
        let occlusion_fb = Framebuffer::with_targets("ssao", &[&raw], None)?;
        let blur_fb = Framebuffer::with_targets("ssao_blur", &[&output], None)?;

        let side = config.noise_size.max(1);
        let noise = Texture::from_rgba_f32(device, queue, "ssao_noise", side, side, &generate_noise(side, config.seed));

        let params_entry = uniform_entry::<SsaoParams>(0, wgpu::ShaderStages::FRAGMENT);
        let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ssao_input_layout"),
            entries: &[
                params_entry,
                texture_entry(1, wgpu::TextureViewDimension::D2, false),
                texture_entry(2, wgpu::TextureViewDimension::D2, false),
                texture_entry(3, wgpu::TextureViewDimension::D2, false),
            ],
        });
        let params = UniformBlock::new(device, &SsaoParams::new(config));
        let input_group = Self::input_group(device, &input_layout, &params, gbuffer, &noise)?;

        let blur_entry = uniform_entry::<BlurParams>(0, wgpu::ShaderStages::FRAGMENT);
        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ssao_blur_layout"),
            entries: &[blur_entry, texture_entry(1, wgpu::TextureViewDimension::D2, false)],
        });
        let blur_params = UniformBlock::new(device, &BlurParams { size: side, _pad: [0; 3] });
        let blur_group = Self::blur_group(device, &blur_layout, &blur_params, &raw)?;

        let occlusion_pipeline = create_fullscreen_pipeline(
            device,
            "ssao",
            &occlusion_source(),
            &[camera_layout, &input_layout],
            &occlusion_fb.layout().color_targets(None),
        )?;
        let blur_pipeline = create_fullscreen_pipeline(
            device,
            "ssao_blur",
            &blur_source(),
            &[&blur_layout],
            &blur_fb.layout().color_targets(None),
        )?;

        log::info!("ssao: {}x{}, kernel {}, noise {}²", w, h, config.kernel_size.min(MAX_KERNEL_SIZE as u32), side);
        Ok(Self {
            raw,
            output,
            occlusion_fb,
            blur_fb,
            occlusion_pipeline,
            blur_pipeline,
            params,
            blur_params,
            noise,
            input_layout,
            input_group,
            blur_layout,
            blur_group,
        })
    }

    fn input_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        params: &UniformBlock<SsaoParams>,
        gbuffer: &GBufferTargets,
        noise: &Texture,
    ) -> RenderResult<wgpu::BindGroup> {
        let entry = uniform_entry::<SsaoParams>(0, wgpu::ShaderStages::FRAGMENT);
        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ssao_input_bg"),
            layout,
            entries: &[
                params.entry(&entry)?,
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(gbuffer.position.view()) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(gbuffer.normal.view()) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(&noise.view) },
            ],
        }))
    }

    fn blur_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        params: &UniformBlock<BlurParams>,
        raw: &RenderTarget,
    ) -> RenderResult<wgpu::BindGroup> {
        let entry = uniform_entry::<BlurParams>(0, wgpu::ShaderStages::FRAGMENT);
        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ssao_blur_bg"),
            layout,
            entries: &[
                params.entry(&entry)?,
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(raw.view()) },
            ],
        }))
    }

    /// Blurred visibility, bound by the lighting pass.
    pub fn output(&self) -> &RenderTarget {
        &self.output
    }

    pub fn resize(&mut self, device: &wgpu::Device, gbuffer: &GBufferTargets) -> RenderResult<()> {
        let (w, h) = gbuffer.size();
        self.raw.recreate(device, w, h)?;
        self.output.recreate(device, w, h)?;
        self.occlusion_fb = Framebuffer::with_targets("ssao", &[&self.raw], None)?;
        self.blur_fb = Framebuffer::with_targets("ssao_blur", &[&self.output], None)?;
        self.input_group = Self::input_group(device, &self.input_layout, &self.params, gbuffer, &self.noise)?;
        self.blur_group = Self::blur_group(device, &self.blur_layout, &self.blur_params, &self.raw)?;
        Ok(())
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, camera: &wgpu::BindGroup) -> RenderResult<()> {
        {
            let mut pass = self.occlusion_fb.bind(encoder, Load::Clear)?;
            pass.set_pipeline(&self.occlusion_pipeline);
            pass.set_bind_group(0, camera, &[]);
            pass.set_bind_group(1, &self.input_group, &[]);
            draw_quad(&mut pass);
            Framebuffer::unbind(pass);
        }
        let mut pass = self.blur_fb.bind(encoder, Load::Clear)?;
        pass.set_pipeline(&self.blur_pipeline);
        pass.set_bind_group(0, &self.blur_group, &[]);
        draw_quad(&mut pass);
        Framebuffer::unbind(pass);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_block_is_uniform_aligned() {
        assert_eq!(SsaoParams::size(), 64 * 16 + 16);
        assert_eq!(BlurParams::size(), 16);
    }

    #[test]
    fn params_pad_short_kernels_with_zeros() {
        let cfg = SsaoConfig { kernel_size: 8, ..SsaoConfig::default() };
        let p = SsaoParams::new(&cfg);
        assert_eq!(p.kernel_size, 8);
        assert_ne!(p.samples[0], [0.0; 4]);
        assert_eq!(p.samples[8], [0.0; 4]);
        assert_eq!(p.radius, 0.5);
    }
}
