//! Full-screen lighting pass. Reads the G-Buffer (plus SSAO, environment maps
//! and shadow maps when present) and writes the lit HDR scene and the bright
//! pass as two colour outputs.

use glam::{Mat4, Vec3};

use crate::camera::CAMERA_WGSL;
use crate::config::{LightingConfig, TargetFormats};
use crate::environment::EnvironmentMaps;
use crate::environment::sampling::SAMPLING_WGSL;
use crate::error::RenderResult;
use crate::renderer::framebuffer::{Framebuffer, Load};
use crate::renderer::params::{ProgramParams, UniformBlock, uniform_entry};
use crate::renderer::quad::{
    FULLSCREEN_VS, SHADER_COMMON, create_fullscreen_pipeline, depth_texture_entry, draw_quad, sampler_entry,
    texture_entry,
};
use crate::renderer::target::{PixelFormat, RenderTarget, TargetDesc};
use crate::shadow::SHADOW_COMPARE;

use super::gbuffer::GBufferTargets;
use super::light::{LIGHT_WGSL, Light, LightArray};

// ── Parameters ────────────────────────────────────────────────────────────────

/// Feature bits of [`LightingParams::flags`].
pub mod flags {
    pub const SSAO: u32 = 1 << 0;
    pub const IBL: u32 = 1 << 1;
    pub const POINT_SHADOW: u32 = 1 << 2;
    pub const DIRECTIONAL_SHADOW: u32 = 1 << 3;
    /// Point lights are accumulated by the light-volume pass instead.
    pub const SKIP_POINT_LIGHTS: u32 = 1 << 4;
}

/// Marks "no light" in the shadow-caster indices.
pub const NO_LIGHT: u32 = u32::MAX;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingParams {
    /// World → directional shadow clip space.
    pub light_space: [[f32; 4]; 4],
    /// World position of the point shadow caster; w is the shadow far plane.
    pub shadow_light: [f32; 4],
    pub light_count: u32,
    pub flags: u32,
    pub ambient: f32,
    pub bloom_threshold: f32,
    pub shadow_bias: f32,
    pub prefilter_max_lod: f32,
    pub point_shadow_light: u32,
    pub directional_shadow_light: u32,
}

impl ProgramParams for LightingParams {
    const LABEL: &'static str = "lighting";
}

impl LightingParams {
    pub fn new(config: &LightingConfig, bloom_threshold: f32) -> Self {
        Self {
            light_space: Mat4::IDENTITY.to_cols_array_2d(),
            shadow_light: [0.0, 0.0, 0.0, 1.0],
            light_count: 0,
            flags: 0,
            ambient: config.ambient,
            bloom_threshold,
            shadow_bias: 0.0,
            prefilter_max_lod: 0.0,
            point_shadow_light: NO_LIGHT,
            directional_shadow_light: NO_LIGHT,
        }
    }

    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// Index of the first light matching `point`, used to pick shadow casters.
pub fn first_light(lights: &[Light], point: bool) -> Option<usize> {
    lights.iter().take(super::light::MAX_LIGHTS).position(|l| l.is_point() == point)
}

// ── Shader ────────────────────────────────────────────────────────────────────

const LIGHTING_FS: &str = "
struct LightingParams {
    light_space: mat4x4<f32>,
    shadow_light: vec4<f32>,
    light_count: u32,
    flags: u32,
    ambient: f32,
    bloom_threshold: f32,
    shadow_bias: f32,
    prefilter_max_lod: f32,
    point_shadow_light: u32,
    directional_shadow_light: u32,
};

const FLAG_SSAO: u32 = 1u;
const FLAG_IBL: u32 = 2u;
const FLAG_POINT_SHADOW: u32 = 4u;
const FLAG_DIRECTIONAL_SHADOW: u32 = 8u;
const FLAG_SKIP_POINT: u32 = 16u;

@group(1) @binding(0) var<uniform> params: LightingParams;
@group(1) @binding(1) var<uniform> light_array: LightArray;

@group(2) @binding(0) var g_position: texture_2d<f32>;
@group(2) @binding(1) var g_normal: texture_2d<f32>;
@group(2) @binding(2) var g_albedo_spec: texture_2d<f32>;
@group(2) @binding(3) var ssao_map: texture_2d<f32>;

@group(3) @binding(0) var irradiance_map: texture_cube<f32>;
@group(3) @binding(1) var prefilter_map: texture_cube<f32>;
@group(3) @binding(2) var brdf_lut: texture_2d<f32>;
@group(3) @binding(3) var env_sampler: sampler;
@group(3) @binding(4) var point_shadow_map: texture_depth_cube;
@group(3) @binding(5) var directional_shadow_map: texture_depth_2d;
@group(3) @binding(6) var shadow_sampler: sampler_comparison;

fn has_flag(flag: u32) -> bool {
    return (params.flags & flag) != 0u;
}

fn point_visibility(world: vec3<f32>) -> f32 {
    let far = params.shadow_light.w;
    let to_frag = world - params.shadow_light.xyz;
    let current = length(to_frag) / far;
    if (current >= 1.0) {
        return 1.0;
    }
    return textureSampleCompareLevel(point_shadow_map, shadow_sampler, to_frag, current - params.shadow_bias / far);
}

fn directional_visibility(world: vec3<f32>, n_dot_l: f32) -> f32 {
    let clip = params.light_space * vec4<f32>(world, 1.0);
    let ndc = clip.xyz / clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    if (uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || ndc.z > 1.0) {
        return 1.0;
    }
    let bias = max(0.005 * (1.0 - n_dot_l), 0.0005);
    return textureSampleCompareLevel(directional_shadow_map, shadow_sampler, uv, ndc.z - bias);
}

fn visibility(index: u32, world: vec3<f32>, n_dot_l: f32) -> f32 {
    if (index == params.point_shadow_light && has_flag(FLAG_POINT_SHADOW)) {
        return point_visibility(world);
    }
    if (index == params.directional_shadow_light && has_flag(FLAG_DIRECTIONAL_SHADOW)) {
        return directional_visibility(world, n_dot_l);
    }
    return 1.0;
}

fn light_dir(light: Light, p: vec3<f32>) -> vec3<f32> {
    if (light.position.w == 1.0) {
        return normalize(-light.direction.xyz);
    }
    return normalize(light.position.xyz - p);
}

fn fresnel_schlick(cos_theta: f32, f0: vec3<f32>) -> vec3<f32> {
    return f0 + (1.0 - f0) * pow(clamp(1.0 - cos_theta, 0.0, 1.0), 5.0);
}

fn fresnel_schlick_roughness(cos_theta: f32, f0: vec3<f32>, roughness: f32) -> vec3<f32> {
    return f0 + (max(vec3<f32>(1.0 - roughness), f0) - f0) * pow(clamp(1.0 - cos_theta, 0.0, 1.0), 5.0);
}

fn geometry_schlick_direct(n_dot_x: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = r * r / 8.0;
    return n_dot_x / max(n_dot_x * (1.0 - k) + k, DENOM_EPSILON);
}

fn cook_torrance(light: Light, p: vec3<f32>, n: vec3<f32>, v: vec3<f32>, albedo: vec3<f32>, metallic: f32, roughness: f32, f0: vec3<f32>) -> vec3<f32> {
    var falloff = 1.0;
    if (light.position.w != 1.0) {
        let dist = length(light.position.xyz - p);
        if (dist > light.attenuation.w) {
            return vec3<f32>(0.0);
        }
        falloff = attenuate(light, dist);
    }
    let l = light_dir(light, p);
    let h = normalize(v + l);
    let n_dot_l = max(dot(n, l), 0.0);
    let n_dot_v = max(dot(n, v), 0.0);
    let ndf = distribution_ggx(max(dot(n, h), 0.0), roughness);
    let g = geometry_schlick_direct(n_dot_v, roughness) * geometry_schlick_direct(n_dot_l, roughness);
    let f = fresnel_schlick(max(dot(h, v), 0.0), f0);
    let specular = ndf * g * f / max(4.0 * n_dot_v * n_dot_l, DENOM_EPSILON);
    let kd = (vec3<f32>(1.0) - f) * (1.0 - metallic);
    return (kd * albedo / PI + specular) * light.color.rgb * falloff * n_dot_l;
}

struct LitTargets {
    @location(0) scene: vec4<f32>,
    @location(1) bright: vec4<f32>,
}

@fragment
fn fs_main(in: VertexOut) -> LitTargets {
    let coord = vec2<i32>(in.pos.xy);
    let position_metallic = textureLoad(g_position, coord, 0);
    let normal_roughness = textureLoad(g_normal, coord, 0);
    let albedo_spec = textureLoad(g_albedo_spec, coord, 0);

    var out: LitTargets;
    out.scene = vec4<f32>(0.0, 0.0, 0.0, 1.0);
    out.bright = vec4<f32>(0.0, 0.0, 0.0, 1.0);
    if (length(normal_roughness.xyz) < 0.5) {
        return out;
    }

    let p = position_metallic.xyz;
    let n = normalize(normal_roughness.xyz);
    let v = normalize(-p);
    let albedo = albedo_spec.rgb;
    let world = (camera.inv_view * vec4<f32>(p, 1.0)).xyz;

    var ao = 1.0;
    if (has_flag(FLAG_SSAO)) {
        ao = textureLoad(ssao_map, coord, 0).r;
    }

    var color = vec3<f32>(0.0);
    if (has_flag(FLAG_IBL)) {
        let metallic = position_metallic.w;
        let roughness = clamp(normal_roughness.w, 0.05, 1.0);
        let f0 = mix(vec3<f32>(0.04), albedo, metallic);
        for (var i = 0u; i < params.light_count; i++) {
            let light = light_array.lights[i];
            if (light.position.w != 1.0 && has_flag(FLAG_SKIP_POINT)) {
                continue;
            }
            let shadow = visibility(i, world, max(dot(n, light_dir(light, p)), 0.0));
            color += cook_torrance(light, p, n, v, albedo, metallic, roughness, f0) * shadow;
        }

        let n_world = normalize((camera.inv_view * vec4<f32>(n, 0.0)).xyz);
        let r_world = normalize((camera.inv_view * vec4<f32>(reflect(-v, n), 0.0)).xyz);
        let n_dot_v = max(dot(n, v), 0.0);
        let f = fresnel_schlick_roughness(n_dot_v, f0, roughness);
        let kd = (vec3<f32>(1.0) - f) * (1.0 - metallic);
        let irradiance = textureSampleLevel(irradiance_map, env_sampler, n_world, 0.0).rgb;
        let prefiltered = textureSampleLevel(prefilter_map, env_sampler, r_world, roughness * params.prefilter_max_lod).rgb;
        let brdf = textureSampleLevel(brdf_lut, env_sampler, vec2<f32>(n_dot_v, roughness), 0.0).rg;
        let specular = prefiltered * (f * brdf.x + brdf.y);
        color += (kd * irradiance * albedo + specular) * ao;
    } else {
        color = albedo * params.ambient * ao;
        for (var i = 0u; i < params.light_count; i++) {
            let light = light_array.lights[i];
            if (light.position.w != 1.0 && has_flag(FLAG_SKIP_POINT)) {
                continue;
            }
            let shadow = visibility(i, world, max(dot(n, light_dir(light, p)), 0.0));
            color += blinn_phong(light, p, n, albedo, albedo_spec.a) * shadow;
        }
    }

    out.scene = vec4<f32>(color, 1.0);
    if (luminance(color) > params.bloom_threshold) {
        out.bright = vec4<f32>(color, 1.0);
    }
    return out;
}
";

pub(crate) fn lighting_source() -> String {
    format!("{FULLSCREEN_VS}{SHADER_COMMON}{CAMERA_WGSL}{LIGHT_WGSL}{SAMPLING_WGSL}{LIGHTING_FS}")
}

// ── HDR targets ───────────────────────────────────────────────────────────────

/// Lit scene and bright pass, both resolution-matched.
pub struct HdrTargets {
    pub scene: RenderTarget,
    pub bright: RenderTarget,
}

impl HdrTargets {
    pub fn new(device: &wgpu::Device, formats: &TargetFormats, width: u32, height: u32) -> RenderResult<Self> {
        let (w, h) = (width.max(1), height.max(1));
        Ok(Self {
            scene: RenderTarget::new(device, TargetDesc::new("hdr_scene", w, h, formats.scene))?,
            bright: RenderTarget::new(device, TargetDesc::new("hdr_bright", w, h, formats.bright))?,
        })
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> RenderResult<()> {
        self.scene.recreate(device, width, height)?;
        self.bright.recreate(device, width, height)
    }

    pub fn formats(&self) -> [wgpu::TextureFormat; 2] {
        [self.scene.format().to_wgpu(), self.bright.format().to_wgpu()]
    }
}

// ── Placeholders ──────────────────────────────────────────────────────────────

/// 1×1 stand-ins bound when a stage is disabled; the flags keep them unread.
struct Placeholders {
    cube: RenderTarget,
    lut: RenderTarget,
    ssao: RenderTarget,
    depth_cube: RenderTarget,
    depth_2d: RenderTarget,
}

impl Placeholders {
    fn new(device: &wgpu::Device) -> RenderResult<Self> {
        Ok(Self {
            cube: RenderTarget::new(device, TargetDesc::cube("placeholder_cube", 1, PixelFormat::Rgba16Float))?,
            lut: RenderTarget::new(device, TargetDesc::new("placeholder_lut", 1, 1, PixelFormat::Rg16Float))?,
            ssao: RenderTarget::new(device, TargetDesc::new("placeholder_ssao", 1, 1, PixelFormat::R8Unorm))?,
            depth_cube: RenderTarget::new(
                device,
                TargetDesc::cube("placeholder_depth_cube", 1, PixelFormat::Depth32Float).with_compare(SHADOW_COMPARE),
            )?,
            depth_2d: RenderTarget::new(
                device,
                TargetDesc::new("placeholder_depth", 1, 1, PixelFormat::Depth32Float).with_compare(SHADOW_COMPARE),
            )?,
        })
    }
}

/// Long-lived inputs bound once at construction.
pub struct LightingSources<'a> {
    pub environment: Option<&'a EnvironmentMaps>,
    pub point_shadow: Option<&'a RenderTarget>,
    pub directional_shadow: Option<&'a RenderTarget>,
}

/// Per-frame values fed to [`LightingPass::prepare`].
pub struct LightingFrame<'a> {
    pub lights: &'a [Light],
    pub view: Mat4,
    pub flags: u32,
    pub light_space: Mat4,
    pub shadow_light: Option<(usize, Vec3)>,
    pub directional_shadow_light: Option<usize>,
    pub shadow_far: f32,
    pub shadow_bias: f32,
}

// ── Pass ──────────────────────────────────────────────────────────────────────

pub struct LightingPass {
    pub hdr: HdrTargets,
    framebuffer: Framebuffer,
    pipeline: wgpu::RenderPipeline,
    base: LightingParams,
    params: UniformBlock<LightingParams>,
    lights: UniformBlock<LightArray>,
    params_group: wgpu::BindGroup,
    input_layout: wgpu::BindGroupLayout,
    input_group: wgpu::BindGroup,
    source_group: wgpu::BindGroup,
    placeholders: Placeholders,
    /// Flags the bound sources can honour.
    available: u32,
}

impl LightingPass {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        formats: &TargetFormats,
        config: &LightingConfig,
        bloom_threshold: f32,
        gbuffer: &GBufferTargets,
        ssao: Option<&RenderTarget>,
        sources: LightingSources<'_>,
    ) -> RenderResult<Self> {
        let (w, h) = gbuffer.size();
        let hdr = HdrTargets::new(device, formats, w, h)?;
        let framebuffer = Framebuffer::with_targets("lighting", &[&hdr.scene, &hdr.bright], None)?;
        let placeholders = Placeholders::new(device)?;

        // group 1: parameters
        let params_entry = uniform_entry::<LightingParams>(0, wgpu::ShaderStages::FRAGMENT);
        let lights_entry = uniform_entry::<LightArray>(1, wgpu::ShaderStages::FRAGMENT);
        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting_params_layout"),
            entries: &[params_entry, lights_entry],
        });
        let mut base = LightingParams::new(config, bloom_threshold);
        base.prefilter_max_lod = sources.environment.map(|env| env.prefilter_max_lod()).unwrap_or(0.0);
        let params = UniformBlock::new(device, &base);
        let lights = UniformBlock::new(device, &LightArray::pack(&[], Mat4::IDENTITY).0);
        let params_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lighting_params_bg"),
            layout: &params_layout,
            entries: &[params.entry(&params_entry)?, lights.entry(&lights_entry)?],
        });

        // group 2: per-resolution inputs
        let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting_input_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2, false),
                texture_entry(1, wgpu::TextureViewDimension::D2, false),
                texture_entry(2, wgpu::TextureViewDimension::D2, false),
                texture_entry(3, wgpu::TextureViewDimension::D2, false),
            ],
        });
        let input_group = Self::input_group(device, &input_layout, gbuffer, ssao.unwrap_or(&placeholders.ssao));

        // group 3: environment and shadow maps
        let source_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting_source_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::Cube, true),
                texture_entry(1, wgpu::TextureViewDimension::Cube, true),
                texture_entry(2, wgpu::TextureViewDimension::D2, true),
                sampler_entry(3, wgpu::SamplerBindingType::Filtering),
                depth_texture_entry(4, wgpu::TextureViewDimension::Cube),
                depth_texture_entry(5, wgpu::TextureViewDimension::D2),
                sampler_entry(6, wgpu::SamplerBindingType::Comparison),
            ],
        });
        let mut available = 0;
        if ssao.is_some() {
            available |= flags::SSAO;
        }
        let ibl = sources.environment.and_then(|env| env.ibl());
        if ibl.is_some() {
            available |= flags::IBL;
        }
        if sources.point_shadow.is_some() {
            available |= flags::POINT_SHADOW;
        }
        if sources.directional_shadow.is_some() {
            available |= flags::DIRECTIONAL_SHADOW;
        }
        let (irradiance, prefilter, lut) = ibl.unwrap_or((&placeholders.cube, &placeholders.cube, &placeholders.lut));
        let point_shadow = sources.point_shadow.unwrap_or(&placeholders.depth_cube);
        let directional_shadow = sources.directional_shadow.unwrap_or(&placeholders.depth_2d);
        let source_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lighting_source_bg"),
            layout: &source_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(irradiance.view()) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(prefilter.view()) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(lut.view()) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(prefilter.sampler()) },
                wgpu::BindGroupEntry { binding: 4, resource: wgpu::BindingResource::TextureView(point_shadow.view()) },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(directional_shadow.view()),
                },
                wgpu::BindGroupEntry { binding: 6, resource: wgpu::BindingResource::Sampler(directional_shadow.sampler()) },
            ],
        });

        let source = lighting_source();
        let pipeline = create_fullscreen_pipeline(
            device,
            "deferred_lighting",
            &source,
            &[camera_layout, &params_layout, &input_layout, &source_layout],
            &framebuffer.layout().color_targets(None),
        )?;

        log::info!("lighting pass: {}x{}, available features {:#07b}", w, h, available);
        Ok(Self {
            hdr,
            framebuffer,
            pipeline,
            base,
            params,
            lights,
            params_group,
            input_layout,
            input_group,
            source_group,
            placeholders,
            available,
        })
    }

    fn input_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        gbuffer: &GBufferTargets,
        ssao: &RenderTarget,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lighting_input_bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(gbuffer.position.view()) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(gbuffer.normal.view()) },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(gbuffer.albedo_spec.view()),
                },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(ssao.view()) },
            ],
        })
    }

    /// Flags the bound sources support; requested flags are masked by this.
    pub fn available(&self) -> u32 {
        self.available
    }

    /// Recreate the HDR targets and rebind the resized G-Buffer and SSAO output.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        gbuffer: &GBufferTargets,
        ssao: Option<&RenderTarget>,
    ) -> RenderResult<()> {
        let (w, h) = gbuffer.size();
        self.hdr.resize(device, w, h)?;
        self.framebuffer = Framebuffer::with_targets("lighting", &[&self.hdr.scene, &self.hdr.bright], None)?;
        self.input_group = Self::input_group(device, &self.input_layout, gbuffer, ssao.unwrap_or(&self.placeholders.ssao));
        Ok(())
    }

    /// Upload this frame's lights and parameters.
    pub fn prepare(&self, queue: &wgpu::Queue, frame: &LightingFrame<'_>) -> LightingParams {
        let (array, count) = LightArray::pack(frame.lights, frame.view);
        let mut params = self.base;
        params.light_count = count;
        params.flags = frame.flags & (self.available | flags::SKIP_POINT_LIGHTS);
        params.light_space = frame.light_space.to_cols_array_2d();
        params.shadow_bias = frame.shadow_bias;
        if let Some((index, position)) = frame.shadow_light {
            params.point_shadow_light = index as u32;
            params.shadow_light = position.extend(frame.shadow_far.max(f32::EPSILON)).to_array();
        }
        params.directional_shadow_light = frame.directional_shadow_light.map(|i| i as u32).unwrap_or(NO_LIGHT);
        self.params.write(queue, &params);
        self.lights.write(queue, &array);
        params
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, camera: &wgpu::BindGroup) -> RenderResult<()> {
        let mut pass = self.framebuffer.bind(encoder, Load::Clear)?;
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, &self.params_group, &[]);
        pass.set_bind_group(2, &self.input_group, &[]);
        pass.set_bind_group(3, &self.source_group, &[]);
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
        assert_eq!(LightingParams::size(), 112);
        assert_eq!(LightingParams::size() % 16, 0);
    }

    #[test]
    fn flags_are_distinct_bits() {
        let all = [flags::SSAO, flags::IBL, flags::POINT_SHADOW, flags::DIRECTIONAL_SHADOW, flags::SKIP_POINT_LIGHTS];
        let combined = all.iter().fold(0, |acc, f| acc | f);
        assert_eq!(combined.count_ones() as usize, all.len());
    }

    #[test]
    fn new_params_have_no_shadow_casters() {
        let p = LightingParams::new(&LightingConfig::default(), 1.0);
        assert_eq!(p.point_shadow_light, NO_LIGHT);
        assert_eq!(p.directional_shadow_light, NO_LIGHT);
        assert!(!p.has(flags::IBL));
        assert_eq!(p.ambient, 0.1);
    }

    #[test]
    fn first_light_picks_by_kind() {
        let lights = [
            Light::directional(Vec3::NEG_Y, Vec3::ONE),
            Light::point(Vec3::ZERO, Vec3::ONE),
            Light::point(Vec3::X, Vec3::ONE),
        ];
        assert_eq!(first_light(&lights, true), Some(1));
        assert_eq!(first_light(&lights, false), Some(0));
        assert_eq!(first_light(&lights[1..], false), None);
    }
}
