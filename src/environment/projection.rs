//! Equirectangular → cube projection, then a per-face mip chain.

use crate::assets::Texture;
use crate::config::EnvironmentConfig;
use crate::error::RenderResult;
use crate::renderer::framebuffer::{Framebuffer, Load};
use crate::renderer::params::{UniformBlock, uniform_entry};
use crate::renderer::quad::{
    FULLSCREEN_VS, SHADER_COMMON, create_fullscreen_pipeline, draw_quad, opaque_target, sampler_entry,
    texture_entry,
};
use crate::renderer::target::{PixelFormat, RenderTarget, TargetDesc};

use super::capture::{FACE_DIRECTION_WGSL, capture_plan};
use super::{CaptureContext, CaptureParams};

const PROJECTION_FS: &str = "
@group(1) @binding(0) var equirect: texture_2d<f32>;
@group(1) @binding(1) var equirect_sampler: sampler;

const INV_ATAN: vec2<f32> = vec2<f32>(0.1591, 0.3183);

fn equirect_uv(v: vec3<f32>) -> vec2<f32> {
    let d = normalize(v);
    return vec2<f32>(atan2(d.z, d.x) * INV_ATAN.x + 0.5, 0.5 - asin(clamp(d.y, -1.0, 1.0)) * INV_ATAN.y);
}

@fragment
fn fs_main(in: CaptureOut) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(equirect, equirect_sampler, equirect_uv(in.local), 0.0).rgb;
    return vec4<f32>(color, 1.0);
}
";

pub(crate) fn projection_source() -> String {
    super::capture_source(PROJECTION_FS)
}

const DOWNSAMPLE_FS: &str = "
struct Downsample {
    face: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};

@group(0) @binding(0) var<uniform> params: Downsample;
@group(1) @binding(0) var source: texture_cube<f32>;
@group(1) @binding(1) var source_sampler: sampler;

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let dir = face_direction(params.face, in.uv);
    return vec4<f32>(textureSampleLevel(source, source_sampler, dir, 0.0).rgb, 1.0);
}
";

pub(crate) fn downsample_source() -> String {
    format!("{FULLSCREEN_VS}{SHADER_COMMON}{FACE_DIRECTION_WGSL}{DOWNSAMPLE_FS}")
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DownsampleParams {
    face: u32,
    _pad: [u32; 3],
}

impl crate::renderer::params::ProgramParams for DownsampleParams {
    const LABEL: &'static str = "downsample";
}

fn source_layout(device: &wgpu::Device, label: &str, dim: wgpu::TextureViewDimension) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            texture_entry(0, dim, true),
            sampler_entry(1, wgpu::SamplerBindingType::Filtering),
        ],
    })
}

fn source_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("capture_source_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
    })
}

/// Project `source` onto a new cube of `config.cube_size` with a full mip chain.
pub fn project(
    ctx: &mut CaptureContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
    source: &Texture,
    config: &EnvironmentConfig,
    format: PixelFormat,
) -> RenderResult<RenderTarget> {
    let device = ctx.device();
    let cube = RenderTarget::new(
        device,
        TargetDesc::cube("environment_cube", config.cube_size, format).with_full_mips(),
    )?;

    let layout = source_layout(device, "equirect_layout", wgpu::TextureViewDimension::D2);
    let program = ctx.cube_program("equirect_to_cube", &projection_source(), &layout, format.to_wgpu())?;
    let source_bg = source_group(device, &layout, &source.view, &source.sampler);

    ctx.capture(encoder, &program, &source_bg, &cube, &capture_plan(config.cube_size, 1), CaptureParams::for_face)?;
    generate_mips(device, encoder, &cube)?;
    Ok(cube)
}

/// Fill mips `1..n` of `cube` by sampling the level above, one face at a time.
pub fn generate_mips(device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, cube: &RenderTarget) -> RenderResult<()> {
    let params_entry = uniform_entry::<DownsampleParams>(0, wgpu::ShaderStages::FRAGMENT);
    let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("downsample_params_layout"),
        entries: &[params_entry],
    });
    let layout = source_layout(device, "downsample_source_layout", wgpu::TextureViewDimension::Cube);
    let shader = downsample_source();
    let program = create_fullscreen_pipeline(
        device,
        "cube_downsample",
        &shader,
        &[&params_layout, &layout],
        &opaque_target(cube.format().to_wgpu()),
    )?;

    let face_groups: Vec<(UniformBlock<DownsampleParams>, wgpu::BindGroup)> = (0..6)
        .map(|face| {
            let block = UniformBlock::new(device, &DownsampleParams { face, _pad: [0; 3] });
            let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("downsample_params_bg"),
                layout: &params_layout,
                entries: &[block.entry(&params_entry)?],
            });
            Ok((block, group))
        })
        .collect::<RenderResult<_>>()?;

    let mut fb = Framebuffer::new("cube_mips");
    for mip in 1..cube.mip_levels() {
        let above = cube.mip_view(mip - 1);
        let source_bg = source_group(device, &layout, &above, cube.sampler());
        for (face, (_, params_bg)) in face_groups.iter().enumerate() {
            fb.attach(cube, 0, Some(face as u32), Some(mip))?;
            let mut pass = fb.bind(encoder, Load::Clear)?;
            pass.set_pipeline(&program);
            pass.set_bind_group(0, params_bg, &[]);
            pass.set_bind_group(1, &source_bg, &[]);
            draw_quad(&mut pass);
            Framebuffer::unbind(pass);
            fb.detach(0);
        }
    }
    log::debug!("`{}`: generated {} mip levels", cube.label(), cube.mip_levels());
    Ok(())
}
