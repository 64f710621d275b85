//! Split-sum BRDF lookup table over `(n·v, roughness)`.

use crate::config::EnvironmentConfig;
use crate::error::RenderResult;
use crate::renderer::framebuffer::{Framebuffer, Load};
use crate::renderer::params::{ProgramParams, UniformBlock, uniform_entry};
use crate::renderer::quad::{FULLSCREEN_VS, SHADER_COMMON, create_fullscreen_pipeline, draw_quad, opaque_target};
use crate::renderer::target::{PixelFormat, RenderTarget, TargetDesc};

use super::sampling::SAMPLING_WGSL;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BrdfParams {
    pub sample_count: u32,
    pub _pad: [u32; 3],
}

impl ProgramParams for BrdfParams {
    const LABEL: &'static str = "brdf";
}

const BRDF_FS: &str = "
struct BrdfParams {
    sample_count: u32,
};

@group(0) @binding(0) var<uniform> params: BrdfParams;

fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    return n_dot_v / max(n_dot_v * (1.0 - k) + k, DENOM_EPSILON);
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec2<f32> {
    let n_dot_v = max(in.uv.x, DENOM_EPSILON);
    let roughness = in.uv.y;
    let v = vec3<f32>(sqrt(max(1.0 - n_dot_v * n_dot_v, 0.0)), 0.0, n_dot_v);
    let n = vec3<f32>(0.0, 0.0, 1.0);

    var a = 0.0;
    var b = 0.0;
    for (var i = 0u; i < params.sample_count; i++) {
        let h = importance_sample_ggx(hammersley(i, params.sample_count), n, roughness);
        let l = normalize(2.0 * dot(v, h) * h - v);
        let n_dot_l = max(l.z, 0.0);
        let n_dot_h = max(h.z, 0.0);
        let v_dot_h = max(dot(v, h), 0.0);
        if (n_dot_l > 0.0) {
            let g = geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness);
            let g_vis = g * v_dot_h / max(n_dot_h * n_dot_v, DENOM_EPSILON);
            let fc = pow(1.0 - v_dot_h, 5.0);
            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }
    return vec2<f32>(a, b) / f32(params.sample_count);
}
";

pub(crate) fn brdf_source() -> String {
    format!("{FULLSCREEN_VS}{SHADER_COMMON}{SAMPLING_WGSL}{BRDF_FS}")
}

/// Render the LUT. The x axis is `n·v`, the y axis (row 0 first) is roughness.
pub fn integrate(
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    config: &EnvironmentConfig,
    format: PixelFormat,
) -> RenderResult<RenderTarget> {
    let lut = RenderTarget::new(device, TargetDesc::new("brdf_lut", config.brdf_size, config.brdf_size, format))?;

    let entry = uniform_entry::<BrdfParams>(0, wgpu::ShaderStages::FRAGMENT);
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("brdf_layout"),
        entries: &[entry],
    });
    let block = UniformBlock::new(device, &BrdfParams { sample_count: config.brdf_samples, _pad: [0; 3] });
    let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("brdf_bg"),
        layout: &layout,
        entries: &[block.entry(&entry)?],
    });

    let shader = brdf_source();
    let program = create_fullscreen_pipeline(device, "brdf_integration", &shader, &[&layout], &opaque_target(format.to_wgpu()))?;

    let fb = Framebuffer::with_targets("brdf_lut", &[&lut], None)?;
    let mut pass = fb.bind(encoder, Load::Clear)?;
    pass.set_pipeline(&program);
    pass.set_bind_group(0, &group, &[]);
    draw_quad(&mut pass);
    Framebuffer::unbind(pass);

    log::debug!("brdf lut: {}² with {} samples", config.brdf_size, config.brdf_samples);
    Ok(lut)
}
