//! Diffuse irradiance: cosine-weighted hemisphere integral of the base cube.

use crate::config::EnvironmentConfig;
use crate::error::RenderResult;
use crate::renderer::quad::{sampler_entry, texture_entry};
use crate::renderer::target::{PixelFormat, RenderTarget, TargetDesc};

use super::capture::capture_plan;
use super::{CaptureContext, CaptureParams};

const IRRADIANCE_FS: &str = "
@group(1) @binding(0) var environment: texture_cube<f32>;
@group(1) @binding(1) var environment_sampler: sampler;

@fragment
fn fs_main(in: CaptureOut) -> @location(0) vec4<f32> {
    let n = normalize(in.local);
    var helper = vec3<f32>(0.0, 1.0, 0.0);
    if (abs(n.y) > 0.999) {
        helper = vec3<f32>(0.0, 0.0, 1.0);
    }
    let right = normalize(cross(helper, n));
    let up = normalize(cross(n, right));

    var irradiance = vec3<f32>(0.0);
    var count = 0.0;
    let delta = params.angle_step;
    for (var phi = 0.0; phi < 2.0 * PI; phi += delta) {
        for (var theta = 0.0; theta < 0.5 * PI; theta += delta) {
            let t = vec3<f32>(sin(theta) * cos(phi), sin(theta) * sin(phi), cos(theta));
            let dir = t.x * right + t.y * up + t.z * n;
            irradiance += textureSampleLevel(environment, environment_sampler, dir, 0.0).rgb * cos(theta) * sin(theta);
            count += 1.0;
        }
    }
    return vec4<f32>(PI * irradiance / max(count, 1.0), 1.0);
}
";

pub(crate) fn irradiance_source() -> String {
    super::capture_source(IRRADIANCE_FS)
}

/// Convolve `cube` into a single-mip irradiance cube.
pub fn convolve(
    ctx: &mut CaptureContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
    cube: &RenderTarget,
    config: &EnvironmentConfig,
    format: PixelFormat,
) -> RenderResult<RenderTarget> {
    let device = ctx.device();
    let irradiance = RenderTarget::new(device, TargetDesc::cube("irradiance", config.irradiance_size, format))?;

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("irradiance_source_layout"),
        entries: &[
            texture_entry(0, wgpu::TextureViewDimension::Cube, true),
            sampler_entry(1, wgpu::SamplerBindingType::Filtering),
        ],
    });
    let source = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("irradiance_source_bg"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(cube.view()) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(cube.sampler()) },
        ],
    });
    let program = ctx.cube_program("irradiance_convolution", &irradiance_source(), &layout, format.to_wgpu())?;

    let step = config.irradiance_step;
    let drawn = ctx.capture(
        encoder,
        &program,
        &source,
        &irradiance,
        &capture_plan(config.irradiance_size, 1),
        |draw| CaptureParams { angle_step: step, ..CaptureParams::for_face(draw) },
    )?;
    log::debug!(
        "irradiance: {} faces at {}², scratch depth {:?}",
        drawn,
        config.irradiance_size,
        ctx.scratch_size()
    );
    Ok(irradiance)
}
