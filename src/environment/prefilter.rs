//! Specular prefilter: one GGX-convolved cube level per roughness step.

use crate::config::EnvironmentConfig;
use crate::error::{RenderError, RenderResult};
use crate::renderer::quad::{sampler_entry, texture_entry};
use crate::renderer::target::{PixelFormat, RenderTarget, TargetDesc, mip_extent};

use super::capture::capture_plan;
use super::sampling::SAMPLING_WGSL;
use super::{CaptureContext, CaptureParams};

const PREFILTER_FS: &str = "
@group(1) @binding(0) var environment: texture_cube<f32>;
@group(1) @binding(1) var environment_sampler: sampler;

@fragment
fn fs_main(in: CaptureOut) -> @location(0) vec4<f32> {
    let n = normalize(in.local);
    let v = n;
    let roughness = params.roughness;
    let resolution = params.source_size;
    let sa_texel = 4.0 * PI / (6.0 * resolution * resolution);

    var color = vec3<f32>(0.0);
    var weight = 0.0;
    for (var i = 0u; i < params.sample_count; i++) {
        let xi = hammersley(i, params.sample_count);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = normalize(2.0 * dot(v, h) * h - v);
        let n_dot_l = max(dot(n, l), 0.0);
        if (n_dot_l > 0.0) {
            var lod = 0.0;
            if (roughness > 0.0) {
                let n_dot_h = max(dot(n, h), 0.0);
                let h_dot_v = max(dot(h, v), 0.0);
                let pdf = distribution_ggx(n_dot_h, roughness) * n_dot_h / max(4.0 * h_dot_v, DENOM_EPSILON) + DENOM_EPSILON;
                let sa_sample = 1.0 / (f32(params.sample_count) * pdf + DENOM_EPSILON);
                lod = max(0.5 * log2(sa_sample / sa_texel), 0.0);
            }
            color += textureSampleLevel(environment, environment_sampler, l, lod).rgb * n_dot_l;
            weight += n_dot_l;
        }
    }
    return vec4<f32>(color / max(weight, DENOM_EPSILON), 1.0);
}
";

fn prefilter_fragment() -> String {
    format!("{SAMPLING_WGSL}{PREFILTER_FS}")
}

pub(crate) fn prefilter_source() -> String {
    super::capture_source(&prefilter_fragment())
}

/// Face size of every prefilter level, largest first.
///
/// Fails when a level would shrink below `floor` (or below 1 texel).
pub fn prefilter_mip_sizes(size: u32, levels: u32, floor: u32) -> RenderResult<Vec<u32>> {
    let sizes: Vec<u32> = (0..levels).map(|mip| mip_extent(size, mip)).collect();
    match sizes.last() {
        None => Err(RenderError::config("prefilter needs at least one level")),
        Some(&smallest) if smallest < floor.max(1) || size >> (levels - 1) == 0 => Err(RenderError::config(
            format!("{levels} prefilter levels of a {size}² cube fall below the {floor}² floor"),
        )),
        Some(_) => Ok(sizes),
    }
}

/// Roughness assigned to prefilter level `mip` of `levels`.
pub fn level_roughness(mip: u32, levels: u32) -> f32 {
    if levels <= 1 {
        return 0.0;
    }
    mip as f32 / (levels - 1) as f32
}

/// Prefilter `cube` into a new cube with `config.prefilter_levels` mips.
pub fn prefilter(
    ctx: &mut CaptureContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
    cube: &RenderTarget,
    config: &EnvironmentConfig,
    format: PixelFormat,
) -> RenderResult<RenderTarget> {
    let levels = config.prefilter_levels;
    let sizes = prefilter_mip_sizes(config.prefilter_size, levels, config.prefilter_floor)?;
    let device = ctx.device();
    let target = RenderTarget::new(
        device,
        TargetDesc::cube("prefilter", config.prefilter_size, format).with_mips(levels),
    )?;

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("prefilter_source_layout"),
        entries: &[
            texture_entry(0, wgpu::TextureViewDimension::Cube, true),
            sampler_entry(1, wgpu::SamplerBindingType::Filtering),
        ],
    });
    let source = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("prefilter_source_bg"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(cube.view()) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(cube.sampler()) },
        ],
    });
    let program = ctx.cube_program("specular_prefilter", &prefilter_source(), &layout, format.to_wgpu())?;

    let source_size = cube.size().0 as f32;
    let samples = config.prefilter_samples;
    let plan = capture_plan(config.prefilter_size, levels);
    debug_assert!(plan.iter().all(|d| d.size == sizes[d.mip as usize]));
    ctx.capture(encoder, &program, &source, &target, &plan, |draw| CaptureParams {
        roughness: level_roughness(draw.mip, levels),
        source_size,
        sample_count: samples,
        ..CaptureParams::for_face(draw)
    })?;
    log::debug!("prefilter: {} levels {:?}", levels, sizes);
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_levels_run_128_to_8() {
        let sizes = prefilter_mip_sizes(128, 5, 8).unwrap();
        assert_eq!(sizes, vec![128, 64, 32, 16, 8]);
        assert_eq!(sizes.len(), 5);
    }

    #[test]
    fn level_below_floor_is_rejected() {
        assert!(prefilter_mip_sizes(128, 6, 8).is_err());
        assert!(prefilter_mip_sizes(128, 8, 1).is_ok());
        assert!(prefilter_mip_sizes(128, 9, 1).is_err());
        assert!(prefilter_mip_sizes(128, 0, 1).is_err());
    }

    #[test]
    fn roughness_spans_zero_to_one() {
        let r: Vec<f32> = (0..5).map(|m| level_roughness(m, 5)).collect();
        assert_eq!(r, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(level_roughness(0, 1), 0.0);
    }
}
