use crate::error::{RenderError, RenderResult};

// ── Shader modules ──────────────────────────────────────────────────────────

/// Compile a WGSL module, turning compiler errors into [`RenderError::Program`].
pub fn create_shader(device: &wgpu::Device, label: &str, source: &str) -> RenderResult<wgpu::ShaderModule> {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let info = pollster::block_on(module.get_compilation_info());
    let errors: Vec<String> = info
        .messages
        .iter()
        .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
        .map(|m| m.message.clone())
        .collect();
    if !errors.is_empty() {
        return Err(RenderError::program(label, errors.join("; ")));
    }
    Ok(module)
}

// ── Fullscreen quad pipeline ────────────────────────────────────────────────

/// Build a program that draws the 6-vertex screen quad from [`FULLSCREEN_VS`]
/// into `targets`. `shader_source` must contain `vs_main` and `fs_main`.
pub fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader_source: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    targets: &[Option<wgpu::ColorTargetState>],
) -> RenderResult<wgpu::RenderPipeline> {
    let shader = create_shader(device, label, shader_source)?;

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{}_layout", label)),
        bind_group_layouts,
        ..Default::default()
    });

    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    }))
}

/// Single opaque colour target of `format`.
pub fn opaque_target(format: wgpu::TextureFormat) -> [Option<wgpu::ColorTargetState>; 1] {
    [Some(wgpu::ColorTargetState {
        format,
        blend: None,
        write_mask: wgpu::ColorWrites::ALL,
    })]
}

/// Issue the screen quad draw on an already configured pass.
pub fn draw_quad(pass: &mut wgpu::RenderPass<'_>) {
    pass.draw(0..6, 0..1);
}

// ── Bind group layout entries ───────────────────────────────────────────────

pub fn texture_entry(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
    filterable: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

pub fn depth_texture_entry(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Depth,
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

pub fn sampler_entry(binding: u32, ty: wgpu::SamplerBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(ty),
        count: None,
    }
}

// ── Common Shader Utils ─────────────────────────────────────────────────────

/// Screen quad vertex stage. `uv` is (0,0) at the top-left of the target.
pub const FULLSCREEN_VS: &str = "
struct VertexOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOut {
    var positions = array<vec2<f32>, 6>(
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
        vec2<f32>( 1.0,  1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
    );
    var out: VertexOut;
    let p = positions[vi];
    out.pos = vec4<f32>(p, 0.0, 1.0);
    out.uv  = vec2<f32>(p.x * 0.5 + 0.5, 0.5 - p.y * 0.5);
    return out;
}
";

/// Shared WGSL constants and helpers appended to programs that need them.
pub const SHADER_COMMON: &str = "
const PI: f32 = 3.14159265359;

fn luminance(c: vec3<f32>) -> f32 {
    return dot(c, vec3<f32>(0.2126, 0.7152, 0.0722));
}
";

#[cfg(test)]
mod tests {
    use crate::{bloom, deferred, environment, shadow, ssao};

    fn composed_sources() -> Vec<(&'static str, String)> {
        vec![
            ("gbuffer", deferred::gbuffer::gbuffer_source()),
            ("deferred_lighting", deferred::lighting::lighting_source()),
            ("light_volumes", deferred::light_volume::volume_source()),
            ("light_markers", deferred::light_volume::marker_source()),
            ("shadow", shadow::SHADOW_WGSL.to_string()),
            ("ssao", ssao::pass::occlusion_source()),
            ("ssao_blur", ssao::pass::blur_source()),
            ("bloom_blur", bloom::pass::blur_source()),
            ("composite", bloom::pass::composite_source()),
            ("equirect_to_cube", environment::projection::projection_source()),
            ("cube_downsample", environment::projection::downsample_source()),
            ("irradiance_convolution", environment::irradiance::irradiance_source()),
            ("specular_prefilter", environment::prefilter::prefilter_source()),
            ("brdf_integration", environment::brdf::brdf_source()),
            ("skybox", environment::skybox::skybox_source()),
        ]
    }

    #[test]
    fn composed_shaders_parse_and_validate() {
        let mut validator =
            naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
        for (label, source) in composed_sources() {
            let module = naga::front::wgsl::parse_str(&source)
                .unwrap_or_else(|e| panic!("{label}: {}", e.emit_to_string(&source)));
            if let Err(e) = validator.validate(&module) {
                panic!("{label}: {}", e.emit_to_string(&source));
            }
        }
    }
}
