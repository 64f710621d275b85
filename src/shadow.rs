//! Shadow maps for the first point light and the first directional light.
//!
//! The point shadow is a depth cube holding `|frag - light| / far` per face.
//! The directional shadow is a depth-only 2-D map rendered through an
//! orthographic light frustum. Both reuse the instance data prepared by the
//! geometry pass.

use glam::{Mat4, Vec3};

use crate::config::{ShadowConfig, TargetFormats};
use crate::deferred::gbuffer::{Batch, InstanceRaw};
use crate::environment::capture::{FACE_COUNT, capture_projection_range, capture_view};
use crate::error::RenderResult;
use crate::geometry::{MeshLibrary, Vertex};
use crate::renderer::framebuffer::{Framebuffer, Load};
use crate::renderer::instances::InstanceBuffer;
use crate::renderer::params::{ProgramParams, UniformBlock, uniform_entry};
use crate::renderer::quad::create_shader;
use crate::renderer::target::{RenderTarget, TargetDesc};

// ── Light transforms ──────────────────────────────────────────────────────────

/// `projection * view` for each cube face seen from `light`.
pub fn point_shadow_transforms(light: Vec3, near: f32, far: f32) -> [Mat4; 6] {
    let proj = capture_projection_range(near, far);
    std::array::from_fn(|face| proj * capture_view(face as u32, light))
}

/// Normalised distance stored in the point shadow cube.
pub fn linear_depth(frag: Vec3, light: Vec3, far: f32) -> f32 {
    (frag - light).length() / far
}

/// World → light clip space for a directional light aimed at the origin.
pub fn directional_light_space(direction: Vec3, config: &ShadowConfig) -> Mat4 {
    let dir = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
    let eye = -dir * config.directional_distance;
    let up = if dir.cross(Vec3::Y).length_squared() < 1e-6 { Vec3::Z } else { Vec3::Y };
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, up);
    let e = config.directional_extent;
    let proj = Mat4::orthographic_rh(-e, e, -e, e, config.directional_near, config.directional_far);
    proj * view
}

// ── Shared program ────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowParams {
    pub view_proj: [[f32; 4]; 4],
    /// Light position; w is the far plane.
    pub light: [f32; 4],
}

impl ProgramParams for ShadowParams {
    const LABEL: &'static str = "shadow";
}

/// Depth test applied when lighting samples a shadow map.
pub const SHADOW_COMPARE: wgpu::CompareFunction = wgpu::CompareFunction::LessEqual;

pub(crate) const SHADOW_WGSL: &str = "
struct ShadowParams {
    view_proj: mat4x4<f32>,
    light: vec4<f32>,
};

@group(0) @binding(0) var<uniform> shadow: ShadowParams;

struct ShadowOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) world: vec3<f32>,
}

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(5) model_0: vec4<f32>,
    @location(6) model_1: vec4<f32>,
    @location(7) model_2: vec4<f32>,
    @location(8) model_3: vec4<f32>,
) -> ShadowOut {
    let model = mat4x4<f32>(model_0, model_1, model_2, model_3);
    let world = model * vec4<f32>(position, 1.0);
    var out: ShadowOut;
    out.clip = shadow.view_proj * world;
    out.world = world.xyz;
    return out;
}

@fragment
fn fs_point(in: ShadowOut) -> @builtin(frag_depth) f32 {
    return length(in.world - shadow.light.xyz) / shadow.light.w;
}
";

fn shadow_pipeline(
    device: &wgpu::Device,
    label: &str,
    params_layout: &wgpu::BindGroupLayout,
    depth_format: wgpu::TextureFormat,
    linear_depth: bool,
) -> RenderResult<wgpu::RenderPipeline> {
    let shader = create_shader(device, label, SHADOW_WGSL)?;
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{label}_layout")),
        bind_group_layouts: &[params_layout],
        ..Default::default()
    });
    let fragment = linear_depth.then(|| wgpu::FragmentState {
        module: &shader,
        entry_point: Some("fs_point"),
        targets: &[],
        compilation_options: Default::default(),
    });
    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout(), InstanceRaw::layout()],
            compilation_options: Default::default(),
        },
        fragment,
        // The flipped cube projection reverses winding, so cube faces draw both sides.
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: if linear_depth { None } else { Some(wgpu::Face::Back) },
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    }))
}

fn params_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[uniform_entry::<ShadowParams>(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
    })
}

fn params_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    block: &UniformBlock<ShadowParams>,
) -> RenderResult<wgpu::BindGroup> {
    let entry = uniform_entry::<ShadowParams>(0, wgpu::ShaderStages::VERTEX_FRAGMENT);
    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("shadow_params_bg"),
        layout,
        entries: &[block.entry(&entry)?],
    }))
}

fn draw_casters(
    pass: &mut wgpu::RenderPass<'_>,
    meshes: &MeshLibrary,
    instances: &InstanceBuffer<InstanceRaw>,
    batches: &[Batch],
) {
    if instances.is_empty() {
        return;
    }
    pass.set_vertex_buffer(1, instances.slice());
    for batch in batches {
        meshes.get(batch.key.mesh).draw_instanced(pass, batch.instances.clone());
    }
}

// ── Point shadow ──────────────────────────────────────────────────────────────

pub struct PointShadow {
    pub cube: RenderTarget,
    framebuffer: Framebuffer,
    pipeline: wgpu::RenderPipeline,
    faces: Vec<(UniformBlock<ShadowParams>, wgpu::BindGroup)>,
    near: f32,
    far: f32,
}

impl PointShadow {
    pub fn new(device: &wgpu::Device, formats: &TargetFormats, config: &ShadowConfig) -> RenderResult<Self> {
        let desc = TargetDesc::cube("point_shadow", config.size, formats.shadow).with_compare(SHADOW_COMPARE);
        let cube = RenderTarget::new(device, desc)?;
        let layout = params_layout(device, "point_shadow_params_layout");
        let pipeline = shadow_pipeline(device, "point_shadow", &layout, formats.shadow.to_wgpu(), true)?;

        let idle = ShadowParams { view_proj: Mat4::IDENTITY.to_cols_array_2d(), light: [0.0, 0.0, 0.0, config.far] };
        let faces = (0..FACE_COUNT)
            .map(|_| {
                let block = UniformBlock::new(device, &idle);
                let group = params_group(device, &layout, &block)?;
                Ok((block, group))
            })
            .collect::<RenderResult<Vec<_>>>()?;

        log::info!("point shadow: {}² cube, near {} far {}", config.size, config.near, config.far);
        Ok(Self { cube, framebuffer: Framebuffer::new("point_shadow"), pipeline, faces, near: config.near, far: config.far })
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn prepare(&self, queue: &wgpu::Queue, light: Vec3) {
        let transforms = point_shadow_transforms(light, self.near, self.far);
        for ((block, _), view_proj) in self.faces.iter().zip(transforms) {
            block.write(queue, &ShadowParams { view_proj: view_proj.to_cols_array_2d(), light: light.extend(self.far).to_array() });
        }
    }

    /// Render every face: attach, bind, draw, unbind, detach.
    pub fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        meshes: &MeshLibrary,
        instances: &InstanceBuffer<InstanceRaw>,
        batches: &[Batch],
    ) -> RenderResult<()> {
        for (face, (_, group)) in self.faces.iter().enumerate() {
            self.framebuffer.attach_depth(&self.cube, Some(face as u32))?;
            {
                let mut pass = self.framebuffer.bind(encoder, Load::Clear)?;
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, group, &[]);
                draw_casters(&mut pass, meshes, instances, batches);
                Framebuffer::unbind(pass);
            }
            self.framebuffer.detach_depth();
        }
        Ok(())
    }
}

// ── Directional shadow ────────────────────────────────────────────────────────

pub struct DirectionalShadow {
    pub map: RenderTarget,
    framebuffer: Framebuffer,
    pipeline: wgpu::RenderPipeline,
    params: UniformBlock<ShadowParams>,
    group: wgpu::BindGroup,
    config: ShadowConfig,
    light_space: Mat4,
}

impl DirectionalShadow {
    pub fn new(device: &wgpu::Device, formats: &TargetFormats, config: &ShadowConfig) -> RenderResult<Self> {
        let size = config.directional_size;
        let desc = TargetDesc::new("directional_shadow", size, size, formats.shadow).with_compare(SHADOW_COMPARE);
        let map = RenderTarget::new(device, desc)?;
        let framebuffer = Framebuffer::with_targets("directional_shadow", &[], Some(&map))?;
        let layout = params_layout(device, "directional_shadow_params_layout");
        let pipeline = shadow_pipeline(device, "directional_shadow", &layout, formats.shadow.to_wgpu(), false)?;
        let light_space = directional_light_space(Vec3::NEG_Y, config);
        let params = UniformBlock::new(
            device,
            &ShadowParams { view_proj: light_space.to_cols_array_2d(), light: [0.0, 0.0, 0.0, config.directional_far] },
        );
        let group = params_group(device, &layout, &params)?;

        debug_assert!(framebuffer.layout().color_write_mask().is_empty());
        log::info!("directional shadow: {}² map, extent ±{}", size, config.directional_extent);
        Ok(Self { map, framebuffer, pipeline, params, group, config: config.clone(), light_space })
    }

    pub fn light_space(&self) -> Mat4 {
        self.light_space
    }

    pub fn prepare(&mut self, queue: &wgpu::Queue, direction: Vec3) {
        self.light_space = directional_light_space(direction, &self.config);
        self.params.write(
            queue,
            &ShadowParams {
                view_proj: self.light_space.to_cols_array_2d(),
                light: [0.0, 0.0, 0.0, self.config.directional_far],
            },
        );
    }

    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        meshes: &MeshLibrary,
        instances: &InstanceBuffer<InstanceRaw>,
        batches: &[Batch],
    ) -> RenderResult<()> {
        let mut pass = self.framebuffer.bind(encoder, Load::Clear)?;
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.group, &[]);
        draw_casters(&mut pass, meshes, instances, batches);
        Framebuffer::unbind(pass);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(m: Mat4, p: Vec3) -> Vec3 {
        let clip = m * p.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn point_along_face_axis_hits_face_centre() {
        let light = Vec3::new(2.0, 1.5, 2.25);
        let transforms = point_shadow_transforms(light, 1.0, 25.0);
        let axes = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        for (m, axis) in transforms.iter().zip(axes) {
            let ndc = project(*m, light + axis * 5.0);
            assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4, "{ndc:?}");
            assert!(ndc.z > 0.0 && ndc.z < 1.0);
        }
    }

    #[test]
    fn linear_depth_is_normalised_by_far() {
        assert!((linear_depth(Vec3::new(3.0, 4.0, 0.0), Vec3::ZERO, 25.0) - 0.2).abs() < 1e-6);
        assert_eq!(linear_depth(Vec3::ONE, Vec3::ONE, 25.0), 0.0);
    }

    #[test]
    fn origin_lies_inside_directional_frustum() {
        let cfg = ShadowConfig::default();
        let m = directional_light_space(Vec3::new(-0.2, -1.0, -0.3), &cfg);
        let ndc = project(m, Vec3::ZERO);
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        let expected = (cfg.directional_distance - cfg.directional_near) / (cfg.directional_far - cfg.directional_near);
        assert!((ndc.z - expected).abs() < 1e-4);
    }

    #[test]
    fn straight_down_light_is_finite() {
        let m = directional_light_space(Vec3::NEG_Y, &ShadowConfig::default());
        assert!(m.to_cols_array().iter().all(|v| v.is_finite()));
        let beyond = project(m, Vec3::new(50.0, 0.0, 0.0));
        assert!(beyond.x.abs() > 1.0);
    }
}
