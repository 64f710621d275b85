//! Point-light volumes and light markers.
//!
//! Volumes draw one sphere per point light, scaled to its attenuation radius,
//! and shade only the G-Buffer texels they cover. Back faces are drawn without
//! a depth test so the camera may stand inside a volume; contributions add up
//! with One/One blending on top of the lit scene.
//!
//! Markers forward-render a small emissive sphere at each point light against
//! the G-Buffer depth.

use glam::{Mat4, Vec3};

use crate::camera::CAMERA_WGSL;
use crate::error::RenderResult;
use crate::geometry::{MeshKind, MeshLibrary, Vertex};
use crate::renderer::framebuffer::Framebuffer;
use crate::renderer::instances::InstanceBuffer;
use crate::renderer::params::{ProgramParams, UniformBlock, uniform_entry};
use crate::renderer::quad::{SHADER_COMMON, create_shader, texture_entry};

use super::gbuffer::GBufferTargets;
use super::light::{LIGHT_WGSL, Light};

/// Marker sphere scale relative to the unit sphere.
pub const MARKER_SCALE: f32 = 0.25;

// ── Instances ─────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VolumeInstance {
    pub model: [[f32; 4]; 4],
    /// View-space position, w = kind.
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub attenuation: [f32; 4],
}

impl VolumeInstance {
    const ATTRIBS: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
        10 => Float32x4,
        11 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<VolumeInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MarkerInstance {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl MarkerInstance {
    const ATTRIBS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MarkerInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// One volume per point light, in light order. Directional lights have no volume.
pub fn volume_instances(lights: &[Light], view: Mat4) -> Vec<VolumeInstance> {
    lights
        .iter()
        .filter_map(|light| match *light {
            Light::Point { position, .. } => {
                let radius = light.radius()?.min(1.0e4);
                let block = light.to_block(view);
                Some(VolumeInstance {
                    model: (Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(radius))).to_cols_array_2d(),
                    position: block.position,
                    color: block.color,
                    attenuation: block.attenuation,
                })
            }
            Light::Directional { .. } => None,
        })
        .collect()
}

pub fn marker_instances(lights: &[Light]) -> Vec<MarkerInstance> {
    lights
        .iter()
        .filter_map(|light| match *light {
            Light::Point { position, color, .. } => Some(MarkerInstance {
                model: (Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(MARKER_SCALE)))
                    .to_cols_array_2d(),
                color: color.extend(1.0).to_array(),
            }),
            Light::Directional { .. } => None,
        })
        .collect()
}

// ── Light volumes ─────────────────────────────────────────────────────────────

const VOLUME_WGSL: &str = "
@group(1) @binding(0) var g_position: texture_2d<f32>;
@group(1) @binding(1) var g_normal: texture_2d<f32>;
@group(1) @binding(2) var g_albedo_spec: texture_2d<f32>;

struct VolumeIn {
    @location(5) model_0: vec4<f32>,
    @location(6) model_1: vec4<f32>,
    @location(7) model_2: vec4<f32>,
    @location(8) model_3: vec4<f32>,
    @location(9) position: vec4<f32>,
    @location(10) color: vec4<f32>,
    @location(11) attenuation: vec4<f32>,
}

struct VolumeOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) position: vec4<f32>,
    @location(1) color: vec4<f32>,
    @location(2) attenuation: vec4<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>, inst: VolumeIn) -> VolumeOut {
    let model = mat4x4<f32>(inst.model_0, inst.model_1, inst.model_2, inst.model_3);
    var out: VolumeOut;
    out.clip = camera.view_proj * model * vec4<f32>(position, 1.0);
    out.position = inst.position;
    out.color = inst.color;
    out.attenuation = inst.attenuation;
    return out;
}

@fragment
fn fs_main(in: VolumeOut) -> @location(0) vec4<f32> {
    let coord = vec2<i32>(in.clip.xy);
    let normal = textureLoad(g_normal, coord, 0).xyz;
    if (length(normal) < 0.5) {
        return vec4<f32>(0.0);
    }
    let p = textureLoad(g_position, coord, 0).xyz;
    let albedo_spec = textureLoad(g_albedo_spec, coord, 0);
    var light: Light;
    light.position = in.position;
    light.direction = vec4<f32>(0.0);
    light.color = in.color;
    light.attenuation = in.attenuation;
    return vec4<f32>(blinn_phong(light, p, normalize(normal), albedo_spec.rgb, albedo_spec.a), 0.0);
}
";

pub(crate) fn volume_source() -> String {
    format!("{SHADER_COMMON}{CAMERA_WGSL}{LIGHT_WGSL}{VOLUME_WGSL}")
}

/// Additive point-light spheres over the lit scene.
///
/// Volumes write only the scene target. Light they add never reaches the
/// bright target, so bloom does not pick it up.
pub struct LightVolumes {
    framebuffer: Framebuffer,
    pipeline: wgpu::RenderPipeline,
    input_layout: wgpu::BindGroupLayout,
    input_group: wgpu::BindGroup,
    instances: InstanceBuffer<VolumeInstance>,
}

impl LightVolumes {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        gbuffer: &GBufferTargets,
        scene: &crate::renderer::target::RenderTarget,
    ) -> RenderResult<Self> {
        let framebuffer = Framebuffer::with_targets("light_volumes", &[scene], None)?;
        let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("light_volume_input_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2, false),
                texture_entry(1, wgpu::TextureViewDimension::D2, false),
                texture_entry(2, wgpu::TextureViewDimension::D2, false),
            ],
        });
        let input_group = Self::input_group(device, &input_layout, gbuffer);

        let shader = create_shader(device, "light_volumes", &volume_source())?;
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("light_volume_layout"),
            bind_group_layouts: &[camera_layout, &input_layout],
            ..Default::default()
        });
        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };
        let targets = framebuffer.layout().color_targets(Some(additive));
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("light_volumes"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout(), VolumeInstance::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Front),
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(Self {
            framebuffer,
            pipeline,
            input_layout,
            input_group,
            instances: InstanceBuffer::new(device, "light_volume_instances"),
        })
    }

    fn input_group(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, gbuffer: &GBufferTargets) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("light_volume_input_bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(gbuffer.position.view()) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(gbuffer.normal.view()) },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(gbuffer.albedo_spec.view()),
                },
            ],
        })
    }

    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        gbuffer: &GBufferTargets,
        scene: &crate::renderer::target::RenderTarget,
    ) -> RenderResult<()> {
        self.framebuffer = Framebuffer::with_targets("light_volumes", &[scene], None)?;
        self.input_group = Self::input_group(device, &self.input_layout, gbuffer);
        Ok(())
    }

    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, lights: &[Light], view: Mat4) {
        self.instances.write(device, queue, &volume_instances(lights, view));
    }

    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        camera: &wgpu::BindGroup,
        meshes: &MeshLibrary,
    ) -> RenderResult<()> {
        if self.instances.is_empty() {
            return Ok(());
        }
        let mut pass = self.framebuffer.bind(encoder, crate::renderer::framebuffer::Load::Keep)?;
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, &self.input_group, &[]);
        pass.set_vertex_buffer(1, self.instances.slice());
        meshes.get(MeshKind::Sphere).draw_instanced(&mut pass, 0..self.instances.len());
        Framebuffer::unbind(pass);
        Ok(())
    }
}

// ── Light markers ─────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MarkerParams {
    pub bloom_threshold: f32,
    pub _pad: [f32; 3],
}

impl ProgramParams for MarkerParams {
    const LABEL: &'static str = "light_markers";
}

const MARKER_WGSL: &str = "
struct MarkerParams {
    bloom_threshold: f32,
};

@group(1) @binding(0) var<uniform> params: MarkerParams;

struct MarkerOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec3<f32>,
}

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(5) model_0: vec4<f32>,
    @location(6) model_1: vec4<f32>,
    @location(7) model_2: vec4<f32>,
    @location(8) model_3: vec4<f32>,
    @location(9) color: vec4<f32>,
) -> MarkerOut {
    let model = mat4x4<f32>(model_0, model_1, model_2, model_3);
    var out: MarkerOut;
    out.clip = camera.view_proj * model * vec4<f32>(position, 1.0);
    out.color = color.rgb;
    return out;
}

struct MarkerTargets {
    @location(0) scene: vec4<f32>,
    @location(1) bright: vec4<f32>,
}

@fragment
fn fs_main(in: MarkerOut) -> MarkerTargets {
    var out: MarkerTargets;
    out.scene = vec4<f32>(in.color, 1.0);
    out.bright = vec4<f32>(0.0, 0.0, 0.0, 1.0);
    if (luminance(in.color) > params.bloom_threshold) {
        out.bright = vec4<f32>(in.color, 1.0);
    }
    return out;
}
";

pub(crate) fn marker_source() -> String {
    format!("{SHADER_COMMON}{CAMERA_WGSL}{MARKER_WGSL}")
}

pub struct LightMarkers {
    pipeline: wgpu::RenderPipeline,
    _params: UniformBlock<MarkerParams>,
    group: wgpu::BindGroup,
    instances: InstanceBuffer<MarkerInstance>,
}

impl LightMarkers {
    /// Markers draw into the forward framebuffer: scene and bright colour
    /// targets over the G-Buffer depth store.
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        color_formats: [wgpu::TextureFormat; 2],
        depth_format: wgpu::TextureFormat,
        bloom_threshold: f32,
    ) -> RenderResult<Self> {
        let entry = uniform_entry::<MarkerParams>(0, wgpu::ShaderStages::FRAGMENT);
        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("light_marker_layout"),
            entries: &[entry],
        });
        let params = UniformBlock::new(device, &MarkerParams { bloom_threshold, _pad: [0.0; 3] });
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("light_marker_bg"),
            layout: &params_layout,
            entries: &[params.entry(&entry)?],
        });

        let shader = create_shader(device, "light_markers", &marker_source())?;
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("light_marker_pipeline_layout"),
            bind_group_layouts: &[camera_layout, &params_layout],
            ..Default::default()
        });
        let targets = color_formats.map(|format| {
            Some(wgpu::ColorTargetState { format, blend: None, write_mask: wgpu::ColorWrites::ALL })
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("light_markers"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout(), MarkerInstance::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(Self { pipeline, _params: params, group, instances: InstanceBuffer::new(device, "light_marker_instances") })
    }

    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, lights: &[Light]) {
        self.instances.write(device, queue, &marker_instances(lights));
    }

    /// Draw into an already bound forward pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, camera: &wgpu::BindGroup, meshes: &MeshLibrary) {
        if self.instances.is_empty() {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, &self.group, &[]);
        pass.set_vertex_buffer(1, self.instances.slice());
        meshes.get(MeshKind::Sphere).draw_instanced(pass, 0..self.instances.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lights() -> Vec<Light> {
        vec![
            Light::point(Vec3::new(1.0, 0.0, 0.0), Vec3::ONE),
            Light::directional(Vec3::NEG_Y, Vec3::ONE),
            Light::point(Vec3::new(0.0, 2.0, 0.0), Vec3::splat(4.0)),
        ]
    }

    #[test]
    fn one_volume_per_point_light_scaled_by_radius() {
        let lights = lights();
        let volumes = volume_instances(&lights, Mat4::IDENTITY);
        assert_eq!(volumes.len(), 2);
        let model = Mat4::from_cols_array_2d(&volumes[1].model);
        let (scale, _, translation) = model.to_scale_rotation_translation();
        let radius = lights[2].radius().unwrap();
        assert!((scale.x - radius).abs() < 1e-4);
        assert!((translation - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-5);
        assert_eq!(volumes[1].attenuation[3], radius);
    }

    #[test]
    fn volumes_carry_view_space_positions() {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
        let volumes = volume_instances(&lights(), view);
        assert_eq!(&volumes[0].position[..3], &[1.0, 0.0, -3.0]);
    }

    #[test]
    fn markers_are_small_and_coloured() {
        let markers = marker_instances(&lights());
        assert_eq!(markers.len(), 2);
        let model = Mat4::from_cols_array_2d(&markers[0].model);
        let (scale, _, _) = model.to_scale_rotation_translation();
        assert!((scale.x - MARKER_SCALE).abs() < 1e-6);
        assert_eq!(markers[1].color, [4.0, 4.0, 4.0, 1.0]);
    }
}
