//! Background pass drawing the environment cube behind lit geometry.

use crate::camera::CAMERA_WGSL;
use crate::error::RenderResult;
use crate::geometry::{self, GpuMesh, Vertex};
use crate::renderer::params::{ProgramParams, UniformBlock, uniform_entry};
use crate::renderer::quad::{SHADER_COMMON, create_shader, sampler_entry, texture_entry};
use crate::renderer::target::RenderTarget;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkyboxParams {
    /// Luminance above which the sky also feeds the bright target.
    pub bloom_threshold: f32,
    /// Mip of the environment cube to show; 0 is sharp.
    pub lod: f32,
    pub _pad: [f32; 2],
}

impl ProgramParams for SkyboxParams {
    const LABEL: &'static str = "skybox";
}

const SKYBOX_WGSL: &str = "
struct SkyboxParams {
    bloom_threshold: f32,
    lod: f32,
};

@group(1) @binding(0) var<uniform> params: SkyboxParams;
@group(1) @binding(1) var environment: texture_cube<f32>;
@group(1) @binding(2) var environment_sampler: sampler;

struct SkyOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) dir: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> SkyOut {
    let rot = mat4x4<f32>(
        vec4<f32>(camera.view[0].xyz, 0.0),
        vec4<f32>(camera.view[1].xyz, 0.0),
        vec4<f32>(camera.view[2].xyz, 0.0),
        vec4<f32>(0.0, 0.0, 0.0, 1.0),
    );
    let clip = camera.projection * rot * vec4<f32>(position, 1.0);
    var out: SkyOut;
    out.clip = clip.xyww;
    out.dir = position;
    return out;
}

struct SkyTargets {
    @location(0) scene: vec4<f32>,
    @location(1) bright: vec4<f32>,
}

@fragment
fn fs_main(in: SkyOut) -> SkyTargets {
    let color = textureSampleLevel(environment, environment_sampler, normalize(in.dir), params.lod).rgb;
    var out: SkyTargets;
    out.scene = vec4<f32>(color, 1.0);
    out.bright = vec4<f32>(0.0, 0.0, 0.0, 1.0);
    if (luminance(color) > params.bloom_threshold) {
        out.bright = vec4<f32>(color, 1.0);
    }
    return out;
}
";

pub(crate) fn skybox_source() -> String {
    format!("{SHADER_COMMON}{CAMERA_WGSL}{SKYBOX_WGSL}")
}

pub struct Skybox {
    pipeline: wgpu::RenderPipeline,
    _params: UniformBlock<SkyboxParams>,
    group: wgpu::BindGroup,
    cube: GpuMesh,
}

impl Skybox {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        environment: &RenderTarget,
        color_formats: [wgpu::TextureFormat; 2],
        depth_format: wgpu::TextureFormat,
        bloom_threshold: f32,
    ) -> RenderResult<Self> {
        let params_entry = uniform_entry::<SkyboxParams>(0, wgpu::ShaderStages::FRAGMENT);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("skybox_layout"),
            entries: &[
                params_entry,
                texture_entry(1, wgpu::TextureViewDimension::Cube, true),
                sampler_entry(2, wgpu::SamplerBindingType::Filtering),
            ],
        });
        let params = UniformBlock::new(device, &SkyboxParams { bloom_threshold, lod: 0.0, _pad: [0.0; 2] });
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skybox_bg"),
            layout: &layout,
            entries: &[
                params.entry(&params_entry)?,
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(environment.view()) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(environment.sampler()) },
            ],
        });

        let shader = create_shader(device, "skybox", &skybox_source())?;
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("skybox_pipeline_layout"),
            bind_group_layouts: &[camera_layout, &layout],
            ..Default::default()
        });
        let targets = color_formats.map(|format| {
            Some(wgpu::ColorTargetState { format, blend: None, write_mask: wgpu::ColorWrites::ALL })
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("skybox"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
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
                cull_mode: None,
                ..Default::default()
            },
            // z = w puts the sky at depth 1, behind anything the G-Buffer wrote.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(Self { pipeline, _params: params, group, cube: GpuMesh::upload(device, "skybox_cube", &geometry::cube()) })
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, camera: &wgpu::BindGroup) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, &self.group, &[]);
        self.cube.draw(pass);
    }
}
