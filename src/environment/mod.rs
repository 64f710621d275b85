//! One-shot environment precomputation: equirect projection, irradiance
//! convolution, specular prefilter and the split-sum BRDF LUT.
//!
//! Everything here runs once before the frame loop. The stages record into a
//! single encoder, which is submitted and waited on before the loop starts.

pub mod brdf;
pub mod capture;
pub mod irradiance;
pub mod prefilter;
pub mod projection;
pub mod sampling;
pub mod skybox;

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::assets::HdrImage;
use crate::config::{EnvironmentConfig, TargetFormats};
use crate::error::{RenderError, RenderResult};
use crate::geometry::{self, GpuMesh, Vertex};
use crate::renderer::framebuffer::{Framebuffer, Load};
use crate::renderer::params::{ProgramParams, UniformBlock, uniform_entry};
use crate::renderer::quad::{SHADER_COMMON, create_shader};
use crate::renderer::target::{PixelFormat, RenderTarget, TargetDesc};

use capture::FaceDraw;

// ── Sub-stage toggles ─────────────────────────────────────────────────────────

/// Environment sub-stages in execution order. A later stage depends on every
/// earlier one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentStages {
    pub projection: bool,
    pub irradiance: bool,
    pub prefilter: bool,
    pub brdf: bool,
}

impl Default for EnvironmentStages {
    fn default() -> Self {
        Self { projection: true, irradiance: true, prefilter: true, brdf: true }
    }
}

impl EnvironmentStages {
    pub fn ordered(&self) -> [(&'static str, bool); 4] {
        [
            ("projection", self.projection),
            ("irradiance", self.irradiance),
            ("prefilter", self.prefilter),
            ("brdf", self.brdf),
        ]
    }

    /// Enabled stages must form a prefix of the execution order.
    pub fn check_order(&self) -> RenderResult<()> {
        let mut previous = true;
        for (name, enabled) in self.ordered() {
            if enabled && !previous {
                return Err(RenderError::order(format!("environment stage `{name}` enabled after a disabled stage")));
            }
            previous = enabled;
        }
        Ok(())
    }

    /// Whether lighting can use image-based ambient.
    pub fn complete(&self) -> bool {
        self.projection && self.irradiance && self.prefilter && self.brdf
    }
}

// ── Capture parameters ────────────────────────────────────────────────────────

/// Per-face parameter block shared by every cube program.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CaptureParams {
    pub view_proj: [[f32; 4]; 4],
    pub face: u32,
    pub sample_count: u32,
    pub roughness: f32,
    /// Face size of the source cube at mip 0.
    pub source_size: f32,
    /// Integration step in radians.
    pub angle_step: f32,
    pub _pad: [f32; 3],
}

impl ProgramParams for CaptureParams {
    const LABEL: &'static str = "capture";
}

impl CaptureParams {
    pub fn for_face(draw: FaceDraw) -> Self {
        let vps = capture::capture_view_projs();
        Self {
            view_proj: vps[draw.face as usize].to_cols_array_2d(),
            face: draw.face,
            sample_count: 0,
            roughness: 0.0,
            source_size: 0.0,
            angle_step: 0.0,
            _pad: [0.0; 3],
        }
    }
}

/// Vertex stage shared by the cube-mesh capture programs.
pub const CAPTURE_VS: &str = "
struct CaptureParams {
    view_proj: mat4x4<f32>,
    face: u32,
    sample_count: u32,
    roughness: f32,
    source_size: f32,
    angle_step: f32,
};

@group(0) @binding(0) var<uniform> params: CaptureParams;

struct CaptureOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) local: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> CaptureOut {
    var out: CaptureOut;
    out.local = position;
    out.clip = params.view_proj * vec4<f32>(position, 1.0);
    return out;
}
";

/// Cube-capture vertex stage followed by `fragment`.
pub(crate) fn capture_source(fragment: &str) -> String {
    format!("{SHADER_COMMON}{CAPTURE_VS}{fragment}")
}

// ── Capture context ───────────────────────────────────────────────────────────

/// Shared resources for drawing the unit cube into cube-map faces.
pub struct CaptureContext<'d> {
    device: &'d wgpu::Device,
    cube: GpuMesh,
    params_layout: wgpu::BindGroupLayout,
    /// Depth store attached behind every face; resized to each mip's extent.
    scratch_depth: RenderTarget,
    framebuffer: Framebuffer,
    faces_drawn: u32,
}

impl<'d> CaptureContext<'d> {
    pub fn new(device: &'d wgpu::Device, initial_size: u32) -> RenderResult<Self> {
        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("capture_params_layout"),
            entries: &[uniform_entry::<CaptureParams>(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let scratch_depth = RenderTarget::new(
            device,
            TargetDesc::new("capture_depth", initial_size, initial_size, PixelFormat::Depth32Float),
        )?;
        Ok(Self {
            device,
            cube: GpuMesh::upload(device, "capture_cube", &geometry::cube()),
            params_layout,
            scratch_depth,
            framebuffer: Framebuffer::new("capture"),
            faces_drawn: 0,
        })
    }

    pub fn device(&self) -> &'d wgpu::Device { self.device }
    pub fn params_layout(&self) -> &wgpu::BindGroupLayout { &self.params_layout }
    pub fn scratch_size(&self) -> (u32, u32) { self.scratch_depth.size() }
    pub fn faces_drawn(&self) -> u32 { self.faces_drawn }

    /// Build a cube-mesh program from a [`capture_source`] writing one colour
    /// target of `format`.
    pub fn cube_program(
        &self,
        label: &str,
        source: &str,
        source_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> RenderResult<wgpu::RenderPipeline> {
        let shader = create_shader(self.device, label, source)?;
        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{}_layout", label)),
            bind_group_layouts: &[&self.params_layout, source_layout],
            ..Default::default()
        });
        Ok(self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            // Seen from inside; the flipped capture projection also flips winding.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
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

    /// Draw the cube once per entry of `plan` into the matching face and mip of `target`.
    ///
    /// Each face is attached, bound, drawn, unbound and detached in turn. The
    /// scratch depth store is resized before the first face of every mip.
    pub fn capture(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        program: &wgpu::RenderPipeline,
        source: &wgpu::BindGroup,
        target: &RenderTarget,
        plan: &[FaceDraw],
        params_for: impl Fn(FaceDraw) -> CaptureParams,
    ) -> RenderResult<u32> {
        let mut drawn = 0;
        let mut current_mip = None;
        for &draw in plan {
            if current_mip != Some(draw.mip) {
                self.scratch_depth.resize_storage(self.device, draw.size, draw.size)?;
                self.framebuffer.attach_depth(&self.scratch_depth, None)?;
                current_mip = Some(draw.mip);
            }

            let block = UniformBlock::new(self.device, &params_for(draw));
            let params_entry = uniform_entry::<CaptureParams>(0, wgpu::ShaderStages::VERTEX_FRAGMENT);
            let params_bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("capture_params_bg"),
                layout: &self.params_layout,
                entries: &[block.entry(&params_entry)?],
            });

            self.framebuffer.attach(target, 0, Some(draw.face), Some(draw.mip))?;
            {
                let mut pass = self.framebuffer.bind(encoder, Load::Clear)?;
                pass.set_pipeline(program);
                pass.set_bind_group(0, &params_bg, &[]);
                pass.set_bind_group(1, source, &[]);
                self.cube.draw(&mut pass);
                Framebuffer::unbind(pass);
            }
            self.framebuffer.detach(0);
            drawn += 1;
        }
        self.framebuffer.detach_depth();
        self.faces_drawn += drawn;
        Ok(drawn)
    }
}

// ── Environment maps ──────────────────────────────────────────────────────────

/// Long-lived outputs of the precomputation. Each is present when its stage ran.
#[derive(Default)]
pub struct EnvironmentMaps {
    pub cube: Option<RenderTarget>,
    pub irradiance: Option<RenderTarget>,
    pub prefilter: Option<RenderTarget>,
    pub brdf_lut: Option<RenderTarget>,
}

impl EnvironmentMaps {
    /// All four maps, when image-based lighting is available.
    pub fn ibl(&self) -> Option<(&RenderTarget, &RenderTarget, &RenderTarget)> {
        match (&self.irradiance, &self.prefilter, &self.brdf_lut) {
            (Some(i), Some(p), Some(b)) if self.cube.is_some() => Some((i, p, b)),
            _ => None,
        }
    }

    pub fn prefilter_max_lod(&self) -> f32 {
        self.prefilter.as_ref().map(|p| (p.mip_levels() - 1) as f32).unwrap_or(0.0)
    }
}

/// Run the enabled environment stages in order and wait for the GPU to finish.
///
/// `hdr` is consumed: the source texture is dropped once the cube is projected.
pub fn precompute(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    config: &EnvironmentConfig,
    formats: &TargetFormats,
    hdr: HdrImage,
) -> RenderResult<EnvironmentMaps> {
    let stages = &config.stages;
    stages.check_order()?;

    let started = Instant::now();
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("environment_precompute"),
    });
    let mut ctx = CaptureContext::new(device, config.cube_size)?;
    let mut maps = EnvironmentMaps::default();

    if stages.projection {
        let source = hdr.upload(device, queue);
        let cube = projection::project(&mut ctx, &mut encoder, &source, config, formats.environment)?;
        log::info!("environment: projected {}x{} HDR to {}² cube", hdr.width, hdr.height, config.cube_size);
        maps.cube = Some(cube);
    }
    drop(hdr);

    if let (true, Some(cube)) = (stages.irradiance, &maps.cube) {
        maps.irradiance = Some(irradiance::convolve(&mut ctx, &mut encoder, cube, config, formats.environment)?);
    }
    if let (true, Some(cube)) = (stages.prefilter, &maps.cube) {
        maps.prefilter = Some(prefilter::prefilter(&mut ctx, &mut encoder, cube, config, formats.environment)?);
    }
    if stages.brdf {
        maps.brdf_lut = Some(brdf::integrate(device, &mut encoder, config, formats.brdf_lut)?);
    }

    let faces = ctx.faces_drawn();
    drop(ctx);

    let index = queue.submit(std::iter::once(encoder.finish()));
    device
        .poll(wgpu::PollType::Wait { submission_index: Some(index), timeout: None })
        .map_err(RenderError::device)?;

    log::info!(
        "environment precompute: {} cube faces in {:.1} ms",
        faces,
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(maps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_params_block_is_aligned() {
        assert_eq!(CaptureParams::size() % 16, 0);
        assert_eq!(CaptureParams::size(), 96);
    }

    #[test]
    fn default_stages_are_complete() {
        let stages = EnvironmentStages::default();
        assert!(stages.complete());
        let names: Vec<&str> = stages.ordered().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["projection", "irradiance", "prefilter", "brdf"]);
    }

    #[test]
    fn face_params_carry_face_index() {
        let p = CaptureParams::for_face(FaceDraw { mip: 2, face: 4, size: 32 });
        assert_eq!(p.face, 4);
        let vp = glam::Mat4::from_cols_array_2d(&p.view_proj);
        assert!(vp.abs_diff_eq(capture::capture_view_projs()[4], 1e-6));
    }
}
