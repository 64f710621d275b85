use crate::config::{BloomConfig, LightingConfig};
use crate::error::RenderResult;
use crate::renderer::framebuffer::{Framebuffer, Load, bind_display};
use crate::renderer::params::{ProgramParams, UniformBlock, uniform_entry};
use crate::renderer::quad::{FULLSCREEN_VS, create_fullscreen_pipeline, draw_quad, opaque_target, sampler_entry, texture_entry};
use crate::renderer::target::{RenderTarget, TargetDesc, Wrap};

use super::pingpong::{BlurSource, PingPong};

// ── Blur ──────────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlurParams {
    pub horizontal: u32,
    pub _pad: [u32; 3],
}

impl ProgramParams for BlurParams {
    const LABEL: &'static str = "bloom_blur";
}

const BLUR_FS: &str = "
struct BlurParams {
    horizontal: u32,
};

@group(0) @binding(0) var image: texture_2d<f32>;
@group(0) @binding(1) var image_sampler: sampler;
@group(1) @binding(0) var<uniform> blur: BlurParams;

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let texel = 1.0 / vec2<f32>(textureDimensions(image));
    var dir = vec2<f32>(0.0, texel.y);
    if (blur.horizontal != 0u) {
        dir = vec2<f32>(texel.x, 0.0);
    }
    var result = textureSampleLevel(image, image_sampler, in.uv, 0.0).rgb * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = dir * f32(i);
        result = result + textureSampleLevel(image, image_sampler, in.uv + offset, 0.0).rgb * weights[i];
        result = result + textureSampleLevel(image, image_sampler, in.uv - offset, 0.0).rgb * weights[i];
    }
    return vec4<f32>(result, 1.0);
}
";

pub(crate) fn blur_source() -> String {
    format!("{FULLSCREEN_VS}{BLUR_FS}")
}

/// Separable Gaussian over the bright target, alternating two buffers.
pub struct BloomPass {
    buffers: [RenderTarget; 2],
    framebuffers: [Framebuffer; 2],
    pipeline: wgpu::RenderPipeline,
    image_layout: wgpu::BindGroupLayout,
    /// Source groups for the bright target, buffer 0 and buffer 1.
    sources: [wgpu::BindGroup; 3],
    _directions: [UniformBlock<BlurParams>; 2],
    direction_groups: [wgpu::BindGroup; 2],
    iterations: u32,
    pingpong: PingPong,
}

impl BloomPass {
    pub fn new(device: &wgpu::Device, config: &BloomConfig, bright: &RenderTarget) -> RenderResult<Self> {
        let (w, h) = bright.size();
        let buffers = Self::buffers(device, bright, w, h)?;
        let framebuffers = Self::framebuffers(&buffers)?;

        let image_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom_image_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2, true),
                sampler_entry(1, wgpu::SamplerBindingType::Filtering),
            ],
        });
        let sources = Self::sources(device, &image_layout, bright, &buffers);

        let entry = uniform_entry::<BlurParams>(0, wgpu::ShaderStages::FRAGMENT);
        let direction_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom_direction_layout"),
            entries: &[entry],
        });
        let directions = [
            UniformBlock::new(device, &BlurParams { horizontal: 0, _pad: [0; 3] }),
            UniformBlock::new(device, &BlurParams { horizontal: 1, _pad: [0; 3] }),
        ];
        let direction_group = |block: &UniformBlock<BlurParams>| -> RenderResult<wgpu::BindGroup> {
            Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("bloom_direction_bg"),
                layout: &direction_layout,
                entries: &[block.entry(&entry)?],
            }))
        };
        let direction_groups = [direction_group(&directions[0])?, direction_group(&directions[1])?];

        let pipeline = create_fullscreen_pipeline(
            device,
            "bloom_blur",
            &blur_source(),
            &[&image_layout, &direction_layout],
            &framebuffers[0].layout().color_targets(None),
        )?;

        log::info!("bloom: {}x{}, {} blur iterations", w, h, config.iterations);
        Ok(Self {
            buffers,
            framebuffers,
            pipeline,
            image_layout,
            sources,
            _directions: directions,
            direction_groups,
            iterations: config.iterations,
            pingpong: PingPong::new(),
        })
    }

    fn buffers(device: &wgpu::Device, bright: &RenderTarget, w: u32, h: u32) -> RenderResult<[RenderTarget; 2]> {
        let desc = |label: &str| TargetDesc::new(label, w, h, bright.format()).with_wrap(Wrap::ClampToEdge);
        Ok([RenderTarget::new(device, desc("bloom_pingpong_0"))?, RenderTarget::new(device, desc("bloom_pingpong_1"))?])
    }

    fn framebuffers(buffers: &[RenderTarget; 2]) -> RenderResult<[Framebuffer; 2]> {
        Ok([
            Framebuffer::with_targets("bloom_pingpong_0", &[&buffers[0]], None)?,
            Framebuffer::with_targets("bloom_pingpong_1", &[&buffers[1]], None)?,
        ])
    }

    fn sources(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        bright: &RenderTarget,
        buffers: &[RenderTarget; 2],
    ) -> [wgpu::BindGroup; 3] {
        [bright, &buffers[0], &buffers[1]].map(|target| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("bloom_source_bg"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(target.view()) },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(target.sampler()) },
                ],
            })
        })
    }

    pub fn resize(&mut self, device: &wgpu::Device, bright: &RenderTarget) -> RenderResult<()> {
        let (w, h) = bright.size();
        for buffer in &mut self.buffers {
            buffer.recreate(device, w, h)?;
        }
        self.framebuffers = Self::framebuffers(&self.buffers)?;
        self.sources = Self::sources(device, &self.image_layout, bright, &self.buffers);
        Ok(())
    }

    /// Run the whole blur chain and return the buffer holding the result.
    pub fn render(&mut self, encoder: &mut wgpu::CommandEncoder) -> RenderResult<&RenderTarget> {
        self.pingpong.reset();
        for _ in 0..self.iterations {
            let step = self.pingpong.step();
            let source = match step.read {
                BlurSource::Bright => &self.sources[0],
                BlurSource::Buffer(i) => &self.sources[1 + i],
            };
            let mut pass = self.framebuffers[step.write].bind(encoder, Load::Clear)?;
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, source, &[]);
            pass.set_bind_group(1, &self.direction_groups[step.horizontal as usize], &[]);
            draw_quad(&mut pass);
            Framebuffer::unbind(pass);
        }
        Ok(&self.buffers[self.pingpong.last_written().unwrap_or(0)])
    }

    /// Buffer holding the blur once [`BloomPass::render`] has run. Fixed by
    /// the iteration count, so the composite can bind it up front.
    pub fn result(&self) -> &RenderTarget {
        &self.buffers[(self.iterations % 2) as usize]
    }
}

// ── Composite ─────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CompositeParams {
    pub exposure: f32,
    pub gamma: f32,
    pub bloom: u32,
    pub _pad: u32,
}

impl ProgramParams for CompositeParams {
    const LABEL: &'static str = "composite";
}

const COMPOSITE_FS: &str = "
struct CompositeParams {
    exposure: f32,
    gamma: f32,
    bloom: u32,
};

@group(0) @binding(0) var<uniform> params: CompositeParams;
@group(0) @binding(1) var scene: texture_2d<f32>;
@group(0) @binding(2) var bloom_blur: texture_2d<f32>;
@group(0) @binding(3) var linear_sampler: sampler;

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    var hdr = textureSampleLevel(scene, linear_sampler, in.uv, 0.0).rgb;
    if (params.bloom != 0u) {
        hdr = hdr + textureSampleLevel(bloom_blur, linear_sampler, in.uv, 0.0).rgb;
    }
    let mapped = vec3<f32>(1.0) - exp(-hdr * params.exposure);
    return vec4<f32>(pow(mapped, vec3<f32>(1.0 / params.gamma)), 1.0);
}
";

pub(crate) fn composite_source() -> String {
    format!("{FULLSCREEN_VS}{COMPOSITE_FS}")
}

/// Tonemaps the lit scene (plus bloom when enabled) onto the display.
pub struct CompositePass {
    pipeline: wgpu::RenderPipeline,
    params: UniformBlock<CompositeParams>,
    layout: wgpu::BindGroupLayout,
    group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    bloom: bool,
}

impl CompositePass {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        config: &LightingConfig,
        scene: &RenderTarget,
        bloom: Option<&RenderTarget>,
    ) -> RenderResult<Self> {
        let entry = uniform_entry::<CompositeParams>(0, wgpu::ShaderStages::FRAGMENT);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite_layout"),
            entries: &[
                entry,
                texture_entry(1, wgpu::TextureViewDimension::D2, true),
                texture_entry(2, wgpu::TextureViewDimension::D2, true),
                sampler_entry(3, wgpu::SamplerBindingType::Filtering),
            ],
        });
        let params = UniformBlock::new(
            device,
            &CompositeParams { exposure: config.exposure, gamma: config.gamma, bloom: bloom.is_some() as u32, _pad: 0 },
        );
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("composite_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let group = Self::group(device, &layout, &params, &sampler, scene, bloom)?;
        let pipeline = create_fullscreen_pipeline(
            device,
            "composite",
            &composite_source(),
            &[&layout],
            &opaque_target(surface_format),
        )?;
        Ok(Self { pipeline, params, layout, group, sampler, bloom: bloom.is_some() })
    }

    fn group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        params: &UniformBlock<CompositeParams>,
        sampler: &wgpu::Sampler,
        scene: &RenderTarget,
        bloom: Option<&RenderTarget>,
    ) -> RenderResult<wgpu::BindGroup> {
        let entry = uniform_entry::<CompositeParams>(0, wgpu::ShaderStages::FRAGMENT);
        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_bg"),
            layout,
            entries: &[
                params.entry(&entry)?,
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(scene.view()) },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(bloom.unwrap_or(scene).view()),
                },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(sampler) },
            ],
        }))
    }

    /// Rebind after the scene or bloom targets were recreated.
    pub fn rebind(&mut self, device: &wgpu::Device, scene: &RenderTarget, bloom: Option<&RenderTarget>) -> RenderResult<()> {
        self.group = Self::group(device, &self.layout, &self.params, &self.sampler, scene, bloom)?;
        Ok(())
    }

    pub fn set_exposure(&self, queue: &wgpu::Queue, exposure: f32, gamma: f32) {
        self.params.write(queue, &CompositeParams { exposure, gamma, bloom: self.bloom as u32, _pad: 0 });
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, display: &wgpu::TextureView, size: (u32, u32)) {
        let mut pass = bind_display(encoder, display, size);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.group, &[]);
        draw_quad(&mut pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_blocks_are_uniform_aligned() {
        assert_eq!(BlurParams::size(), 16);
        assert_eq!(CompositeParams::size(), 16);
    }
}
