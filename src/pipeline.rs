//! The configurable stage table and the frame pipeline built from it.
//!
//! [`plan`] turns a [`PipelineConfig`] into an ordered list of stage
//! declarations naming the targets each stage reads and writes.
//! [`check_plan`] rejects plans where a stage samples a target it is drawing
//! into, or reads something no earlier stage produced. [`PipelineBuilder`]
//! validates the plan and then creates the stages in plan order.

use std::time::Instant;

use crate::assets::{self, Texture};
use crate::bloom::{BloomPass, CompositePass};
use crate::bloom::pingpong::{BlurSource, schedule};
use crate::camera::CameraBinding;
use crate::config::PipelineConfig;
use crate::deferred::gbuffer::GeometryPass;
use crate::deferred::light::Light;
use crate::deferred::light_volume::{LightMarkers, LightVolumes};
use crate::deferred::lighting::{LightingFrame, LightingPass, LightingSources, first_light, flags};
use crate::environment::skybox::Skybox;
use crate::environment::{self, EnvironmentMaps};
use crate::error::{RenderError, RenderResult};
use crate::geometry::MeshLibrary;
use crate::renderer::framebuffer::{Framebuffer, Load};
use crate::scene::{Scene, TextureSource};
use crate::shadow::{DirectionalShadow, PointShadow};
use crate::ssao::SsaoPass;

// ── Stage table ───────────────────────────────────────────────────────────────

/// Every render target a stage can name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetId {
    Environment,
    Irradiance,
    Prefilter,
    BrdfLut,
    GPosition,
    GNormal,
    GAlbedoSpec,
    GDepth,
    PointShadow,
    DirectionalShadow,
    SsaoRaw,
    Ssao,
    Scene,
    Bright,
    PingPong(u8),
    Display,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Subresource {
    All,
    Level(u32),
}

/// One target (or one mip of it) touched by a stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Access {
    pub target: TargetId,
    pub sub: Subresource,
}

impl Access {
    pub fn all(target: TargetId) -> Self {
        Self { target, sub: Subresource::All }
    }

    pub fn level(target: TargetId, level: u32) -> Self {
        Self { target, sub: Subresource::Level(level) }
    }

    pub fn overlaps(&self, other: &Access) -> bool {
        self.target == other.target
            && match (self.sub, other.sub) {
                (Subresource::Level(a), Subresource::Level(b)) => a == b,
                _ => true,
            }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StageKind {
    Projection,
    Irradiance,
    Prefilter,
    BrdfLut,
    Geometry,
    PointShadow,
    DirectionalShadow,
    SsaoOcclusion,
    SsaoBlur,
    Lighting,
    LightVolumes,
    LightMarkers,
    Skybox,
    BloomBlur(u32),
    Composite,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StageDecl {
    pub kind: StageKind,
    pub reads: Vec<Access>,
    pub writes: Vec<Access>,
}

impl StageDecl {
    fn new(kind: StageKind, reads: &[TargetId], writes: &[TargetId]) -> Self {
        Self {
            kind,
            reads: reads.iter().copied().map(Access::all).collect(),
            writes: writes.iter().copied().map(Access::all).collect(),
        }
    }
}

/// Ordered stage declarations for `config`.
pub fn plan(config: &PipelineConfig) -> Vec<StageDecl> {
    use TargetId::*;

    let stages = &config.stages;
    let env = &config.environment.stages;
    let mut out = Vec::new();

    if stages.environment {
        if env.projection {
            out.push(StageDecl::new(StageKind::Projection, &[], &[Environment]));
        }
        if env.irradiance {
            out.push(StageDecl::new(StageKind::Irradiance, &[Environment], &[Irradiance]));
        }
        if env.prefilter {
            out.push(StageDecl::new(StageKind::Prefilter, &[Environment], &[Prefilter]));
        }
        if env.brdf {
            out.push(StageDecl::new(StageKind::BrdfLut, &[], &[BrdfLut]));
        }
    }

    out.push(StageDecl::new(StageKind::Geometry, &[], &[GPosition, GNormal, GAlbedoSpec, GDepth]));
    if stages.point_shadows {
        out.push(StageDecl::new(StageKind::PointShadow, &[], &[PointShadow]));
    }
    if stages.directional_shadow {
        out.push(StageDecl::new(StageKind::DirectionalShadow, &[], &[DirectionalShadow]));
    }
    if stages.ssao {
        out.push(StageDecl::new(StageKind::SsaoOcclusion, &[GPosition, GNormal], &[SsaoRaw]));
        out.push(StageDecl::new(StageKind::SsaoBlur, &[SsaoRaw], &[Ssao]));
    }

    let mut lighting_reads = vec![GPosition, GNormal, GAlbedoSpec];
    if stages.ssao {
        lighting_reads.push(Ssao);
    }
    if stages.environment && env.complete() {
        lighting_reads.extend([Irradiance, Prefilter, BrdfLut]);
    }
    if stages.point_shadows {
        lighting_reads.push(PointShadow);
    }
    if stages.directional_shadow {
        lighting_reads.push(DirectionalShadow);
    }
    out.push(StageDecl::new(StageKind::Lighting, &lighting_reads, &[Scene, Bright]));

    if stages.light_volumes {
        out.push(StageDecl::new(StageKind::LightVolumes, &[GPosition, GNormal, GAlbedoSpec], &[Scene]));
    }
    if stages.light_markers {
        out.push(StageDecl::new(StageKind::LightMarkers, &[], &[Scene, Bright, GDepth]));
    }
    if stages.skybox {
        out.push(StageDecl::new(StageKind::Skybox, &[Environment], &[Scene, Bright, GDepth]));
    }

    let mut composite_reads = vec![Scene];
    if stages.bloom {
        for (i, step) in schedule(config.bloom.iterations).into_iter().enumerate() {
            let read = match step.read {
                BlurSource::Bright => Bright,
                BlurSource::Buffer(b) => PingPong(b as u8),
            };
            out.push(StageDecl::new(StageKind::BloomBlur(i as u32), &[read], &[PingPong(step.write as u8)]));
        }
        if config.bloom.iterations > 0 {
            composite_reads.push(PingPong((config.bloom.iterations % 2) as u8));
        }
    }
    out.push(StageDecl::new(StageKind::Composite, &composite_reads, &[Display]));
    out
}

/// Reject aliasing (a stage reading what it writes) and reads of targets no
/// earlier stage wrote.
pub fn check_plan(stages: &[StageDecl]) -> RenderResult<()> {
    let mut written: Vec<Access> = Vec::new();
    for stage in stages {
        for read in &stage.reads {
            if let Some(write) = stage.writes.iter().find(|w| w.overlaps(read)) {
                return Err(RenderError::order(format!(
                    "{:?} reads {:?} while writing {:?}",
                    stage.kind, read, write
                )));
            }
            if !written.iter().any(|w| w.overlaps(read)) {
                return Err(RenderError::order(format!(
                    "{:?} reads {:?} before any stage writes it",
                    stage.kind, read.target
                )));
            }
        }
        written.extend(stage.writes.iter().copied());
    }
    Ok(())
}

// ── Builder ───────────────────────────────────────────────────────────────────

pub struct PipelineBuilder {
    config: PipelineConfig,
    textures: Vec<TextureSource>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, textures: Vec::new() }
    }

    /// Material textures, indexed by [`crate::scene::Material::texture`].
    pub fn with_textures(mut self, textures: Vec<TextureSource>) -> Self {
        self.textures = textures;
        self
    }

    /// Validate the config and stage plan, then create every enabled stage.
    pub fn build(
        self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        size: (u32, u32),
    ) -> RenderResult<Pipeline> {
        let started = Instant::now();
        let config = self.config;
        config.validate()?;
        config.environment.stages.check_order()?;
        config.check_limits(device.limits().max_texture_dimension_2d)?;
        let stages = plan(&config);
        check_plan(&stages)?;
        let toggles = &config.stages;
        let formats = &config.formats;
        let size = (size.0.max(1), size.1.max(1));

        let camera = CameraBinding::new(device)?;
        let meshes = MeshLibrary::new(device);

        let environment = match (&config.environment.hdr_path, toggles.environment) {
            (Some(path), true) => {
                let hdr = assets::load_hdr(path)?;
                environment::precompute(device, queue, &config.environment, formats, hdr)?
            }
            _ => EnvironmentMaps::default(),
        };

        let textures: Vec<Texture> = self
            .textures
            .iter()
            .map(|source| assets::load_texture(device, queue, &source.path, source.srgb))
            .collect();
        let geometry = GeometryPass::new(device, queue, camera.layout(), formats, size, textures)?;

        let point_shadow =
            if toggles.point_shadows { Some(PointShadow::new(device, formats, &config.shadow)?) } else { None };
        let directional_shadow = if toggles.directional_shadow {
            Some(DirectionalShadow::new(device, formats, &config.shadow)?)
        } else {
            None
        };
        let ssao = if toggles.ssao {
            Some(SsaoPass::new(device, queue, camera.layout(), formats, &config.ssao, &geometry.targets)?)
        } else {
            None
        };

        let lighting = LightingPass::new(
            device,
            camera.layout(),
            formats,
            &config.lighting,
            config.bloom.threshold,
            &geometry.targets,
            ssao.as_ref().map(|s| s.output()),
            LightingSources {
                environment: toggles.environment.then_some(&environment),
                point_shadow: point_shadow.as_ref().map(|s| &s.cube),
                directional_shadow: directional_shadow.as_ref().map(|s| &s.map),
            },
        )?;

        let volumes = if toggles.light_volumes {
            Some(LightVolumes::new(device, camera.layout(), &geometry.targets, &lighting.hdr.scene)?)
        } else {
            None
        };

        let color_formats = lighting.hdr.formats();
        let depth_format = formats.depth.to_wgpu();
        let forward = if toggles.light_markers || toggles.skybox {
            Some(forward_framebuffer(&lighting, &geometry)?)
        } else {
            None
        };
        let markers = if toggles.light_markers {
            Some(LightMarkers::new(device, camera.layout(), color_formats, depth_format, config.bloom.threshold)?)
        } else {
            None
        };
        let skybox = match (&environment.cube, toggles.skybox) {
            (Some(cube), true) => Some(Skybox::new(
                device,
                camera.layout(),
                cube,
                color_formats,
                depth_format,
                config.bloom.threshold,
            )?),
            _ => None,
        };

        let bloom = if toggles.bloom { Some(BloomPass::new(device, &config.bloom, &lighting.hdr.bright)?) } else { None };
        let composite = CompositePass::new(
            device,
            surface_format,
            &config.lighting,
            &lighting.hdr.scene,
            bloom.as_ref().map(|b| b.result()),
        )?;

        log::info!(
            "pipeline `{}`: {} stages built in {:.1} ms",
            config.window.title,
            stages.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(Pipeline {
            composite,
            bloom,
            skybox,
            markers,
            forward,
            volumes,
            lighting,
            ssao,
            directional_shadow,
            point_shadow,
            geometry,
            environment,
            meshes,
            camera,
            stages,
            config,
            size,
        })
    }
}

fn forward_framebuffer(lighting: &LightingPass, geometry: &GeometryPass) -> RenderResult<Framebuffer> {
    Framebuffer::with_targets(
        "forward",
        &[&lighting.hdr.scene, &lighting.hdr.bright],
        Some(&geometry.targets.depth),
    )
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// All stages of one configured pipeline.
///
/// Fields are declared in reverse creation order, so stages drop last-built
/// first.
pub struct Pipeline {
    composite: CompositePass,
    bloom: Option<BloomPass>,
    skybox: Option<Skybox>,
    markers: Option<LightMarkers>,
    forward: Option<Framebuffer>,
    volumes: Option<LightVolumes>,
    lighting: LightingPass,
    ssao: Option<SsaoPass>,
    directional_shadow: Option<DirectionalShadow>,
    point_shadow: Option<PointShadow>,
    geometry: GeometryPass,
    environment: EnvironmentMaps,
    meshes: MeshLibrary,
    camera: CameraBinding,
    stages: Vec<StageDecl>,
    config: PipelineConfig,
    size: (u32, u32),
}

impl Pipeline {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stages(&self) -> &[StageDecl] {
        &self.stages
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn environment(&self) -> &EnvironmentMaps {
        &self.environment
    }

    /// Recreate every resolution-matched target and rebind its readers.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 || (width, height) == self.size {
            return Ok(());
        }
        self.geometry.resize(device, width, height)?;
        if let Some(ssao) = &mut self.ssao {
            ssao.resize(device, &self.geometry.targets)?;
        }
        self.lighting.resize(device, &self.geometry.targets, self.ssao.as_ref().map(|s| s.output()))?;
        if let Some(volumes) = &mut self.volumes {
            volumes.resize(device, &self.geometry.targets, &self.lighting.hdr.scene)?;
        }
        if self.forward.is_some() {
            self.forward = Some(forward_framebuffer(&self.lighting, &self.geometry)?);
        }
        if let Some(bloom) = &mut self.bloom {
            bloom.resize(device, &self.lighting.hdr.bright)?;
        }
        self.composite.rebind(device, &self.lighting.hdr.scene, self.bloom.as_ref().map(|b| b.result()))?;
        self.size = (width, height);
        log::debug!("pipeline resized to {}x{}", width, height);
        Ok(())
    }

    /// Feature flags the lighting pass should honour this frame.
    fn frame_flags(&self, point_caster: bool, directional_caster: bool) -> u32 {
        let mut f = 0;
        if self.ssao.is_some() {
            f |= flags::SSAO;
        }
        if self.config.stages.environment && self.environment.ibl().is_some() {
            f |= flags::IBL;
        }
        if self.point_shadow.is_some() && point_caster {
            f |= flags::POINT_SHADOW;
        }
        if self.directional_shadow.is_some() && directional_caster {
            f |= flags::DIRECTIONAL_SHADOW;
        }
        if self.volumes.is_some() {
            f |= flags::SKIP_POINT_LIGHTS;
        }
        f
    }

    /// Record and submit one frame of `scene` ending on `display`.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &dyn Scene,
        display: &wgpu::TextureView,
    ) -> RenderResult<()> {
        let aspect = self.size.0 as f32 / self.size.1 as f32;
        let camera = scene.camera();
        let view = camera.view();
        let lights = scene.lights();
        self.camera.write(queue, &camera.uniform(aspect));
        self.geometry.prepare(device, queue, scene.items());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame") });
        self.geometry.render(&mut encoder, self.camera.group(), &self.meshes)?;

        let point_caster = first_light(lights, true).and_then(|i| match lights[i] {
            Light::Point { position, .. } => Some((i, position)),
            Light::Directional { .. } => None,
        });
        let directional_caster = first_light(lights, false).and_then(|i| match lights[i] {
            Light::Directional { direction, .. } => Some((i, direction)),
            Light::Point { .. } => None,
        });

        let (instances, batches) = self.geometry.instances();
        let mut shadow_far = 0.0;
        if let (Some(shadow), Some((_, position))) = (&mut self.point_shadow, point_caster) {
            shadow.prepare(queue, position);
            shadow.render(&mut encoder, &self.meshes, instances, batches)?;
            shadow_far = shadow.far();
        }
        let mut light_space = glam::Mat4::IDENTITY;
        if let (Some(shadow), Some((_, direction))) = (&mut self.directional_shadow, directional_caster) {
            shadow.prepare(queue, direction);
            shadow.render(&mut encoder, &self.meshes, instances, batches)?;
            light_space = shadow.light_space();
        }

        if let Some(ssao) = &self.ssao {
            ssao.render(&mut encoder, self.camera.group())?;
        }

        let flags = self.frame_flags(point_caster.is_some(), directional_caster.is_some());
        self.lighting.prepare(
            queue,
            &LightingFrame {
                lights,
                view,
                flags,
                light_space,
                shadow_light: point_caster,
                directional_shadow_light: directional_caster.map(|(i, _)| i),
                shadow_far,
                shadow_bias: self.config.shadow.bias,
            },
        );
        self.lighting.render(&mut encoder, self.camera.group())?;

        if let Some(volumes) = &mut self.volumes {
            volumes.prepare(device, queue, lights, view);
            volumes.render(&mut encoder, self.camera.group(), &self.meshes)?;
        }

        if let Some(forward) = &self.forward {
            if let Some(markers) = &mut self.markers {
                markers.prepare(device, queue, lights);
            }
            let mut pass = forward.bind(&mut encoder, Load::Keep)?;
            if let Some(markers) = &self.markers {
                markers.draw(&mut pass, self.camera.group(), &self.meshes);
            }
            if let Some(skybox) = &self.skybox {
                skybox.draw(&mut pass, self.camera.group());
            }
            Framebuffer::unbind(pass);
        }

        if let Some(bloom) = &mut self.bloom {
            bloom.render(&mut encoder)?;
        }
        if let Some(exposure) = scene.exposure().filter(|&e| e != self.config.lighting.exposure) {
            self.config.lighting.exposure = exposure;
            self.composite.set_exposure(queue, exposure, self.config.lighting.gamma);
        }
        self.composite.render(&mut encoder, display, self.size);

        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentStages;

    fn kinds(config: &PipelineConfig) -> Vec<StageKind> {
        plan(config).iter().map(|s| s.kind).collect()
    }

    #[test]
    fn deferred_plan_has_volumes_and_markers() {
        let k = kinds(&PipelineConfig::deferred());
        assert_eq!(
            k,
            [StageKind::Geometry, StageKind::Lighting, StageKind::LightVolumes, StageKind::LightMarkers, StageKind::Composite]
        );
    }

    #[test]
    fn light_volumes_write_only_the_scene() {
        let mut cfg = PipelineConfig::bloom();
        cfg.stages.light_volumes = true;
        let stages = plan(&cfg);
        assert!(check_plan(&stages).is_ok());
        let volumes = stages.iter().find(|s| s.kind == StageKind::LightVolumes).unwrap();
        assert_eq!(volumes.writes, [Access::all(TargetId::Scene)]);
        let bright_writers: Vec<StageKind> = stages
            .iter()
            .filter(|s| s.writes.iter().any(|w| w.target == TargetId::Bright))
            .map(|s| s.kind)
            .collect();
        assert!(!bright_writers.contains(&StageKind::LightVolumes));
        assert!(bright_writers.contains(&StageKind::Lighting));
    }

    #[test]
    fn every_preset_plan_is_valid() {
        for cfg in [
            PipelineConfig::deferred(),
            PipelineConfig::ssao(),
            PipelineConfig::bloom(),
            PipelineConfig::ibl("sky.hdr"),
            PipelineConfig::point_shadows(),
            PipelineConfig::directional_shadow(),
            PipelineConfig::full("sky.hdr"),
        ] {
            check_plan(&plan(&cfg)).unwrap();
        }
    }

    #[test]
    fn bloom_plan_alternates_buffers() {
        let mut cfg = PipelineConfig::bloom();
        cfg.bloom.iterations = 3;
        let blur: Vec<StageDecl> =
            plan(&cfg).into_iter().filter(|s| matches!(s.kind, StageKind::BloomBlur(_))).collect();
        assert_eq!(blur.len(), 3);
        assert_eq!(blur[0].reads, [Access::all(TargetId::Bright)]);
        assert_eq!(blur[0].writes, [Access::all(TargetId::PingPong(1))]);
        assert_eq!(blur[1].reads, [Access::all(TargetId::PingPong(1))]);
        assert_eq!(blur[2].writes, [Access::all(TargetId::PingPong(1))]);
        let composite = plan(&cfg).pop().unwrap();
        assert!(composite.reads.contains(&Access::all(TargetId::PingPong(1))));
    }

    #[test]
    fn stage_reading_its_own_output_is_rejected() {
        let stages = vec![
            StageDecl::new(StageKind::Geometry, &[], &[TargetId::GPosition]),
            StageDecl::new(StageKind::SsaoBlur, &[TargetId::GPosition], &[TargetId::GPosition]),
        ];
        let err = check_plan(&stages).unwrap_err();
        assert!(matches!(err, RenderError::PipelineOrder(_)));
    }

    #[test]
    fn reading_before_writing_is_rejected() {
        let stages = vec![
            StageDecl::new(StageKind::Lighting, &[TargetId::Ssao], &[TargetId::Scene]),
            StageDecl::new(StageKind::SsaoBlur, &[], &[TargetId::Ssao]),
        ];
        assert!(check_plan(&stages).is_err());
    }

    #[test]
    fn distinct_mips_do_not_alias() {
        let mip_pass = StageDecl {
            kind: StageKind::Projection,
            reads: vec![Access::level(TargetId::Environment, 0)],
            writes: vec![Access::level(TargetId::Environment, 1)],
        };
        let seed = StageDecl::new(StageKind::Projection, &[], &[TargetId::Environment]);
        check_plan(&[seed.clone(), mip_pass.clone()]).unwrap();

        let mut same = mip_pass;
        same.writes = vec![Access::level(TargetId::Environment, 0)];
        assert!(check_plan(&[seed, same]).is_err());
    }

    #[test]
    fn environment_gap_is_rejected() {
        let stages = EnvironmentStages { projection: false, irradiance: false, prefilter: true, brdf: true };
        assert!(matches!(stages.check_order(), Err(RenderError::PipelineOrder(_))));
        let stages = EnvironmentStages { projection: true, irradiance: true, prefilter: false, brdf: false };
        stages.check_order().unwrap();
    }

    #[test]
    fn incomplete_environment_keeps_lighting_off_ibl() {
        let mut cfg = PipelineConfig::ibl("sky.hdr");
        cfg.environment.stages.brdf = false;
        let lighting = plan(&cfg).into_iter().find(|s| s.kind == StageKind::Lighting).unwrap();
        assert!(!lighting.reads.iter().any(|r| r.target == TargetId::Irradiance));
        check_plan(&plan(&cfg)).unwrap();
    }

    #[test]
    fn shadows_feed_lighting() {
        let mut cfg = PipelineConfig::point_shadows();
        cfg.stages.directional_shadow = true;
        let stages = plan(&cfg);
        let lighting = stages.iter().find(|s| s.kind == StageKind::Lighting).unwrap();
        assert!(lighting.reads.contains(&Access::all(TargetId::PointShadow)));
        assert!(lighting.reads.contains(&Access::all(TargetId::DirectionalShadow)));
    }
}
