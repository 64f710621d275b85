//! Pipeline configuration table.
//!
//! One [`PipelineConfig`] describes which stages run, in what formats and at
//! what sizes. The demos differ only in the preset they start from. Configs
//! can also be loaded from JSON; missing fields take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment::EnvironmentStages;
use crate::error::{RenderError, RenderResult};
use crate::renderer::target::{PixelFormat, full_mip_count, mip_extent};
use crate::window::WindowConfig;

// ── Stage toggles ─────────────────────────────────────────────────────────────

/// Which optional stages are enabled. The geometry pass and the lighting pass
/// always run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    pub environment: bool,
    pub ssao: bool,
    /// Accumulate point lights through sphere volumes instead of the
    /// full-screen light loop.
    pub light_volumes: bool,
    /// Forward-render small emissive spheres at each point light.
    pub light_markers: bool,
    pub skybox: bool,
    pub point_shadows: bool,
    /// Orthographic depth map for the first directional light.
    pub directional_shadow: bool,
    pub bloom: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            environment: false,
            ssao: false,
            light_volumes: false,
            light_markers: false,
            skybox: false,
            point_shadows: false,
            directional_shadow: false,
            bloom: false,
        }
    }
}

// ── Formats ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetFormats {
    pub position: PixelFormat,
    pub normal: PixelFormat,
    pub albedo_spec: PixelFormat,
    pub depth: PixelFormat,
    pub scene: PixelFormat,
    pub bright: PixelFormat,
    pub ssao: PixelFormat,
    pub environment: PixelFormat,
    pub brdf_lut: PixelFormat,
    pub shadow: PixelFormat,
}

impl Default for TargetFormats {
    fn default() -> Self {
        Self {
            position: PixelFormat::Rgba16Float,
            normal: PixelFormat::Rgba16Float,
            albedo_spec: PixelFormat::Rgba8Unorm,
            depth: PixelFormat::Depth24PlusStencil8,
            scene: PixelFormat::Rgba16Float,
            bright: PixelFormat::Rgba16Float,
            ssao: PixelFormat::R8Unorm,
            environment: PixelFormat::Rgba16Float,
            brdf_lut: PixelFormat::Rg16Float,
            shadow: PixelFormat::Depth32Float,
        }
    }
}

// ── Environment ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Equirectangular `.hdr` source. Required when the environment stage is on.
    pub hdr_path: Option<PathBuf>,
    pub stages: EnvironmentStages,
    pub cube_size: u32,
    pub irradiance_size: u32,
    /// Polar/azimuth step of the irradiance integral, in radians.
    pub irradiance_step: f32,
    pub prefilter_size: u32,
    pub prefilter_levels: u32,
    /// Smallest prefilter face size allowed.
    pub prefilter_floor: u32,
    pub prefilter_samples: u32,
    pub brdf_size: u32,
    pub brdf_samples: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            hdr_path: None,
            stages: EnvironmentStages::default(),
            cube_size: 512,
            irradiance_size: 32,
            irradiance_step: 0.025,
            prefilter_size: 128,
            prefilter_levels: 5,
            prefilter_floor: 8,
            prefilter_samples: 1024,
            brdf_size: 512,
            brdf_samples: 1024,
        }
    }
}

// ── SSAO ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoConfig {
    pub kernel_size: u32,
    /// Side of the square rotation-noise tile.
    pub noise_size: u32,
    /// View-space sampling radius.
    pub radius: f32,
    /// Depth bias against self-occlusion.
    pub bias: f32,
    /// Exponent applied to the visibility term.
    pub power: f32,
    /// Seed for kernel and noise generation.
    pub seed: u64,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            kernel_size: 64,
            noise_size: 4,
            radius: 0.5,
            bias: 0.025,
            power: 1.0,
            seed: 0x55A0,
        }
    }
}

// ── Bloom ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    /// Separable blur iterations (each one direction).
    pub iterations: u32,
    /// Luminance above which the lighting pass writes the bright target.
    pub threshold: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self { iterations: 10, threshold: 1.0 }
    }
}

// ── Lighting / tonemap / shadow ───────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Constant ambient factor applied to albedo when no environment is bound.
    pub ambient: f32,
    pub exposure: f32,
    pub gamma: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self { ambient: 0.1, exposure: 1.0, gamma: 2.2 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Face size of the point shadow cube.
    pub size: u32,
    pub near: f32,
    pub far: f32,
    pub bias: f32,
    pub directional_size: u32,
    /// Half-width of the orthographic light frustum.
    pub directional_extent: f32,
    pub directional_near: f32,
    pub directional_far: f32,
    /// How far back along its direction the directional light is placed.
    pub directional_distance: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            size: 1024,
            near: 1.0,
            far: 25.0,
            bias: 0.05,
            directional_size: 2048,
            directional_extent: 10.0,
            directional_near: 1.0,
            directional_far: 27.5,
            directional_distance: 10.0,
        }
    }
}

// ── PipelineConfig ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub window: WindowConfig,
    pub stages: StageToggles,
    pub formats: TargetFormats,
    pub environment: EnvironmentConfig,
    pub ssao: SsaoConfig,
    pub bloom: BloomConfig,
    pub lighting: LightingConfig,
    pub shadow: ShadowConfig,
}

impl PipelineConfig {
    /// Plain deferred shading with light volumes and markers.
    pub fn deferred() -> Self {
        let mut cfg = Self::default();
        cfg.window.title = "deferred shading".into();
        cfg.stages.light_volumes = true;
        cfg.stages.light_markers = true;
        cfg
    }

    /// Deferred shading with screen-space ambient occlusion.
    pub fn ssao() -> Self {
        let mut cfg = Self::default();
        cfg.window.title = "ssao".into();
        cfg.stages.ssao = true;
        cfg.lighting.ambient = 0.3;
        cfg
    }

    /// HDR bloom over a few bright point lights.
    pub fn bloom() -> Self {
        let mut cfg = Self::default();
        cfg.window.title = "bloom".into();
        cfg.stages.bloom = true;
        cfg.stages.light_markers = true;
        cfg.lighting.ambient = 0.05;
        cfg
    }

    /// Image-based PBR lighting from an equirectangular HDR.
    pub fn ibl(hdr_path: impl Into<PathBuf>) -> Self {
        let mut cfg = Self::default();
        cfg.window.title = "image based lighting".into();
        cfg.stages.environment = true;
        cfg.stages.skybox = true;
        cfg.environment.hdr_path = Some(hdr_path.into());
        cfg
    }

    /// Omnidirectional shadows from a single point light.
    pub fn point_shadows() -> Self {
        let mut cfg = Self::default();
        cfg.window.title = "point shadows".into();
        cfg.stages.point_shadows = true;
        cfg.stages.light_markers = true;
        cfg.lighting.ambient = 0.3;
        cfg
    }

    /// Sun-style shadows from one directional light over a lit floor.
    pub fn directional_shadow() -> Self {
        let mut cfg = Self::default();
        cfg.window.title = "directional shadow".into();
        cfg.stages.directional_shadow = true;
        cfg.lighting.ambient = 0.3;
        cfg
    }

    /// Every stage at once.
    pub fn full(hdr_path: impl Into<PathBuf>) -> Self {
        let mut cfg = Self::ibl(hdr_path);
        cfg.window.title = "lightpass".into();
        cfg.stages.ssao = true;
        cfg.stages.bloom = true;
        cfg.stages.point_shadows = true;
        cfg.stages.light_markers = true;
        cfg
    }

    pub fn from_json(text: &str) -> RenderResult<Self> {
        let cfg: Self = serde_json::from_str(text).map_err(RenderError::config)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load the JSON file named by the first process argument, or fall back
    /// to `preset` when there is none.
    pub fn from_args_or(preset: Self) -> RenderResult<Self> {
        match std::env::args_os().nth(1) {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                preset.validate()?;
                Ok(preset)
            }
        }
    }

    pub fn to_json(&self) -> RenderResult<String> {
        serde_json::to_string_pretty(self).map_err(RenderError::config)
    }

    /// Reject sizes and counts the stages cannot honour.
    pub fn validate(&self) -> RenderResult<()> {
        self.formats.validate()?;
        let env = &self.environment;
        if self.stages.environment {
            if env.hdr_path.is_none() {
                return Err(RenderError::config("environment stage enabled without hdr_path"));
            }
            for (name, v) in [
                ("cube_size", env.cube_size),
                ("irradiance_size", env.irradiance_size),
                ("prefilter_size", env.prefilter_size),
                ("brdf_size", env.brdf_size),
                ("prefilter_samples", env.prefilter_samples),
                ("brdf_samples", env.brdf_samples),
            ] {
                if v == 0 {
                    return Err(RenderError::config(format!("environment.{name} must be > 0")));
                }
            }
            if env.prefilter_levels == 0 || env.prefilter_levels > full_mip_count(env.prefilter_size) {
                return Err(RenderError::config(format!(
                    "environment.prefilter_levels {} out of range for size {}",
                    env.prefilter_levels, env.prefilter_size
                )));
            }
            let smallest = mip_extent(env.prefilter_size, env.prefilter_levels - 1);
            if smallest < env.prefilter_floor {
                return Err(RenderError::config(format!(
                    "environment.prefilter_levels {} shrinks faces to {}, below the floor of {}",
                    env.prefilter_levels, smallest, env.prefilter_floor
                )));
            }
            if !(env.irradiance_step > 0.0) {
                return Err(RenderError::config("environment.irradiance_step must be > 0"));
            }
        }
        if self.stages.skybox && !self.stages.environment {
            return Err(RenderError::config("skybox requires the environment stage"));
        }
        if self.stages.ssao && (self.ssao.kernel_size == 0 || self.ssao.kernel_size > 64 || self.ssao.noise_size == 0) {
            return Err(RenderError::config("ssao.kernel_size must be in 1..=64 and noise_size > 0"));
        }
        if self.stages.bloom && self.bloom.iterations == 0 {
            return Err(RenderError::config("bloom.iterations must be > 0"));
        }
        if self.stages.point_shadows && (self.shadow.size == 0 || self.shadow.far <= self.shadow.near) {
            return Err(RenderError::config("shadow.size must be > 0 and far > near"));
        }
        let sh = &self.shadow;
        if self.stages.directional_shadow
            && (sh.directional_size == 0
                || sh.directional_far <= sh.directional_near
                || !(sh.directional_extent > 0.0)
                || sh.directional_distance >= sh.directional_far)
        {
            return Err(RenderError::config(
                "shadow.directional_size must be > 0, far > near, extent > 0 and distance < far",
            ));
        }
        Ok(())
    }

    /// Reject target sizes beyond the device's largest 2-D texture. Cube faces
    /// share that limit.
    pub fn check_limits(&self, max_dimension_2d: u32) -> RenderResult<()> {
        let env = &self.environment;
        let mut sizes = Vec::new();
        if self.stages.environment {
            sizes.extend([
                ("environment.cube_size", env.cube_size),
                ("environment.irradiance_size", env.irradiance_size),
                ("environment.prefilter_size", env.prefilter_size),
                ("environment.brdf_size", env.brdf_size),
            ]);
        }
        if self.stages.point_shadows {
            sizes.push(("shadow.size", self.shadow.size));
        }
        if self.stages.directional_shadow {
            sizes.push(("shadow.directional_size", self.shadow.directional_size));
        }
        match sizes.into_iter().find(|&(_, size)| size > max_dimension_2d) {
            Some((name, size)) => Err(RenderError::config(format!(
                "{name} {size} exceeds the device limit of {max_dimension_2d}"
            ))),
            None => Ok(()),
        }
    }
}

impl TargetFormats {
    /// Sampled-through-a-linear-filter slots need filterable color formats;
    /// depth slots need depth formats.
    pub fn validate(&self) -> RenderResult<()> {
        for (name, format) in [
            ("environment", self.environment),
            ("scene", self.scene),
            ("bright", self.bright),
            ("brdf_lut", self.brdf_lut),
            ("ssao", self.ssao),
        ] {
            if format.is_depth() || !format.is_filterable() {
                return Err(RenderError::config(format!("formats.{name} {format:?} is not a filterable color format")));
            }
        }
        for (name, format) in [
            ("position", self.position),
            ("normal", self.normal),
            ("albedo_spec", self.albedo_spec),
        ] {
            if format.is_depth() {
                return Err(RenderError::config(format!("formats.{name} {format:?} is not a color format")));
            }
        }
        for (name, format) in [("depth", self.depth), ("shadow", self.shadow)] {
            if !format.is_depth() {
                return Err(RenderError::config(format!("formats.{name} {format:?} is not a depth format")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_sizes() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.environment.cube_size, 512);
        assert_eq!(cfg.environment.irradiance_size, 32);
        assert_eq!(cfg.environment.prefilter_size, 128);
        assert_eq!(cfg.environment.prefilter_levels, 5);
        assert_eq!(cfg.environment.brdf_size, 512);
        assert_eq!(cfg.ssao.kernel_size, 64);
        assert_eq!(cfg.bloom.iterations, 10);
        assert_eq!(cfg.formats.brdf_lut, PixelFormat::Rg16Float);
    }

    #[test]
    fn empty_json_is_default() {
        let cfg = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn partial_json_overrides_fields() {
        let cfg = PipelineConfig::from_json(
            r#"{ "stages": { "bloom": true }, "bloom": { "iterations": 4 }, "window": { "width": 640 } }"#,
        )
        .unwrap();
        assert!(cfg.stages.bloom);
        assert_eq!(cfg.bloom.iterations, 4);
        assert_eq!(cfg.bloom.threshold, 1.0);
        assert_eq!(cfg.window.width, 640);
        assert_eq!(cfg.window.height, 720);
    }

    #[test]
    fn environment_without_hdr_is_rejected() {
        let err = PipelineConfig::from_json(r#"{ "stages": { "environment": true } }"#).unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
    }

    #[test]
    fn too_many_prefilter_levels_rejected() {
        let mut cfg = PipelineConfig::ibl("env.hdr");
        cfg.environment.prefilter_size = 16;
        cfg.environment.prefilter_floor = 1;
        cfg.environment.prefilter_levels = 6;
        assert!(cfg.validate().is_err());
        cfg.environment.prefilter_levels = 5;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn prefilter_levels_below_floor_rejected() {
        let mut cfg = PipelineConfig::ibl("env.hdr");
        cfg.environment.prefilter_levels = 6;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("below the floor"), "{err}");
    }

    #[test]
    fn presets_validate() {
        for cfg in [
            PipelineConfig::deferred(),
            PipelineConfig::ssao(),
            PipelineConfig::bloom(),
            PipelineConfig::ibl("a.hdr"),
            PipelineConfig::point_shadows(),
            PipelineConfig::directional_shadow(),
            PipelineConfig::full("a.hdr"),
        ] {
            assert!(cfg.validate().is_ok(), "{}", cfg.window.title);
        }
    }

    #[test]
    fn directional_light_behind_far_plane_rejected() {
        let mut cfg = PipelineConfig::directional_shadow();
        assert_eq!(cfg.shadow.directional_size, 2048);
        cfg.shadow.directional_distance = 30.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unfilterable_sampled_formats_rejected() {
        let err = PipelineConfig::from_json(
            r#"{ "stages": { "environment": true }, "environment": { "hdr_path": "x.hdr" },
                 "formats": { "environment": "Rgba32Float", "scene": "Rgba32Float" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
        assert!(err.to_string().contains("formats.environment"), "{err}");

        let mut cfg = PipelineConfig::bloom();
        cfg.formats.bright = PixelFormat::Depth32Float;
        assert!(cfg.validate().is_err());
        cfg.formats.bright = PixelFormat::Rgba16Float;
        cfg.formats.brdf_lut = PixelFormat::Rgba32Float;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn depth_slots_need_depth_formats() {
        let mut cfg = PipelineConfig::point_shadows();
        cfg.formats.shadow = PixelFormat::R16Float;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("formats.shadow"), "{err}");
        cfg.formats.shadow = PixelFormat::Depth32Float;
        cfg.formats.depth = PixelFormat::Rgba8Unorm;
        assert!(cfg.validate().is_err());
        cfg.formats.depth = PixelFormat::Depth32Float;
        assert!(cfg.validate().is_ok());
        cfg.formats.position = PixelFormat::Depth24PlusStencil8;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sizes_beyond_device_limit_rejected() {
        let mut cfg = PipelineConfig::full("sky.hdr");
        assert!(cfg.check_limits(2048).is_ok());
        cfg.environment.cube_size = 4096;
        let err = cfg.check_limits(2048).unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
        assert!(err.to_string().contains("environment.cube_size"), "{err}");

        let mut cfg = PipelineConfig::directional_shadow();
        cfg.shadow.directional_size = 8192;
        assert!(cfg.check_limits(8192).is_ok());
        assert!(cfg.check_limits(4096).is_err());
        cfg.stages.directional_shadow = false;
        assert!(cfg.check_limits(4096).is_ok());
    }

    #[test]
    fn json_round_trip_keeps_stage_table() {
        let cfg = PipelineConfig::full("sky.hdr");
        let back = PipelineConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}
