use glam::Vec3;
use lightpass::camera::{CameraUniform, FlyCamera};
use lightpass::config::PipelineConfig;
use lightpass::deferred::light::LightArray;
use lightpass::deferred::lighting::LightingParams;
use lightpass::pipeline::{Access, StageDecl, StageKind, TargetId, check_plan, plan};
use lightpass::renderer::params::{ProgramParams, check_layout, uniform_entry};
use lightpass::shadow::ShadowParams;
use lightpass::ssao::pass::SsaoParams;
use lightpass::RenderError;

// ── Stage plans ───────────────────────────────────────────────────────────

#[test]
fn full_preset_runs_every_stage_in_order() {
    let stages = plan(&PipelineConfig::full("sky.hdr"));
    check_plan(&stages).unwrap();
    let position = |kind: StageKind| stages.iter().position(|s| s.kind == kind).unwrap();
    assert_eq!(position(StageKind::Projection), 0);
    assert!(position(StageKind::BrdfLut) < position(StageKind::Geometry));
    assert!(position(StageKind::Geometry) < position(StageKind::SsaoOcclusion));
    assert!(position(StageKind::SsaoBlur) < position(StageKind::Lighting));
    assert!(position(StageKind::PointShadow) < position(StageKind::Lighting));
    assert!(position(StageKind::Lighting) < position(StageKind::Skybox));
    assert!(position(StageKind::Skybox) < position(StageKind::BloomBlur(0)));
    assert_eq!(stages.last().unwrap().kind, StageKind::Composite);
}

#[test]
fn skybox_without_projection_is_an_order_error() {
    let mut cfg = PipelineConfig::ibl("sky.hdr");
    cfg.environment.stages.projection = false;
    cfg.environment.stages.irradiance = false;
    cfg.environment.stages.prefilter = false;
    cfg.environment.stages.brdf = false;
    let err = check_plan(&plan(&cfg)).unwrap_err();
    assert!(matches!(err, RenderError::PipelineOrder(_)), "{err}");
}

#[test]
fn blur_reading_its_own_buffer_is_rejected() {
    let stages = vec![
        StageDecl { kind: StageKind::Lighting, reads: vec![], writes: vec![Access::all(TargetId::Bright)] },
        StageDecl {
            kind: StageKind::BloomBlur(0),
            reads: vec![Access::all(TargetId::PingPong(0))],
            writes: vec![Access::all(TargetId::PingPong(0))],
        },
    ];
    assert!(check_plan(&stages).is_err());
}

// ── Config ────────────────────────────────────────────────────────────────

#[test]
fn presets_validate() {
    for cfg in [
        PipelineConfig::deferred(),
        PipelineConfig::ssao(),
        PipelineConfig::bloom(),
        PipelineConfig::ibl("sky.hdr"),
        PipelineConfig::point_shadows(),
        PipelineConfig::directional_shadow(),
        PipelineConfig::full("sky.hdr"),
    ] {
        cfg.validate().unwrap();
    }
}

#[test]
fn config_survives_json() {
    let cfg = PipelineConfig::full("assets/sky.hdr");
    let text = cfg.to_json().unwrap();
    assert_eq!(PipelineConfig::from_json(&text).unwrap(), cfg);
}

#[test]
fn malformed_json_is_a_config_error() {
    let err = PipelineConfig::from_json("{ \"bloom\": { \"iterations\": \"many\" } }").unwrap_err();
    assert!(matches!(err, RenderError::Config(_)));
}

#[test]
fn environment_without_source_is_rejected() {
    let mut cfg = PipelineConfig::default();
    cfg.stages.environment = true;
    assert!(cfg.validate().is_err());
}

// ── Parameter blocks ──────────────────────────────────────────────────────

fn assert_block<T: ProgramParams>() {
    assert_eq!(T::size() % 16, 0, "{} is {} bytes", T::LABEL, T::size());
    check_layout::<T>(&uniform_entry::<T>(0, wgpu::ShaderStages::FRAGMENT)).unwrap();
}

#[test]
fn parameter_blocks_are_16_byte_multiples() {
    assert_block::<CameraUniform>();
    assert_block::<LightArray>();
    assert_block::<LightingParams>();
    assert_block::<SsaoParams>();
    assert_block::<ShadowParams>();
}

#[test]
fn mismatched_binding_size_is_a_param_layout_error() {
    let entry = uniform_entry::<ShadowParams>(0, wgpu::ShaderStages::VERTEX);
    let err = check_layout::<LightingParams>(&entry).unwrap_err();
    assert!(matches!(err, RenderError::ParamLayout { .. }));
}

// ── Camera ────────────────────────────────────────────────────────────────

#[test]
fn camera_pitch_and_zoom_are_clamped() {
    let mut cam = FlyCamera::new(Vec3::ZERO);
    cam.look(0.0, -1e6);
    assert_eq!(cam.pitch, FlyCamera::PITCH_LIMIT);
    cam.zoom(100.0);
    assert_eq!(cam.fov, FlyCamera::FOV_RANGE.0);
    cam.zoom(-100.0);
    assert_eq!(cam.fov, FlyCamera::FOV_RANGE.1);
}
