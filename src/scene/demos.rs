//! Built-in demo scenes, one per pipeline preset.

use std::f32::consts::TAU;

use glam::{Mat4, Vec3};

use crate::camera::FlyCamera;
use crate::config::PipelineConfig;
use crate::deferred::light::{Light, MAX_LIGHTS};
use crate::geometry::model_matrix;
use crate::input::{FrameContext, KeyCode};

use super::{DrawItem, Material, MeshKind, Scene, SceneAction};

/// Camera movement and Escape-to-quit, shared by every demo.
fn fly(camera: &mut FlyCamera, ctx: &FrameContext) -> SceneAction {
    if ctx.input.is_key_pressed(KeyCode::Escape) {
        return SceneAction::Quit;
    }
    camera.update(ctx.input, ctx.dt);
    SceneAction::Continue
}

fn floor(y: f32, half_extent: f32, material: Material) -> DrawItem {
    DrawItem::new(
        MeshKind::Quad,
        model_matrix(Vec3::new(0.0, y, 0.0), Vec3::splat(half_extent), -90.0, Vec3::X),
        material,
    )
}

fn cube(position: Vec3, scale: f32, angle: f32, material: Material) -> DrawItem {
    DrawItem::new(
        MeshKind::Cube,
        model_matrix(position, Vec3::splat(scale), angle, Vec3::new(1.0, 0.0, 1.0)),
        material,
    )
}

fn sphere(position: Vec3, scale: f32, material: Material) -> DrawItem {
    DrawItem::new(MeshKind::Sphere, model_matrix(position, Vec3::splat(scale), 0.0, Vec3::Y), material)
}

/// Pick the demo that shows off the stages `config` enables.
pub fn for_config(config: &PipelineConfig) -> Box<dyn Scene> {
    let stages = &config.stages;
    if stages.environment {
        Box::new(SphereGrid::new())
    } else if stages.point_shadows {
        Box::new(ShadowRoom::new())
    } else if stages.directional_shadow {
        Box::new(SunlitFloor::new())
    } else if stages.bloom {
        Box::new(BrightLights::new())
    } else if stages.ssao {
        Box::new(OcclusionRoom::new())
    } else {
        Box::new(LightField::new())
    }
}

// ── Deferred: many orbiting lights ───────────────────────────────────────────

/// A grid of cubes lit by [`MAX_LIGHTS`] coloured point lights orbiting the
/// centre.
pub struct LightField {
    camera: FlyCamera,
    lights: Vec<Light>,
    items: Vec<DrawItem>,
    orbit: f32,
}

impl LightField {
    pub const ORBIT_RADIUS: f32 = 5.0;
    pub const ORBIT_SPEED: f32 = 0.25;

    pub fn new() -> Self {
        let mut items = Vec::new();
        for x in -1..=1 {
            for z in -1..=1 {
                let position = Vec3::new(x as f32 * 3.0, -0.5, z as f32 * 3.0);
                items.push(cube(position, 0.75, (x * 3 + z) as f32 * 20.0, Material::color(Vec3::splat(0.9))));
            }
        }
        items.push(floor(-1.25, 12.0, Material::color(Vec3::splat(0.6)).with_specular(0.2)));
        let mut scene = Self {
            camera: FlyCamera::new(Vec3::new(0.0, 3.0, 11.0)).looking_at(Vec3::ZERO),
            lights: Vec::with_capacity(MAX_LIGHTS),
            items,
            orbit: 0.0,
        };
        scene.place_lights();
        scene
    }

    fn place_lights(&mut self) {
        self.lights.clear();
        for i in 0..MAX_LIGHTS {
            let a = i as f32 / MAX_LIGHTS as f32 * TAU + self.orbit;
            let height = if i % 2 == 0 { 0.5 } else { -0.5 };
            let position = Vec3::new(a.cos() * Self::ORBIT_RADIUS, height, a.sin() * Self::ORBIT_RADIUS);
            let color = Vec3::new((a.sin() + 1.0) / 2.0, (a.cos() + 1.0) / 2.0, 0.5);
            self.lights.push(Light::point(position, color));
        }
    }
}

impl Default for LightField {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for LightField {
    fn update(&mut self, ctx: &FrameContext) -> SceneAction {
        self.orbit = (self.orbit + ctx.dt * Self::ORBIT_SPEED) % TAU;
        self.place_lights();
        fly(&mut self.camera, ctx)
    }

    fn camera(&self) -> &FlyCamera { &self.camera }
    fn lights(&self) -> &[Light] { &self.lights }
    fn items(&self) -> &[DrawItem] { &self.items }
}

// ── SSAO: creases and corners ────────────────────────────────────────────────

pub struct OcclusionRoom {
    camera: FlyCamera,
    lights: Vec<Light>,
    items: Vec<DrawItem>,
}

impl OcclusionRoom {
    pub fn new() -> Self {
        let white = Material::color(Vec3::splat(0.95));
        let items = vec![
            floor(0.0, 10.0, white),
            // back wall
            DrawItem::new(MeshKind::Quad, model_matrix(Vec3::new(0.0, 5.0, -5.0), Vec3::splat(10.0), 0.0, Vec3::Y), white),
            cube(Vec3::new(0.0, 0.5, 0.0), 0.5, 0.0, white),
            cube(Vec3::new(1.2, 0.5, -1.0), 0.5, 30.0, white),
            sphere(Vec3::new(-1.5, 0.75, 0.5), 0.75, white),
        ];
        Self {
            camera: FlyCamera::new(Vec3::new(0.0, 2.0, 5.0)).looking_at(Vec3::new(0.0, 0.5, 0.0)),
            lights: vec![Light::point(Vec3::new(1.0, 1.0, 1.0), Vec3::new(0.2, 0.2, 0.7)).with_attenuation(1.0, 0.09, 0.032)],
            items,
        }
    }
}

impl Default for OcclusionRoom {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for OcclusionRoom {
    fn update(&mut self, ctx: &FrameContext) -> SceneAction {
        fly(&mut self.camera, ctx)
    }

    fn camera(&self) -> &FlyCamera { &self.camera }
    fn lights(&self) -> &[Light] { &self.lights }
    fn items(&self) -> &[DrawItem] { &self.items }
}

// ── Bloom: bright coloured lights ────────────────────────────────────────────

pub struct BrightLights {
    camera: FlyCamera,
    lights: Vec<Light>,
    items: Vec<DrawItem>,
    exposure: f32,
}

impl BrightLights {
    /// Exposure change per second while Q or E is held.
    pub const EXPOSURE_RATE: f32 = 0.5;
    pub const MIN_EXPOSURE: f32 = 0.05;

    pub fn new() -> Self {
        let wood = Material::color(Vec3::new(0.55, 0.4, 0.3));
        let box_color = Material::color(Vec3::splat(0.8));
        let items = vec![
            floor(-1.0, 12.5, wood),
            cube(Vec3::new(0.0, 1.5, 0.0), 0.5, 0.0, box_color),
            cube(Vec3::new(2.0, 0.0, 1.0), 0.5, 0.0, box_color),
            cube(Vec3::new(-1.0, -1.0, 2.0), 1.0, 60.0, box_color),
            cube(Vec3::new(0.0, 2.7, 4.0), 1.25, 23.0, box_color),
            cube(Vec3::new(-2.0, 1.0, -3.0), 1.0, 124.0, box_color),
            cube(Vec3::new(-3.0, 0.0, 0.0), 0.5, 0.0, box_color),
        ];
        let lights = vec![
            Light::point(Vec3::new(0.0, 0.5, 1.5), Vec3::splat(5.0)),
            Light::point(Vec3::new(-4.0, 0.5, -3.0), Vec3::new(10.0, 0.0, 0.0)),
            Light::point(Vec3::new(3.0, 0.5, 1.0), Vec3::new(0.0, 0.0, 15.0)),
            Light::point(Vec3::new(-0.8, 2.4, -1.0), Vec3::new(0.0, 5.0, 0.0)),
        ];
        Self {
            camera: FlyCamera::new(Vec3::new(0.0, 1.0, 8.0)).looking_at(Vec3::ZERO),
            lights: lights.into_iter().map(|l| l.with_attenuation(0.0, 0.0, 1.0)).collect(),
            items,
            exposure: 1.0,
        }
    }
}

impl Default for BrightLights {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for BrightLights {
    fn update(&mut self, ctx: &FrameContext) -> SceneAction {
        if ctx.input.is_key_held(KeyCode::KeyQ) {
            self.exposure = (self.exposure - Self::EXPOSURE_RATE * ctx.dt).max(Self::MIN_EXPOSURE);
        }
        if ctx.input.is_key_held(KeyCode::KeyE) {
            self.exposure += Self::EXPOSURE_RATE * ctx.dt;
        }
        fly(&mut self.camera, ctx)
    }

    fn camera(&self) -> &FlyCamera { &self.camera }
    fn lights(&self) -> &[Light] { &self.lights }
    fn items(&self) -> &[DrawItem] { &self.items }
    fn exposure(&self) -> Option<f32> { Some(self.exposure) }
}

// ── IBL: metallic × roughness grid ───────────────────────────────────────────

/// Spheres with metallic increasing by row and roughness by column.
pub struct SphereGrid {
    camera: FlyCamera,
    lights: Vec<Light>,
    items: Vec<DrawItem>,
}

impl SphereGrid {
    pub const ROWS: usize = 7;
    pub const COLUMNS: usize = 7;
    pub const SPACING: f32 = 2.5;

    pub fn new() -> Self {
        let mut items = Vec::with_capacity(Self::ROWS * Self::COLUMNS);
        for row in 0..Self::ROWS {
            let metallic = row as f32 / Self::ROWS as f32;
            for col in 0..Self::COLUMNS {
                let roughness = col as f32 / Self::COLUMNS as f32;
                let position = Vec3::new(
                    (col as f32 - (Self::COLUMNS / 2) as f32) * Self::SPACING,
                    (row as f32 - (Self::ROWS / 2) as f32) * Self::SPACING,
                    -2.0,
                );
                items.push(sphere(position, 1.0, Material::pbr(Vec3::new(0.5, 0.0, 0.0), metallic, roughness)));
            }
        }
        let lights = [(-10.0, 10.0), (10.0, 10.0), (-10.0, -10.0), (10.0, -10.0)]
            .into_iter()
            .map(|(x, y)| Light::inverse_square(Vec3::new(x, y, 10.0), Vec3::splat(300.0)))
            .collect();
        Self { camera: FlyCamera::new(Vec3::new(0.0, 0.0, 20.0)), lights, items }
    }
}

impl Default for SphereGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for SphereGrid {
    fn update(&mut self, ctx: &FrameContext) -> SceneAction {
        fly(&mut self.camera, ctx)
    }

    fn camera(&self) -> &FlyCamera { &self.camera }
    fn lights(&self) -> &[Light] { &self.lights }
    fn items(&self) -> &[DrawItem] { &self.items }
}

// ── Point shadows: one light inside a room ───────────────────────────────────

pub struct ShadowRoom {
    camera: FlyCamera,
    lights: Vec<Light>,
    items: Vec<DrawItem>,
    elapsed: f32,
}

impl ShadowRoom {
    pub const LIGHT_HOME: Vec3 = Vec3::new(0.0, 1.5, 0.0);

    pub fn new() -> Self {
        let wall = Material::color(Vec3::new(0.7, 0.65, 0.6));
        let crate_color = Material::color(Vec3::new(0.8, 0.6, 0.4));
        let items = vec![
            // Negative scale turns the cube inside out: faces and normals point inward.
            DrawItem::new(MeshKind::Cube, Mat4::from_scale(Vec3::new(-5.0, -5.0, -5.0)), wall),
            cube(Vec3::new(4.0, -3.5, 0.0), 0.5, 0.0, crate_color),
            cube(Vec3::new(2.0, 3.0, 1.0), 0.75, 0.0, crate_color),
            cube(Vec3::new(-3.0, -1.0, 0.0), 0.5, 0.0, crate_color),
            cube(Vec3::new(-1.5, 1.0, 1.5), 0.5, 0.0, crate_color),
            cube(Vec3::new(-1.5, 2.0, -3.0), 0.75, 60.0, crate_color),
        ];
        Self {
            camera: FlyCamera::new(Vec3::new(0.0, 0.0, 3.0)),
            lights: vec![Light::point(Self::LIGHT_HOME, Vec3::splat(1.0)).with_attenuation(1.0, 0.09, 0.032)],
            items,
            elapsed: 0.0,
        }
    }

    fn light_position(elapsed: f32) -> Vec3 {
        Self::LIGHT_HOME + Vec3::new(0.0, 0.0, (elapsed * 0.5).sin() * 3.0)
    }
}

impl Default for ShadowRoom {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for ShadowRoom {
    fn update(&mut self, ctx: &FrameContext) -> SceneAction {
        self.elapsed = ctx.elapsed;
        if let Some(Light::Point { position, .. }) = self.lights.first_mut() {
            *position = Self::light_position(self.elapsed);
        }
        fly(&mut self.camera, ctx)
    }

    fn camera(&self) -> &FlyCamera { &self.camera }
    fn lights(&self) -> &[Light] { &self.lights }
    fn items(&self) -> &[DrawItem] { &self.items }
}

// ── Directional shadow: sun over a floor ─────────────────────────────────────

pub struct SunlitFloor {
    camera: FlyCamera,
    lights: Vec<Light>,
    items: Vec<DrawItem>,
}

impl SunlitFloor {
    pub fn new() -> Self {
        let ground = Material::color(Vec3::new(0.5, 0.55, 0.5));
        let block = Material::color(Vec3::new(0.85, 0.8, 0.75));
        let items = vec![
            floor(-0.5, 25.0, ground),
            cube(Vec3::new(0.0, 1.5, 0.0), 0.5, 0.0, block),
            cube(Vec3::new(2.0, 0.0, 1.0), 0.5, 0.0, block),
            cube(Vec3::new(-1.0, 0.0, 2.0), 0.25, 60.0, block),
        ];
        // Light travels from (-2, 4, -1) towards the origin.
        let sun = Light::directional(-Vec3::new(-2.0, 4.0, -1.0), Vec3::splat(0.8));
        Self {
            camera: FlyCamera::new(Vec3::new(0.0, 3.0, 8.0)).looking_at(Vec3::ZERO),
            lights: vec![sun],
            items,
        }
    }
}

impl Default for SunlitFloor {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for SunlitFloor {
    fn update(&mut self, ctx: &FrameContext) -> SceneAction {
        fly(&mut self.camera, ctx)
    }

    fn camera(&self) -> &FlyCamera { &self.camera }
    fn lights(&self) -> &[Light] { &self.lights }
    fn items(&self) -> &[DrawItem] { &self.items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputState;
    use crate::renderer::utils::Viewport;

    fn frame(input: &InputState, dt: f32, elapsed: f32) -> FrameContext<'_> {
        FrameContext { dt, elapsed, frame: 1, input, viewport: Viewport::full(1280, 720) }
    }

    #[test]
    fn light_field_fills_the_light_budget() {
        let scene = LightField::new();
        assert_eq!(scene.lights().len(), MAX_LIGHTS);
        for light in scene.lights() {
            let Light::Point { position, .. } = *light else { panic!("expected point light") };
            let r = Vec3::new(position.x, 0.0, position.z).length();
            assert!((r - LightField::ORBIT_RADIUS).abs() < 1e-4);
        }
    }

    #[test]
    fn bright_lights_exposure_follows_q_and_e() {
        let mut scene = BrightLights::new();
        assert_eq!(scene.exposure(), Some(1.0));

        let mut input = InputState::new();
        input.key_down(KeyCode::KeyE);
        scene.update(&frame(&input, 1.0, 1.0));
        assert!((scene.exposure().unwrap() - 1.5).abs() < 1e-6);

        let mut input = InputState::new();
        input.key_down(KeyCode::KeyQ);
        for _ in 0..10 {
            scene.update(&frame(&input, 1.0, 1.0));
        }
        assert_eq!(scene.exposure(), Some(BrightLights::MIN_EXPOSURE));
        assert_eq!(LightField::new().exposure(), None);
    }

    #[test]
    fn light_field_orbits_over_time() {
        let mut scene = LightField::new();
        let before = scene.lights()[0];
        let input = InputState::new();
        assert!(matches!(scene.update(&frame(&input, 1.0, 1.0)), SceneAction::Continue));
        assert_ne!(scene.lights()[0], before);
        assert_eq!(scene.lights().len(), MAX_LIGHTS);
    }

    #[test]
    fn escape_quits() {
        let mut scene = OcclusionRoom::new();
        let mut input = InputState::new();
        input.key_down(KeyCode::Escape);
        assert!(matches!(scene.update(&frame(&input, 0.016, 0.016)), SceneAction::Quit));
    }

    #[test]
    fn sphere_grid_spans_metallic_and_roughness() {
        let scene = SphereGrid::new();
        assert_eq!(scene.items().len(), SphereGrid::ROWS * SphereGrid::COLUMNS);
        let metallic: Vec<f32> = scene.items().iter().map(|i| i.material.metallic).collect();
        assert_eq!(metallic[0], 0.0);
        assert!(metallic.iter().all(|m| (0.0..1.0).contains(m)));
        // Zero roughness is clamped so the specular lobe stays finite.
        assert!(scene.items().iter().all(|i| i.material.roughness >= 0.05));
    }

    #[test]
    fn shadow_room_moves_its_light() {
        let mut scene = ShadowRoom::new();
        let input = InputState::new();
        scene.update(&frame(&input, 0.1, 3.0));
        let Light::Point { position, .. } = scene.lights()[0] else { panic!("expected point light") };
        assert_eq!(position, ShadowRoom::light_position(3.0));
        assert_ne!(position, ShadowRoom::LIGHT_HOME);
    }

    #[test]
    fn config_selects_matching_demo() {
        let pick = |cfg: PipelineConfig| {
            let scene = for_config(&cfg);
            (scene.lights().len(), scene.items().len())
        };
        assert_eq!(pick(PipelineConfig::deferred()).0, MAX_LIGHTS);
        assert_eq!(pick(PipelineConfig::ibl("sky.hdr")).1, SphereGrid::ROWS * SphereGrid::COLUMNS);
        assert_eq!(pick(PipelineConfig::bloom()).0, 4);
        let sun = for_config(&PipelineConfig::directional_shadow());
        assert!(!sun.lights()[0].is_point());
    }
}
