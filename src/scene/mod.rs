//! What the pipeline draws: a camera, lights and a flat list of draw items.

pub mod demos;

use std::path::PathBuf;

use glam::{Mat4, Vec3};

use crate::camera::FlyCamera;
use crate::deferred::light::Light;
use crate::input::FrameContext;

pub use crate::geometry::MeshKind;

pub enum SceneAction {
    Continue,
    Quit,
}

/// Surface parameters of one draw item.
///
/// `texture` and `normal_map` index into [`Scene::textures`]. A missing or
/// out-of-range index binds the white (or flat normal) default instead.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Material {
    pub albedo: Vec3,
    pub specular: f32,
    pub metallic: f32,
    pub roughness: f32,
    pub texture: Option<usize>,
    pub normal_map: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            specular: 0.5,
            metallic: 0.0,
            roughness: 0.5,
            texture: None,
            normal_map: None,
        }
    }
}

impl Material {
    pub fn color(albedo: Vec3) -> Self {
        Self { albedo, ..Self::default() }
    }

    pub fn pbr(albedo: Vec3, metallic: f32, roughness: f32) -> Self {
        Self {
            albedo,
            metallic: metallic.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.05, 1.0),
            ..Self::default()
        }
    }

    pub fn with_texture(mut self, index: usize) -> Self {
        self.texture = Some(index);
        self
    }

    pub fn with_normal_map(mut self, index: usize) -> Self {
        self.normal_map = Some(index);
        self
    }

    pub fn with_specular(mut self, specular: f32) -> Self {
        self.specular = specular;
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshKind,
    pub transform: Mat4,
    pub material: Material,
}

impl DrawItem {
    pub fn new(mesh: MeshKind, transform: Mat4, material: Material) -> Self {
        Self { mesh, transform, material }
    }
}

/// A texture file to load once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureSource {
    pub path: PathBuf,
    /// Colour textures are sRGB; normal maps are linear.
    pub srgb: bool,
}

impl TextureSource {
    pub fn color(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), srgb: true }
    }

    pub fn linear(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), srgb: false }
    }
}

pub trait Scene {
    /// Textures referenced by material indices, loaded before the first frame.
    fn textures(&self) -> Vec<TextureSource> {
        Vec::new()
    }

    fn update(&mut self, ctx: &FrameContext) -> SceneAction;

    fn camera(&self) -> &FlyCamera;

    fn lights(&self) -> &[Light];

    fn items(&self) -> &[DrawItem];

    /// Exposure for the final tonemap, or `None` to keep the configured one.
    fn exposure(&self) -> Option<f32> {
        None
    }
}
