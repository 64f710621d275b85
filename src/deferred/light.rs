use glam::{Mat4, Vec3};

use crate::renderer::params::ProgramParams;

/// Upper bound on lights uploaded per frame.
pub const MAX_LIGHTS: usize = 32;

/// Point lights cut off where their attenuated intensity drops below this.
pub const LIGHT_CUTOFF: f32 = 5.0 / 256.0;

/// Application-owned light, uploaded by value every frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Light {
    Point {
        position: Vec3,
        color: Vec3,
        constant: f32,
        linear: f32,
        quadratic: f32,
    },
    Directional {
        /// Direction the light travels (from the light toward the scene).
        direction: Vec3,
        color: Vec3,
    },
}

impl Light {
    /// Point light with a ~7 unit falloff.
    pub fn point(position: Vec3, color: Vec3) -> Self {
        Light::Point { position, color, constant: 1.0, linear: 0.7, quadratic: 1.8 }
    }

    /// Point light without falloff, as used by physically based scenes.
    pub fn inverse_square(position: Vec3, color: Vec3) -> Self {
        Light::Point { position, color, constant: 0.0, linear: 0.0, quadratic: 1.0 }
    }

    pub fn directional(direction: Vec3, color: Vec3) -> Self {
        Light::Directional { direction: direction.normalize_or_zero(), color }
    }

    pub fn with_attenuation(self, constant: f32, linear: f32, quadratic: f32) -> Self {
        match self {
            Light::Point { position, color, .. } => Light::Point { position, color, constant, linear, quadratic },
            other => other,
        }
    }

    pub fn color(&self) -> Vec3 {
        match *self {
            Light::Point { color, .. } | Light::Directional { color, .. } => color,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Light::Point { .. })
    }

    /// Distance past which the point light contributes less than [`LIGHT_CUTOFF`].
    pub fn radius(&self) -> Option<f32> {
        match *self {
            Light::Point { color, constant, linear, quadratic, .. } => {
                Some(attenuation_radius(constant, linear, quadratic, color.max_element()))
            }
            Light::Directional { .. } => None,
        }
    }

    /// Pack for the GPU with positions and directions in view space.
    pub fn to_block(&self, view: Mat4) -> LightBlock {
        match *self {
            Light::Point { position, color, constant, linear, quadratic } => {
                let p = view.transform_point3(position);
                LightBlock {
                    position: [p.x, p.y, p.z, LightBlock::POINT],
                    direction: [0.0; 4],
                    color: color.extend(1.0).to_array(),
                    attenuation: [constant, linear, quadratic, attenuation_radius(constant, linear, quadratic, color.max_element())],
                }
            }
            Light::Directional { direction, color } => {
                let d = view.transform_vector3(direction).normalize_or_zero();
                LightBlock {
                    position: [0.0, 0.0, 0.0, LightBlock::DIRECTIONAL],
                    direction: d.extend(0.0).to_array(),
                    color: color.extend(1.0).to_array(),
                    attenuation: [1.0, 0.0, 0.0, f32::MAX],
                }
            }
        }
    }
}

/// Solve `c + l·d + q·d² = max_component / cutoff` for `d`.
pub fn attenuation_radius(constant: f32, linear: f32, quadratic: f32, max_component: f32) -> f32 {
    let target = constant - max_component / LIGHT_CUTOFF;
    if quadratic.abs() < f32::EPSILON {
        if linear.abs() < f32::EPSILON {
            return f32::MAX;
        }
        return (-target / linear).max(0.0);
    }
    let disc = linear * linear - 4.0 * quadratic * target;
    ((-linear + disc.max(0.0).sqrt()) / (2.0 * quadratic)).max(0.0)
}

// ── GPU layout ────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightBlock {
    /// View-space position; `w` is the light kind.
    pub position: [f32; 4],
    /// View-space travel direction for directional lights.
    pub direction: [f32; 4],
    pub color: [f32; 4],
    /// constant, linear, quadratic, radius.
    pub attenuation: [f32; 4],
}

impl LightBlock {
    pub const POINT: f32 = 0.0;
    pub const DIRECTIONAL: f32 = 1.0;

    pub fn view_position(&self) -> Vec3 {
        Vec3::new(self.position[0], self.position[1], self.position[2])
    }

    pub fn is_directional(&self) -> bool {
        self.position[3] == Self::DIRECTIONAL
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightArray {
    pub lights: [LightBlock; MAX_LIGHTS],
}

impl ProgramParams for LightArray {
    const LABEL: &'static str = "lights";
}

impl LightArray {
    /// Pack up to [`MAX_LIGHTS`] lights; returns the block and the packed count.
    pub fn pack(lights: &[Light], view: Mat4) -> (Self, u32) {
        if lights.len() > MAX_LIGHTS {
            log::warn!("{} lights supplied, only the first {} are shaded", lights.len(), MAX_LIGHTS);
        }
        let mut array = LightArray { lights: [LightBlock::default(); MAX_LIGHTS] };
        let count = lights.len().min(MAX_LIGHTS);
        for (slot, light) in array.lights.iter_mut().zip(lights) {
            *slot = light.to_block(view);
        }
        (array, count as u32)
    }
}

pub const LIGHT_WGSL: &str = "
struct Light {
    position: vec4<f32>,
    direction: vec4<f32>,
    color: vec4<f32>,
    attenuation: vec4<f32>,
};

struct LightArray {
    lights: array<Light, 32>,
};

fn attenuate(light: Light, dist: f32) -> f32 {
    let a = light.attenuation;
    return 1.0 / max(a.x + a.y * dist + a.z * dist * dist, 1e-4);
}

fn blinn_phong(light: Light, p: vec3<f32>, n: vec3<f32>, albedo: vec3<f32>, specular: f32) -> vec3<f32> {
    let view_dir = normalize(-p);
    var to_light: vec3<f32>;
    var falloff = 1.0;
    if (light.position.w == 1.0) {
        to_light = normalize(-light.direction.xyz);
    } else {
        let offset = light.position.xyz - p;
        let dist = length(offset);
        if (dist > light.attenuation.w) {
            return vec3<f32>(0.0);
        }
        to_light = offset / max(dist, 1e-4);
        falloff = attenuate(light, dist);
    }
    let diffuse = max(dot(n, to_light), 0.0) * albedo * light.color.rgb;
    let halfway = normalize(to_light + view_dir);
    let spec = pow(max(dot(n, halfway), 0.0), 16.0) * specular * light.color.rgb;
    return (diffuse + spec) * falloff;
}
";

// ── CPU reference ─────────────────────────────────────────────────────────────

/// One decoded G-Buffer texel.
#[derive(Copy, Clone, Debug)]
pub struct SurfaceSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub albedo: Vec3,
    pub specular: f32,
    /// Ambient occlusion visibility in [0, 1].
    pub ao: f32,
}

fn attenuate(light: &LightBlock, dist: f32) -> f32 {
    let [c, l, q, _] = light.attenuation;
    1.0 / (c + l * dist + q * dist * dist).max(1e-4)
}

/// Mirror of `blinn_phong` above.
pub fn blinn_phong(light: &LightBlock, s: &SurfaceSample) -> Vec3 {
    let view_dir = (-s.position).normalize_or_zero();
    let color = Vec3::new(light.color[0], light.color[1], light.color[2]);
    let (to_light, falloff) = if light.is_directional() {
        (-Vec3::new(light.direction[0], light.direction[1], light.direction[2]).normalize_or_zero(), 1.0)
    } else {
        let offset = light.view_position() - s.position;
        let dist = offset.length();
        if dist > light.attenuation[3] {
            return Vec3::ZERO;
        }
        (offset / dist.max(1e-4), attenuate(light, dist))
    };
    let diffuse = s.normal.dot(to_light).max(0.0) * s.albedo * color;
    let halfway = (to_light + view_dir).normalize_or_zero();
    let spec = s.normal.dot(halfway).max(0.0).powf(16.0) * s.specular * color;
    (diffuse + spec) * falloff
}

/// Lighting-pass output for one texel: ambient term plus every light.
pub fn shade(s: &SurfaceSample, lights: &[LightBlock], ambient: f32) -> Vec3 {
    let mut out = s.albedo * ambient * s.ao;
    for light in lights {
        out += blinn_phong(light, s);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_matches_closed_form() {
        // learnopengl reference: c=1, l=0.7, q=1.8, white light.
        let r = attenuation_radius(1.0, 0.7, 1.8, 1.0);
        let expected = (-0.7 + (0.49f32 - 4.0 * 1.8 * (1.0 - 256.0 / 5.0)).sqrt()) / (2.0 * 1.8);
        assert!((r - expected).abs() < 1e-5);
        assert!((r - 5.14).abs() < 0.05, "{r}");
    }

    #[test]
    fn radius_at_cutoff_has_attenuated_to_threshold() {
        let (c, l, q) = (1.0, 0.09, 0.032);
        let r = attenuation_radius(c, l, q, 1.0);
        let intensity = 1.0 / (c + l * r + q * r * r);
        assert!((intensity - LIGHT_CUTOFF).abs() < 1e-4);
    }

    #[test]
    fn brighter_lights_reach_further() {
        let dim = Light::point(Vec3::ZERO, Vec3::splat(0.5)).radius().unwrap();
        let bright = Light::point(Vec3::ZERO, Vec3::splat(5.0)).radius().unwrap();
        assert!(bright > dim);
        assert_eq!(Light::directional(Vec3::NEG_Y, Vec3::ONE).radius(), None);
    }

    #[test]
    fn packing_moves_positions_to_view_space() {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let (array, count) = LightArray::pack(&[Light::point(Vec3::new(1.0, 2.0, 3.0), Vec3::ONE)], view);
        assert_eq!(count, 1);
        assert_eq!(array.lights[0].view_position(), Vec3::new(1.0, 2.0, -2.0));
        assert!(!array.lights[0].is_directional());
    }

    #[test]
    fn packing_truncates_to_capacity() {
        let lights = vec![Light::point(Vec3::ZERO, Vec3::ONE); MAX_LIGHTS + 5];
        let (_, count) = LightArray::pack(&lights, Mat4::IDENTITY);
        assert_eq!(count as usize, MAX_LIGHTS);
    }

    #[test]
    fn white_surface_without_lights_is_pure_ambient() {
        let s = SurfaceSample {
            position: Vec3::new(0.0, 0.0, -3.0),
            normal: Vec3::Z,
            albedo: Vec3::ONE,
            specular: 1.0,
            ao: 1.0,
        };
        let out = shade(&s, &[], 0.1);
        assert!((out - Vec3::splat(0.1)).length() < 1e-6);
    }

    #[test]
    fn light_outside_radius_contributes_nothing() {
        let light = Light::point(Vec3::new(0.0, 0.0, -100.0), Vec3::ONE).to_block(Mat4::IDENTITY);
        let s = SurfaceSample {
            position: Vec3::ZERO,
            normal: Vec3::NEG_Z,
            albedo: Vec3::ONE,
            specular: 0.0,
            ao: 1.0,
        };
        assert_eq!(blinn_phong(&light, &s), Vec3::ZERO);
    }

    #[test]
    fn facing_light_adds_energy() {
        let light = Light::point(Vec3::new(0.0, 0.0, 1.0), Vec3::ONE).to_block(Mat4::IDENTITY);
        let s = SurfaceSample {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            albedo: Vec3::ONE,
            specular: 0.5,
            ao: 1.0,
        };
        let lit = shade(&s, &[light], 0.1);
        assert!(lit.x > 0.1 && lit.is_finite());
    }

    #[test]
    fn light_array_size_is_uniform_friendly() {
        assert_eq!(LightArray::size(), (MAX_LIGHTS * 64) as u64);
    }
}
