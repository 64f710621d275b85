//! Hemisphere sample kernel, rotation noise and a CPU twin of the occlusion
//! estimate.

use glam::{Mat3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const MAX_KERNEL_SIZE: usize = 64;

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// `size` samples in the +Z hemisphere, denser towards the origin.
pub fn generate_kernel(size: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|i| {
            let dir = Vec3::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0), rng.gen_range(0.0..=1.0));
            let sample = dir.try_normalize().unwrap_or(Vec3::Z) * rng.gen_range(0.0..=1.0f32);
            let t = i as f32 / size as f32;
            sample * lerp(0.1, 1.0, t * t)
        })
        .collect()
}

/// `side²` random rotation vectors about +Z, one per noise texel.
pub fn generate_noise(side: u32, seed: u64) -> Vec<[f32; 4]> {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15);
    (0..side * side)
        .map(|_| [rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0), 0.0, 0.0])
        .collect()
}

/// Gram-Schmidt frame with `normal` as Z, tilted by the noise vector.
pub fn tangent_frame(normal: Vec3, random: Vec3) -> Mat3 {
    let tangent = (random - normal * random.dot(normal))
        .try_normalize()
        .unwrap_or_else(|| normal.any_orthonormal_vector());
    let bitangent = normal.cross(tangent);
    Mat3::from_cols(tangent, bitangent, normal)
}

/// Inputs of one occlusion estimate, all in view space.
#[derive(Copy, Clone, Debug)]
pub struct OcclusionQuery {
    pub position: Vec3,
    pub normal: Vec3,
    pub random: Vec3,
    pub radius: f32,
    pub bias: f32,
    pub power: f32,
}

/// Visibility in `[0, 1]` for one texel; 1 means unoccluded.
///
/// `depth_at` returns the view-space depth of the nearest surface seen
/// through a view-space point, or `None` where nothing was drawn.
pub fn visibility(query: &OcclusionQuery, kernel: &[Vec3], depth_at: impl Fn(Vec3) -> Option<f32>) -> f32 {
    if kernel.is_empty() {
        return 1.0;
    }
    let frame = tangent_frame(query.normal, query.random);
    let mut occlusion = 0.0;
    for &sample in kernel {
        let p = query.position + frame * sample * query.radius;
        let Some(depth) = depth_at(p) else { continue };
        let range = smoothstep(0.0, 1.0, query.radius / (query.position.z - depth).abs().max(1e-4));
        if depth >= p.z + query.bias {
            occlusion += range;
        }
    }
    (1.0 - occlusion / kernel.len() as f32).clamp(0.0, 1.0).powf(query.power)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(power: f32) -> OcclusionQuery {
        OcclusionQuery {
            position: Vec3::new(0.0, 0.0, -5.0),
            normal: Vec3::Z,
            random: Vec3::new(0.6, 0.8, 0.0),
            radius: 0.5,
            bias: 0.025,
            power,
        }
    }

    #[test]
    fn kernel_is_in_hemisphere_and_deterministic() {
        let a = generate_kernel(64, 7);
        let b = generate_kernel(64, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        for s in &a {
            assert!(s.z >= 0.0);
            assert!(s.length() <= 1.0 + 1e-5);
        }
        assert_ne!(a, generate_kernel(64, 8));
    }

    #[test]
    fn kernel_scale_grows_with_index() {
        let kernel = generate_kernel(64, 1);
        assert!(kernel[0].length() <= 0.1 + 1e-5);
    }

    #[test]
    fn noise_rotates_about_z() {
        let noise = generate_noise(4, 3);
        assert_eq!(noise.len(), 16);
        assert!(noise.iter().all(|n| n[2] == 0.0 && n[0].abs() <= 1.0 && n[1].abs() <= 1.0));
    }

    #[test]
    fn tangent_frame_is_orthonormal() {
        let n = Vec3::new(0.3, 0.9, 0.1).normalize();
        let m = tangent_frame(n, Vec3::new(1.0, 0.0, 0.0));
        assert!(m.x_axis.dot(n).abs() < 1e-5);
        assert!((m.x_axis.length() - 1.0).abs() < 1e-5);
        assert!((m.z_axis - n).length() < 1e-6);
        let parallel = tangent_frame(Vec3::Z, Vec3::Z);
        assert!(parallel.x_axis.is_finite());
    }

    #[test]
    fn no_occluders_means_fully_visible() {
        let kernel = generate_kernel(64, 11);
        assert_eq!(visibility(&query(1.0), &kernel, |_| None), 1.0);
        // A flat floor at the texel's own depth hides nothing above it.
        assert!((visibility(&query(1.0), &kernel, |_| Some(-5.0)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn covering_wall_occludes() {
        let kernel = generate_kernel(64, 11);
        let v = visibility(&query(1.0), &kernel, |_| Some(-4.6));
        assert!(v < 0.5, "{v}");
        assert!((0.0..=1.0).contains(&v));
    }

    #[test]
    fn power_darkens_partial_occlusion() {
        let kernel = generate_kernel(64, 11);
        let depth = |p: Vec3| if p.x > 0.0 { Some(-4.7) } else { None };
        let linear = visibility(&query(1.0), &kernel, depth);
        let squared = visibility(&query(2.0), &kernel, depth);
        assert!(linear > 0.0 && linear < 1.0);
        assert!(squared <= linear);
    }
}
