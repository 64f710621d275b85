//! CPU versions of the environment sampling math.
//!
//! The shaders in this module's siblings carry WGSL twins of these functions.
//! The CPU side backs the tests and gives a deterministic reference projection.

use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use super::capture::face_direction;
use crate::assets::HdrImage;

/// Smallest denominator allowed in the GGX and solid-angle math.
pub const DENOM_EPSILON: f32 = 1e-4;

// ── Equirectangular lookup ────────────────────────────────────────────────────

/// Texture coordinate of direction `dir` in an equirectangular image, top row `v = 0`.
pub fn dir_to_equirect_uv(dir: Vec3) -> Vec2 {
    let d = dir.normalize();
    let u = d.z.atan2(d.x) / (2.0 * PI) + 0.5;
    let v = 0.5 - d.y.clamp(-1.0, 1.0).asin() / PI;
    Vec2::new(u, v)
}

fn sample_nearest(img: &HdrImage, uv: Vec2) -> [f32; 4] {
    let x = (uv.x.rem_euclid(1.0) * img.width as f32) as u32;
    let y = (uv.y.clamp(0.0, 1.0) * img.height as f32) as u32;
    img.texel(x, y)
}

/// One face of the projected cube computed on the CPU, `size × size` RGBA, row-major.
pub fn project_face(img: &HdrImage, face: u32, size: u32) -> Vec<[f32; 4]> {
    let mut out = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let s = (x as f32 + 0.5) / size as f32;
            let t = (y as f32 + 0.5) / size as f32;
            out.push(sample_nearest(img, dir_to_equirect_uv(face_direction(face, s, t))));
        }
    }
    out
}

/// All six faces at mip 0.
pub fn project_cube(img: &HdrImage, size: u32) -> Vec<Vec<[f32; 4]>> {
    (0..6).map(|face| project_face(img, face, size)).collect()
}

// ── Irradiance ────────────────────────────────────────────────────────────────

/// Number of hemisphere samples the irradiance integral takes per texel.
pub fn irradiance_sample_count(step: f32) -> u32 {
    let azimuth = (2.0 * PI / step).ceil() as u32;
    let polar = (0.5 * PI / step).ceil() as u32;
    azimuth * polar
}

/// Orthonormal basis around `n`, switching the helper axis near the poles.
pub fn tangent_frame(n: Vec3) -> (Vec3, Vec3) {
    let helper = if n.y.abs() > 0.999 { Vec3::Z } else { Vec3::Y };
    let right = helper.cross(n).normalize();
    let up = n.cross(right).normalize();
    (right, up)
}

// ── Importance sampling ───────────────────────────────────────────────────────

/// Van der Corput radical inverse in base 2.
pub fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = bits.rotate_left(16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xAAAA_AAAA) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xCCCC_CCCC) >> 2);
    bits = ((bits & 0x0F0F_0F0F) << 4) | ((bits & 0xF0F0_F0F0) >> 4);
    bits = ((bits & 0x00FF_00FF) << 8) | ((bits & 0xFF00_FF00) >> 8);
    bits as f32 * 2.328_306_4e-10
}

pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

/// GGX-distributed half vector around `n` for sample point `xi`.
pub fn importance_sample_ggx(xi: Vec2, n: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = 2.0 * PI * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y).max(DENOM_EPSILON)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let h = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);

    let up = if n.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = up.cross(n).normalize();
    let bitangent = n.cross(tangent);
    (tangent * h.x + bitangent * h.y + n * h.z).normalize()
}

pub fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * d * d).max(DENOM_EPSILON)
}

/// Source mip to read for a prefilter sample, from the ratio of sample to texel solid angle.
pub fn prefilter_source_lod(n_dot_h: f32, h_dot_v: f32, roughness: f32, resolution: f32, samples: u32) -> f32 {
    if roughness == 0.0 {
        return 0.0;
    }
    let d = distribution_ggx(n_dot_h, roughness);
    let pdf = d * n_dot_h / (4.0 * h_dot_v).max(DENOM_EPSILON) + DENOM_EPSILON;
    let sa_texel = 4.0 * PI / (6.0 * resolution * resolution);
    let sa_sample = 1.0 / (samples as f32 * pdf + DENOM_EPSILON);
    (0.5 * (sa_sample / sa_texel).log2()).max(0.0)
}

// ── Split-sum BRDF ────────────────────────────────────────────────────────────

/// Schlick-GGX geometry term with the IBL `k = α²/2` remapping.
pub fn geometry_schlick_ggx_ibl(n_dot_v: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    n_dot_v / (n_dot_v * (1.0 - k) + k).max(DENOM_EPSILON)
}

pub fn geometry_smith_ibl(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    geometry_schlick_ggx_ibl(n_dot_v, roughness) * geometry_schlick_ggx_ibl(n_dot_l, roughness)
}

/// Split-sum scale and bias for `(n·v, roughness)`.
pub fn integrate_brdf(n_dot_v: f32, roughness: f32, samples: u32) -> Vec2 {
    let n_dot_v = n_dot_v.max(DENOM_EPSILON);
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);
    let n = Vec3::Z;

    let mut a = 0.0;
    let mut b = 0.0;
    for i in 0..samples {
        let xi = hammersley(i, samples);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = (2.0 * v.dot(h) * h - v).normalize();

        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);

        if n_dot_l > 0.0 {
            let g = geometry_smith_ibl(n_dot_v, n_dot_l, roughness);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v).max(DENOM_EPSILON);
            let fc = (1.0 - v_dot_h).powi(5);
            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }
    Vec2::new(a, b) / samples as f32
}

/// WGSL twins of the sampling helpers.
pub const SAMPLING_WGSL: &str = "
const DENOM_EPSILON: f32 = 1e-4;

fn radical_inverse_vdc(b: u32) -> f32 {
    var bits = (b << 16u) | (b >> 16u);
    bits = ((bits & 0x55555555u) << 1u) | ((bits & 0xAAAAAAAAu) >> 1u);
    bits = ((bits & 0x33333333u) << 2u) | ((bits & 0xCCCCCCCCu) >> 2u);
    bits = ((bits & 0x0F0F0F0Fu) << 4u) | ((bits & 0xF0F0F0F0u) >> 4u);
    bits = ((bits & 0x00FF00FFu) << 8u) | ((bits & 0xFF00FF00u) >> 8u);
    return f32(bits) * 2.3283064365386963e-10;
}

fn hammersley(i: u32, n: u32) -> vec2<f32> {
    return vec2<f32>(f32(i) / f32(n), radical_inverse_vdc(i));
}

fn importance_sample_ggx(xi: vec2<f32>, n: vec3<f32>, roughness: f32) -> vec3<f32> {
    let a = roughness * roughness;
    let phi = 2.0 * PI * xi.x;
    let cos_theta = sqrt((1.0 - xi.y) / max(1.0 + (a * a - 1.0) * xi.y, DENOM_EPSILON));
    let sin_theta = sqrt(max(1.0 - cos_theta * cos_theta, 0.0));
    let h = vec3<f32>(cos(phi) * sin_theta, sin(phi) * sin_theta, cos_theta);
    var up = vec3<f32>(1.0, 0.0, 0.0);
    if (abs(n.z) < 0.999) {
        up = vec3<f32>(0.0, 0.0, 1.0);
    }
    let tangent = normalize(cross(up, n));
    let bitangent = cross(n, tangent);
    return normalize(tangent * h.x + bitangent * h.y + n * h.z);
}

fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / max(PI * d * d, DENOM_EPSILON);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image() -> HdrImage {
        let (w, h) = (16u32, 8u32);
        let mut rgba = Vec::new();
        for y in 0..h {
            for x in 0..w {
                rgba.extend_from_slice(&[x as f32 / w as f32, y as f32 / h as f32, 0.25, 1.0]);
            }
        }
        HdrImage { width: w, height: h, rgba }
    }

    #[test]
    fn equirect_poles_and_seam() {
        assert!((dir_to_equirect_uv(Vec3::Y).y - 0.0).abs() < 1e-6);
        assert!((dir_to_equirect_uv(Vec3::NEG_Y).y - 1.0).abs() < 1e-6);
        let fwd = dir_to_equirect_uv(Vec3::X);
        assert!((fwd - Vec2::new(0.5, 0.5)).length() < 1e-6);
    }

    #[test]
    fn projection_is_bit_identical_across_runs() {
        let img = gradient_image();
        let a = project_cube(&img, 8);
        let b = project_cube(&img, 8);
        assert_eq!(a.len(), 6);
        for (fa, fb) in a.iter().zip(&b) {
            assert_eq!(fa.len(), 64);
            let bits_a: Vec<u32> = fa.iter().flatten().map(|v| v.to_bits()).collect();
            let bits_b: Vec<u32> = fb.iter().flatten().map(|v| v.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
    }

    #[test]
    fn top_face_reads_top_row() {
        let img = gradient_image();
        let face = project_face(&img, 2, 4);
        // Every +Y texel points upward, so it samples the upper half of the image.
        assert!(face.iter().all(|t| t[1] < 0.5));
    }

    #[test]
    fn hammersley_points_in_unit_square() {
        for i in 0..1024 {
            let p = hammersley(i, 1024);
            assert!((0.0..1.0).contains(&p.x) && (0.0..1.0).contains(&p.y));
        }
        assert_eq!(radical_inverse_vdc(1), 0.5);
        assert_eq!(radical_inverse_vdc(2), 0.25);
    }

    #[test]
    fn ggx_samples_lie_in_upper_hemisphere() {
        let n = Vec3::new(0.3, 0.8, 0.1).normalize();
        for i in 0..256 {
            let h = importance_sample_ggx(hammersley(i, 256), n, 0.6);
            assert!(h.dot(n) >= -1e-5);
            assert!((h.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn zero_roughness_samples_the_normal() {
        let n = Vec3::Z;
        let h = importance_sample_ggx(Vec2::new(0.3, 0.7), n, 0.0);
        assert!((h - n).length() < 1e-4);
    }

    #[test]
    fn brdf_lut_values_stay_in_unit_range() {
        for &nv in &[0.05, 0.3, 0.7, 1.0] {
            for &r in &[0.0, 0.25, 0.5, 1.0] {
                let v = integrate_brdf(nv, r, 256);
                assert!(v.x.is_finite() && v.y.is_finite());
                assert!(v.x >= 0.0 && v.y >= 0.0 && v.x + v.y <= 1.0 + 1e-3, "nv={nv} r={r}: {v:?}");
            }
        }
    }

    #[test]
    fn smooth_head_on_brdf_is_fully_reflective() {
        let v = integrate_brdf(1.0, 0.0, 64);
        assert!((v.x + v.y - 1.0).abs() < 1e-2, "{v:?}");
    }

    #[test]
    fn irradiance_sample_count_for_default_step() {
        assert_eq!(irradiance_sample_count(0.025), 252 * 63);
    }

    #[test]
    fn tangent_frame_is_orthonormal_at_poles() {
        for n in [Vec3::Y, Vec3::NEG_Y, Vec3::X, Vec3::new(1.0, 1.0, 0.0).normalize()] {
            let (r, u) = tangent_frame(n);
            assert!(r.is_finite() && u.is_finite());
            assert!(r.dot(n).abs() < 1e-5 && u.dot(n).abs() < 1e-5 && r.dot(u).abs() < 1e-5);
        }
    }

    #[test]
    fn prefilter_lod_is_non_negative() {
        assert_eq!(prefilter_source_lod(1.0, 1.0, 0.0, 512.0, 1024), 0.0);
        let lod = prefilter_source_lod(0.9, 0.8, 1.0, 512.0, 1024);
        assert!(lod > 0.0 && lod.is_finite());
    }
}
