//! Cube capture geometry shared by every environment stage.
//!
//! Faces follow the usual +X, -X, +Y, -Y, +Z, -Z layer order. The look-at
//! matrices are the classic cube-capture set; the capture projection flips Y
//! so that NDC +Y lands on texel row 0, which is where cube sampling expects it.

use glam::{Mat4, Vec3};

use crate::renderer::target::mip_extent;

pub const FACE_COUNT: u32 = 6;

/// (forward, up) per cube face.
pub const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

pub const CAPTURE_NEAR: f32 = 0.1;
pub const CAPTURE_FAR: f32 = 10.0;

/// 90° square projection with Y flipped for texel-row order.
pub fn capture_projection() -> Mat4 {
    capture_projection_range(CAPTURE_NEAR, CAPTURE_FAR)
}

pub fn capture_projection_range(near: f32, far: f32) -> Mat4 {
    Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
        * Mat4::perspective_rh(90f32.to_radians(), 1.0, near, far)
}

/// View matrix of `face` seen from `eye`.
pub fn capture_view(face: u32, eye: Vec3) -> Mat4 {
    let (forward, up) = CUBE_FACES[face as usize % 6];
    Mat4::look_at_rh(eye, eye + forward, up)
}

/// `projection * view` for each face, eye at the origin.
pub fn capture_view_projs() -> [Mat4; 6] {
    let proj = capture_projection();
    std::array::from_fn(|face| proj * capture_view(face as u32, Vec3::ZERO))
}

/// World direction through texel coordinate `(s, t)` of `face`, `t = 0` on row 0.
///
/// Matches the cube sampling rules, so `face_direction` followed by a cube
/// lookup returns the same texel.
pub fn face_direction(face: u32, s: f32, t: f32) -> Vec3 {
    let a = 2.0 * s - 1.0;
    let b = 2.0 * t - 1.0;
    let dir = match face {
        0 => Vec3::new(1.0, -b, -a),
        1 => Vec3::new(-1.0, -b, a),
        2 => Vec3::new(a, 1.0, b),
        3 => Vec3::new(a, -1.0, -b),
        4 => Vec3::new(a, -b, 1.0),
        _ => Vec3::new(-a, -b, -1.0),
    };
    dir.normalize()
}

/// WGSL twin of [`face_direction`].
pub const FACE_DIRECTION_WGSL: &str = "
fn face_direction(face: u32, uv: vec2<f32>) -> vec3<f32> {
    let a = 2.0 * uv.x - 1.0;
    let b = 2.0 * uv.y - 1.0;
    var dir: vec3<f32>;
    switch face {
        case 0u: { dir = vec3<f32>(1.0, -b, -a); }
        case 1u: { dir = vec3<f32>(-1.0, -b, a); }
        case 2u: { dir = vec3<f32>(a, 1.0, b); }
        case 3u: { dir = vec3<f32>(a, -1.0, -b); }
        case 4u: { dir = vec3<f32>(a, -b, 1.0); }
        default: { dir = vec3<f32>(-a, -b, -1.0); }
    }
    return normalize(dir);
}
";

// ── Capture plan ──────────────────────────────────────────────────────────────

/// One face draw of a cube stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaceDraw {
    pub mip: u32,
    pub face: u32,
    /// Side of the face at this mip.
    pub size: u32,
}

/// Ordered face draws for a cube of side `size` with `mips` levels, mip-major.
pub fn capture_plan(size: u32, mips: u32) -> Vec<FaceDraw> {
    (0..mips)
        .flat_map(|mip| {
            let side = mip_extent(size, mip);
            (0..FACE_COUNT).map(move |face| FaceDraw { mip, face, size: side })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_views_are_orthonormal() {
        for face in 0..6 {
            let v = capture_view(face, Vec3::ZERO);
            let r = glam::Mat3::from_mat4(v);
            let should_be_identity = r * r.transpose();
            assert!(should_be_identity.abs_diff_eq(glam::Mat3::IDENTITY, 1e-5), "face {face}");
            assert!((r.determinant() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn face_centre_projects_to_ndc_origin() {
        let vps = capture_view_projs();
        for face in 0..6u32 {
            let dir = face_direction(face, 0.5, 0.5);
            let clip = vps[face as usize] * dir.extend(1.0);
            let ndc = clip.truncate() / clip.w;
            assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5, "face {face}: {ndc:?}");
        }
    }

    #[test]
    fn capture_matrices_agree_with_face_directions() {
        let vps = capture_view_projs();
        for face in 0..6u32 {
            let inv = vps[face as usize].inverse();
            for (s, t) in [(0.1, 0.2), (0.9, 0.3), (0.25, 0.8)] {
                let ndc = glam::Vec4::new(2.0 * s - 1.0, 1.0 - 2.0 * t, 0.5, 1.0);
                let world = inv * ndc;
                let ray = (world.truncate() / world.w).normalize();
                let expected = face_direction(face, s, t);
                assert!((ray - expected).length() < 1e-4, "face {face} ({s},{t}): {ray:?} vs {expected:?}");
            }
        }
    }

    #[test]
    fn plan_has_six_faces_per_mip_at_any_resolution() {
        for (size, mips) in [(512, 1), (32, 1), (128, 5), (7, 3)] {
            let plan = capture_plan(size, mips);
            assert_eq!(plan.len() as u32, 6 * mips);
            for mip in 0..mips {
                let faces: Vec<u32> = plan.iter().filter(|d| d.mip == mip).map(|d| d.face).collect();
                assert_eq!(faces, vec![0, 1, 2, 3, 4, 5]);
            }
        }
    }

    #[test]
    fn plan_sizes_halve_per_mip() {
        let plan = capture_plan(128, 5);
        let sizes: Vec<u32> = plan.iter().step_by(6).map(|d| d.size).collect();
        assert_eq!(sizes, vec![128, 64, 32, 16, 8]);
    }
}
