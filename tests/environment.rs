use glam::{Mat3, Vec3};
use lightpass::assets::HdrImage;
use lightpass::environment::EnvironmentStages;
use lightpass::environment::capture::{FACE_COUNT, capture_plan, capture_view, face_direction};
use lightpass::environment::prefilter::{level_roughness, prefilter_mip_sizes};
use lightpass::environment::sampling::{dir_to_equirect_uv, hammersley, integrate_brdf, project_cube};

fn gradient(width: u32, height: u32) -> HdrImage {
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            rgba.extend_from_slice(&[x as f32 / width as f32, y as f32 / height as f32, 4.0, 1.0]);
        }
    }
    HdrImage { width, height, rgba }
}

// ── Capture ───────────────────────────────────────────────────────────────

#[test]
fn every_mip_gets_exactly_six_faces() {
    for (size, mips) in [(512, 1), (32, 1), (128, 5), (7, 3)] {
        let plan = capture_plan(size, mips);
        assert_eq!(plan.len() as u32, FACE_COUNT * mips);
        for mip in 0..mips {
            let faces: Vec<u32> = plan.iter().filter(|d| d.mip == mip).map(|d| d.face).collect();
            assert_eq!(faces, [0, 1, 2, 3, 4, 5]);
        }
    }
}

#[test]
fn capture_views_are_rotations() {
    for face in 0..FACE_COUNT {
        let r = Mat3::from_mat4(capture_view(face, Vec3::new(1.0, 2.0, 3.0)));
        assert!((r * r.transpose()).abs_diff_eq(Mat3::IDENTITY, 1e-5), "face {face}");
    }
}

#[test]
fn face_centres_point_along_the_axes() {
    let axes = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
    for (face, axis) in axes.into_iter().enumerate() {
        let d = face_direction(face as u32, 0.5, 0.5).normalize();
        assert!((d - axis).length() < 1e-5, "face {face}: {d}");
    }
}

// ── Projection ────────────────────────────────────────────────────────────

#[test]
fn projection_is_deterministic() {
    let img = gradient(64, 32);
    let a = project_cube(&img, 16);
    let b = project_cube(&img, 16);
    assert_eq!(a.len(), 6);
    assert!(a.iter().all(|face| face.len() == 16 * 16));
    assert_eq!(a, b);
}

#[test]
fn equirect_top_row_is_up() {
    let uv = dir_to_equirect_uv(Vec3::Y);
    assert!(uv.y.abs() < 1e-5);
    let uv = dir_to_equirect_uv(Vec3::NEG_Y);
    assert!((uv.y - 1.0).abs() < 1e-5);
    let uv = dir_to_equirect_uv(Vec3::X);
    assert!((uv.x - 0.5).abs() < 1e-5 && (uv.y - 0.5).abs() < 1e-5);
}

// ── Prefilter ─────────────────────────────────────────────────────────────

#[test]
fn prefilter_levels_halve_down_to_the_floor() {
    assert_eq!(prefilter_mip_sizes(128, 5, 8).unwrap(), [128, 64, 32, 16, 8]);
    assert!(prefilter_mip_sizes(128, 6, 8).is_err());
    assert!(prefilter_mip_sizes(128, 0, 8).is_err());
    assert_eq!(level_roughness(0, 5), 0.0);
    assert_eq!(level_roughness(4, 5), 1.0);
}

// ── BRDF LUT ──────────────────────────────────────────────────────────────

#[test]
fn hammersley_points_are_in_the_unit_square() {
    let n = 1024;
    for i in 0..n {
        let p = hammersley(i, n);
        assert!((0.0..1.0).contains(&p.x) && (0.0..1.0).contains(&p.y), "{i}: {p}");
    }
    assert_eq!(hammersley(1, 2).y, 0.5);
}

#[test]
fn brdf_lut_values_stay_in_range() {
    for &n_dot_v in &[0.2, 0.6, 1.0] {
        for &roughness in &[0.0, 0.25, 0.5, 1.0] {
            let v = integrate_brdf(n_dot_v, roughness, 256);
            assert!((0.0..=1.0).contains(&v.x), "scale {v} at ({n_dot_v}, {roughness})");
            assert!((0.0..=1.0).contains(&v.y), "bias {v} at ({n_dot_v}, {roughness})");
            assert!(v.x + v.y <= 1.0 + 1e-3);
        }
    }
}

#[test]
fn environment_stages_require_a_prefix() {
    let full = EnvironmentStages::default();
    assert!(full.complete());
    full.check_order().unwrap();
    let gap = EnvironmentStages { projection: true, irradiance: false, prefilter: true, brdf: false };
    assert!(gap.check_order().is_err());
    assert!(!gap.complete());
}
