use glam::{Mat4, Vec3};
use lightpass::bloom::pingpong::{BlurSource, PingPong, schedule, tonemap};
use lightpass::deferred::light::{Light, LightArray, SurfaceSample, attenuation_radius, shade};
use lightpass::deferred::light_volume::volume_instances;
use lightpass::ssao::{OcclusionQuery, generate_kernel, visibility};

fn white_surface() -> SurfaceSample {
    SurfaceSample {
        position: Vec3::new(0.0, 0.0, -3.0),
        normal: Vec3::Z,
        albedo: Vec3::ONE,
        specular: 0.5,
        ao: 1.0,
    }
}

// ── Lighting ──────────────────────────────────────────────────────────────

#[test]
fn white_default_without_lights_is_just_ambient() {
    let out = shade(&white_surface(), &[], 0.1);
    assert!((out - Vec3::splat(0.1)).length() < 1e-6);
}

#[test]
fn occlusion_scales_ambient_only() {
    let mut s = white_surface();
    s.ao = 0.5;
    assert!((shade(&s, &[], 0.2) - Vec3::splat(0.1)).length() < 1e-6);
}

#[test]
fn light_past_its_radius_contributes_nothing() {
    let light = Light::point(Vec3::new(0.0, 0.0, 100.0), Vec3::ONE);
    let radius = light.radius().unwrap();
    assert!(radius < 100.0);
    let (array, count) = LightArray::pack(&[light], Mat4::IDENTITY);
    assert_eq!(count, 1);
    let out = shade(&white_surface(), &array.lights[..1], 0.0);
    assert_eq!(out, Vec3::ZERO);
}

#[test]
fn attenuation_radius_grows_with_intensity() {
    let dim = attenuation_radius(1.0, 0.7, 1.8, 1.0);
    let bright = attenuation_radius(1.0, 0.7, 1.8, 10.0);
    assert!(dim > 0.0 && bright > dim);
    // Linear-only falloff solves the linear equation.
    let linear = attenuation_radius(1.0, 1.0, 0.0, 1.0);
    assert!((1.0 + linear - 256.0 / 5.0).abs() < 1e-3);
}

#[test]
fn volumes_cover_point_lights_only() {
    let lights = [
        Light::point(Vec3::ZERO, Vec3::ONE),
        Light::directional(Vec3::NEG_Y, Vec3::ONE),
        Light::point(Vec3::X, Vec3::splat(2.0)),
    ];
    assert_eq!(volume_instances(&lights, Mat4::IDENTITY).len(), 2);
}

// ── SSAO ──────────────────────────────────────────────────────────────────

#[test]
fn ssao_visibility_is_a_unit_fraction() {
    let kernel = generate_kernel(32, 5);
    let query = OcclusionQuery {
        position: Vec3::new(0.0, 0.0, -2.0),
        normal: Vec3::Z,
        random: Vec3::X,
        radius: 0.5,
        bias: 0.025,
        power: 2.0,
    };
    assert_eq!(visibility(&query, &kernel, |_| None), 1.0);
    for wall in [-1.6, -1.8, -1.95, -2.0, -5.0] {
        let v = visibility(&query, &kernel, |_| Some(wall));
        assert!((0.0..=1.0).contains(&v), "wall at {wall}: {v}");
    }
}

// ── Bloom ─────────────────────────────────────────────────────────────────

#[test]
fn ping_pong_ends_on_iterations_mod_two() {
    for m in 1..=10u32 {
        let mut pp = PingPong::new();
        let mut last = None;
        for _ in 0..m {
            last = Some(pp.step().write);
        }
        assert_eq!(pp.last_written(), last);
        assert_eq!(last, Some((m % 2) as usize));
    }
}

#[test]
fn blur_chain_starts_from_bright_and_alternates() {
    let steps = schedule(6);
    assert_eq!(steps[0].read, BlurSource::Bright);
    for pair in steps.windows(2) {
        assert_ne!(pair[0].horizontal, pair[1].horizontal);
        assert_eq!(pair[1].read, BlurSource::Buffer(pair[0].write));
    }
}

#[test]
fn tonemap_maps_black_to_black() {
    assert_eq!(tonemap(Vec3::ZERO, Vec3::ZERO, 1.0, 2.2), Vec3::ZERO);
    assert!(tonemap(Vec3::splat(1e4), Vec3::ZERO, 1.0, 2.2).max_element() <= 1.0);
}
