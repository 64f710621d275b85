use glam::{Vec2, Vec3};
use lightpass::geometry::*;

#[test]
fn cube_has_36_vertices() {
    let mesh = cube();
    assert_eq!(mesh.vertices.len(), 36);
    assert_eq!(mesh.triangle_count(), 12);
}

#[test]
fn vertex_stride_covers_five_attributes() {
    assert_eq!(std::mem::size_of::<Vertex>(), 14 * 4);
    assert_eq!(Vertex::layout().attributes.len(), 5);
}

#[test]
fn quad_tangent_follows_u_and_bitangent_follows_v() {
    for v in &quad().vertices {
        assert!((Vec3::from(v.tangent) - Vec3::X).length() < 1e-5);
        assert!((Vec3::from(v.bitangent) - Vec3::Y).length() < 1e-5);
        assert!(Vec3::from(v.tangent).dot(Vec3::from(v.normal)).abs() < 1e-5);
    }
}

#[test]
fn degenerate_uv_yields_finite_frame() {
    let pos = [Vec3::ZERO, Vec3::X, Vec3::Y];
    let (t, b) = tangent_basis(pos, [Vec2::ZERO; 3]);
    assert!(t.is_finite() && b.is_finite());
    assert!(t.length() > 0.5 && b.length() > 0.5);

    let (t, b) = tangent_basis([Vec3::ONE; 3], [Vec2::ZERO; 3]);
    assert_eq!((t, b), (Vec3::X, Vec3::Y));
}

#[test]
fn every_builtin_mesh_has_finite_tangents() {
    for mesh in [cube(), sphere(1.0, 16, 8), quad()] {
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        for v in &mesh.vertices {
            assert!(Vec3::from(v.tangent).is_finite());
            assert!(Vec3::from(v.bitangent).is_finite());
        }
    }
}

#[test]
fn model_matrix_places_rotated_floor_facing_up() {
    let m = model_matrix(Vec3::new(0.0, -1.0, 0.0), Vec3::splat(10.0), -90.0, Vec3::X);
    let normal = m.transform_vector3(Vec3::Z).normalize();
    assert!((normal - Vec3::Y).length() < 1e-5);
    assert!((m.transform_point3(Vec3::ZERO) - Vec3::new(0.0, -1.0, 0.0)).length() < 1e-6);
}
