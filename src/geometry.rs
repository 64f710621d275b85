// =============================================================================
// GEOMETRY.RS: Mesh primitives for the lighting passes
//
// Procedural meshes shared by every stage:
// - Unit cube (environment capture, skybox, shadow casters)
// - UV sphere (light volumes, PBR spheres, light markers)
// - Screen-facing quad (normal-mapped walls, floors)
// Every vertex carries a tangent frame derived from UV edge deltas.
// =============================================================================

use glam::{Mat4, Vec2, Vec3};
use wgpu::util::DeviceExt;

/// Below this magnitude the UV-space determinant is treated as degenerate.
pub const TANGENT_EPSILON: f32 = 1e-8;

// =============================================================================
// Vertex layout
// =============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,  // position
        1 => Float32x3,  // normal
        2 => Float32x2,  // uv
        3 => Float32x3,  // tangent
        4 => Float32x3,  // bitangent
    ];

    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
            tangent: [0.0; 3],
            bitangent: [0.0; 3],
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

// =============================================================================
// Tangent frame
// =============================================================================

/// Tangent and bitangent of one triangle from its position and UV edge deltas.
///
/// ```text
/// f = 1 / (dUV1.x * dUV2.y - dUV2.x * dUV1.y)
/// T = f * ( dUV2.y * E1 - dUV1.y * E2)
/// B = f * (-dUV2.x * E1 + dUV1.x * E2)
/// ```
///
/// When the UV determinant is within [`TANGENT_EPSILON`] of zero the frame is
/// instead built orthonormal to the face normal (or the world X/Y axes for a
/// zero-area triangle), so the result is always finite.
pub fn tangent_basis(pos: [Vec3; 3], uv: [Vec2; 3]) -> (Vec3, Vec3) {
    let e1 = pos[1] - pos[0];
    let e2 = pos[2] - pos[0];
    let d1 = uv[1] - uv[0];
    let d2 = uv[2] - uv[0];

    let det = d1.x * d2.y - d2.x * d1.y;
    if det.abs() < TANGENT_EPSILON {
        let n = e1.cross(e2).normalize_or_zero();
        if n == Vec3::ZERO {
            return (Vec3::X, Vec3::Y);
        }
        return n.any_orthonormal_pair();
    }

    let f = 1.0 / det;
    let tangent = f * (d2.y * e1 - d1.y * e2);
    let bitangent = f * (-d2.x * e1 + d1.x * e2);
    (tangent, bitangent)
}

// =============================================================================
// Mesh
// =============================================================================

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Accumulate per-triangle tangent frames onto each vertex and normalize.
    pub fn compute_tangents(&mut self) {
        let mut tangents = vec![Vec3::ZERO; self.vertices.len()];
        let mut bitangents = vec![Vec3::ZERO; self.vertices.len()];

        for tri in self.indices.chunks_exact(3) {
            let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let pos = idx.map(|i| Vec3::from(self.vertices[i].position));
            let uv = idx.map(|i| Vec2::from(self.vertices[i].uv));
            let (t, b) = tangent_basis(pos, uv);
            for i in idx {
                tangents[i] += t;
                bitangents[i] += b;
            }
        }

        for (v, (t, b)) in self.vertices.iter_mut().zip(tangents.into_iter().zip(bitangents)) {
            // Opposing contributions can cancel out; keep the frame usable.
            let t = t.try_normalize().unwrap_or(Vec3::X);
            let b = b.try_normalize().unwrap_or(Vec3::Y);
            v.tangent = t.to_array();
            v.bitangent = b.to_array();
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Axis-aligned cube spanning [-1, 1]³, 36 vertices with per-face normals.
pub fn cube() -> Mesh {
    // (normal, u axis, v axis) with u × v = normal, so corners wind CCW seen from outside.
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    const CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut mesh = Mesh::default();
    for (n, u, v) in FACES {
        let (n, u, v) = (Vec3::from(n), Vec3::from(u), Vec3::from(v));
        let corner = |(su, sv): (f32, f32)| {
            Vertex::new(n + su * u + sv * v, n, Vec2::new((su + 1.0) * 0.5, (1.0 - sv) * 0.5))
        };
        for c in [0, 1, 2, 0, 2, 3] {
            mesh.indices.push(mesh.vertices.len() as u32);
            mesh.vertices.push(corner(CORNERS[c]));
        }
    }
    mesh.compute_tangents();
    mesh
}

/// UV sphere built from `sectors` around the pole axis and `stacks` from pole
/// to pole. The pole rows emit a single triangle per sector.
pub fn sphere(radius: f32, sectors: u32, stacks: u32) -> Mesh {
    use std::f32::consts::PI;
    let sectors = sectors.max(3);
    let stacks = stacks.max(2);
    let mut mesh = Mesh::default();

    for i in 0..=stacks {
        let stack_angle = PI / 2.0 - i as f32 * (PI / stacks as f32);
        let xy = radius * stack_angle.cos();
        let z = radius * stack_angle.sin();
        for j in 0..=sectors {
            let sector_angle = j as f32 * (2.0 * PI / sectors as f32);
            let p = Vec3::new(xy * sector_angle.cos(), xy * sector_angle.sin(), z);
            let uv = Vec2::new(j as f32 / sectors as f32, i as f32 / stacks as f32);
            mesh.vertices.push(Vertex::new(p, p / radius, uv));
        }
    }

    for i in 0..stacks {
        for j in 0..sectors {
            let first = i * (sectors + 1) + j;
            let second = first + sectors + 1;
            if i != 0 {
                mesh.indices.extend_from_slice(&[first, second, first + 1]);
            }
            if i != stacks - 1 {
                mesh.indices.extend_from_slice(&[first + 1, second, second + 1]);
            }
        }
    }

    mesh.compute_tangents();
    mesh
}

/// Unit quad in the XY plane facing +Z, UV (0,0) bottom-left to (1,1) top-right.
pub fn quad() -> Mesh {
    let n = Vec3::Z;
    let mut mesh = Mesh {
        vertices: vec![
            Vertex::new(Vec3::new(-1.0, -1.0, 0.0), n, Vec2::new(0.0, 0.0)),
            Vertex::new(Vec3::new(1.0, -1.0, 0.0), n, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(-1.0, 1.0, 0.0), n, Vec2::new(0.0, 1.0)),
            Vertex::new(Vec3::new(1.0, 1.0, 0.0), n, Vec2::new(1.0, 1.0)),
        ],
        indices: vec![0, 1, 2, 2, 1, 3],
    };
    mesh.compute_tangents();
    mesh
}

/// `translate * scale * rotate`, the order every demo scene uses.
pub fn model_matrix(position: Vec3, scale: Vec3, angle_degrees: f32, axis: Vec3) -> Mat4 {
    let axis = axis.try_normalize().unwrap_or(Vec3::Y);
    Mat4::from_translation(position)
        * Mat4::from_scale(scale)
        * Mat4::from_axis_angle(axis, angle_degrees.to_radians())
}

// =============================================================================
// GPU upload
// =============================================================================

pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, label: &str, mesh: &Mesh) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_vertices", label)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_indices", label)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertex_buffer, index_buffer, index_count: mesh.indices.len() as u32 }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        self.draw_instanced(pass, 0..1);
    }

    pub fn draw_instanced(&self, pass: &mut wgpu::RenderPass<'_>, instances: std::ops::Range<u32>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, instances);
    }
}

/// Procedural meshes a draw item can reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeshKind {
    Cube,
    Sphere,
    Quad,
}

/// One uploaded copy of every [`MeshKind`].
pub struct MeshLibrary {
    cube: GpuMesh,
    sphere: GpuMesh,
    quad: GpuMesh,
}

impl MeshLibrary {
    pub const SPHERE_SECTORS: u32 = 64;
    pub const SPHERE_STACKS: u32 = 32;

    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            cube: GpuMesh::upload(device, "cube", &cube()),
            sphere: GpuMesh::upload(device, "sphere", &sphere(1.0, Self::SPHERE_SECTORS, Self::SPHERE_STACKS)),
            quad: GpuMesh::upload(device, "quad", &quad()),
        }
    }

    pub fn get(&self, kind: MeshKind) -> &GpuMesh {
        match kind {
            MeshKind::Cube => &self.cube,
            MeshKind::Sphere => &self.sphere,
            MeshKind::Quad => &self.quad,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_36_vertices_on_the_unit_box() {
        let m = cube();
        assert_eq!(m.vertices.len(), 36);
        assert_eq!(m.triangle_count(), 12);
        for v in &m.vertices {
            assert!(v.position.iter().all(|c| (c.abs() - 1.0).abs() < 1e-6));
        }
    }

    #[test]
    fn cube_faces_wind_outward() {
        let m = cube();
        for tri in m.indices.chunks_exact(3) {
            let p = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(m.vertices[i as usize].position));
            let n = Vec3::from(m.vertices[tri[0] as usize].normal);
            let face_n = (p[1] - p[0]).cross(p[2] - p[0]);
            assert!(face_n.dot(n) > 0.0);
        }
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let m = sphere(2.0, 16, 8);
        assert_eq!(m.vertices.len(), 17 * 9);
        // Pole rows contribute one triangle per sector, the rest two.
        assert_eq!(m.triangle_count(), 16 * (2 * 8 - 2));
        for v in &m.vertices {
            assert!((Vec3::from(v.position).length() - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn sphere_tangents_are_finite() {
        let m = sphere(1.0, 32, 16);
        for v in &m.vertices {
            assert!(v.tangent.iter().chain(v.bitangent.iter()).all(|c| c.is_finite()));
        }
    }

    #[test]
    fn quad_frame_matches_uv_axes() {
        let m = quad();
        for v in &m.vertices {
            assert!((Vec3::from(v.tangent) - Vec3::X).length() < 1e-5);
            assert!((Vec3::from(v.bitangent) - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn degenerate_uv_falls_back_to_orthonormal_frame() {
        let pos = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let uv = [Vec2::ZERO, Vec2::ZERO, Vec2::ZERO];
        let (t, b) = tangent_basis(pos, uv);
        assert!(t.is_finite() && b.is_finite());
        assert!((t.length() - 1.0).abs() < 1e-5);
        assert!(t.dot(b).abs() < 1e-5);
        assert!(t.dot(Vec3::Z).abs() < 1e-5);
    }

    #[test]
    fn model_matrix_translates_last() {
        let m = model_matrix(Vec3::new(1.0, 2.0, 3.0), Vec3::splat(2.0), 90.0, Vec3::Y);
        let p = m.transform_point3(Vec3::X);
        // rotate X about Y by 90° → -Z, scale → -2Z, translate.
        assert!((p - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-5, "{p}");
    }
}
