use glam::{Mat4, Vec3};

use crate::error::RenderResult;
use crate::input::{InputState, KeyCode, MouseButton};
use crate::renderer::params::{ProgramParams, UniformBlock, uniform_entry};

/// Camera uniform uploaded once per frame and shared by every scene pass.
///
/// Matrices are column-major, matching WGSL `mat4x4<f32>`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    /// View → world, used by lighting to rotate view-space normals back for
    /// environment lookups.
    pub inv_view: [[f32; 4]; 4],
    /// World-space eye position (w = 1).
    pub position: [f32; 4],
}

impl ProgramParams for CameraUniform {
    const LABEL: &'static str = "camera";
}

impl CameraUniform {
    pub fn new(view: Mat4, projection: Mat4, position: Vec3) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_proj: (projection * view).to_cols_array_2d(),
            inv_view: view.inverse().to_cols_array_2d(),
            position: position.extend(1.0).to_array(),
        }
    }
}

/// WGSL twin of [`CameraUniform`], bound at `@group(0) @binding(0)`.
pub const CAMERA_WGSL: &str = "
struct Camera {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    inv_view: mat4x4<f32>,
    position: vec4<f32>,
};

@group(0) @binding(0) var<uniform> camera: Camera;
";

/// Group-0 binding holding the per-frame [`CameraUniform`].
pub struct CameraBinding {
    layout: wgpu::BindGroupLayout,
    block: UniformBlock<CameraUniform>,
    group: wgpu::BindGroup,
}

impl CameraBinding {
    pub fn new(device: &wgpu::Device) -> RenderResult<Self> {
        let entry = uniform_entry::<CameraUniform>(0, wgpu::ShaderStages::VERTEX_FRAGMENT);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera_layout"),
            entries: &[entry],
        });
        let initial = CameraUniform::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO);
        let block = UniformBlock::new(device, &initial);
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bg"),
            layout: &layout,
            entries: &[block.entry(&entry)?],
        });
        Ok(Self { layout, block, group })
    }

    pub fn write(&self, queue: &wgpu::Queue, uniform: &CameraUniform) {
        self.block.write(queue, uniform);
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout { &self.layout }
    pub fn group(&self) -> &wgpu::BindGroup { &self.group }
}

/// First-person fly camera: WASD to move, right mouse drag to look, wheel to zoom.
#[derive(Clone, Debug)]
pub struct FlyCamera {
    pub position: Vec3,
    /// Degrees; -90 looks down -Z.
    pub yaw: f32,
    /// Degrees, clamped to ±[`FlyCamera::PITCH_LIMIT`].
    pub pitch: f32,
    /// Vertical field of view in degrees, clamped to [`FlyCamera::FOV_RANGE`].
    pub fov: f32,
    /// World units per second.
    pub speed: f32,
    /// Degrees per pixel of mouse travel.
    pub sensitivity: f32,
    pub near: f32,
    pub far: f32,
}

impl FlyCamera {
    pub const PITCH_LIMIT: f32 = 89.0;
    pub const FOV_RANGE: (f32, f32) = (1.0, 45.0);

    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: -90.0,
            pitch: 0.0,
            fov: 45.0,
            speed: 12.5,
            sensitivity: 0.1,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Point the camera at `target`.
    pub fn looking_at(mut self, target: Vec3) -> Self {
        let dir = (target - self.position).normalize_or_zero();
        if dir != Vec3::ZERO {
            self.pitch = dir.y.asin().to_degrees().clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
            self.yaw = dir.z.atan2(dir.x).to_degrees();
        }
        self
    }

    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    /// Apply one frame of keyboard and mouse input.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        let step = self.speed * dt;
        let front = self.front();
        let right = self.right();
        if input.is_key_held(KeyCode::KeyW) { self.position += front * step; }
        if input.is_key_held(KeyCode::KeyS) { self.position -= front * step; }
        if input.is_key_held(KeyCode::KeyA) { self.position -= right * step; }
        if input.is_key_held(KeyCode::KeyD) { self.position += right * step; }
        if input.is_key_held(KeyCode::Space) { self.position += Vec3::Y * step; }
        if input.is_key_held(KeyCode::ShiftLeft) { self.position -= Vec3::Y * step; }

        if input.is_mouse_held(MouseButton::Right) {
            let [dx, dy] = input.mouse_delta;
            self.look(dx, dy);
        }
        if input.mouse_wheel != 0.0 {
            self.zoom(input.mouse_wheel);
        }
    }

    /// Rotate by a mouse delta in pixels (y grows downward).
    pub fn look(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    pub fn zoom(&mut self, wheel: f32) {
        self.fov = (self.fov - wheel).clamp(Self::FOV_RANGE.0, Self::FOV_RANGE.1);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect.max(1e-4), self.near, self.far)
    }

    pub fn uniform(&self, aspect: f32) -> CameraUniform {
        CameraUniform::new(self.view(), self.projection(aspect), self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_negative_z() {
        let cam = FlyCamera::new(Vec3::ZERO);
        assert!((cam.front() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = FlyCamera::new(Vec3::ZERO);
        cam.look(0.0, -10_000.0);
        assert_eq!(cam.pitch, FlyCamera::PITCH_LIMIT);
        cam.look(0.0, 10_000.0);
        assert_eq!(cam.pitch, -FlyCamera::PITCH_LIMIT);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = FlyCamera::new(Vec3::ZERO);
        cam.zoom(100.0);
        assert_eq!(cam.fov, 1.0);
        cam.zoom(-100.0);
        assert_eq!(cam.fov, 45.0);
    }

    #[test]
    fn looking_at_points_front_at_target() {
        let cam = FlyCamera::new(Vec3::new(0.0, 2.0, 5.0)).looking_at(Vec3::ZERO);
        let expected = (Vec3::ZERO - cam.position).normalize();
        assert!((cam.front() - expected).length() < 1e-4);
    }

    #[test]
    fn uniform_inverse_view_round_trips() {
        let cam = FlyCamera::new(Vec3::new(1.0, 2.0, 3.0));
        let u = cam.uniform(16.0 / 9.0);
        let view = Mat4::from_cols_array_2d(&u.view);
        let inv = Mat4::from_cols_array_2d(&u.inv_view);
        assert!((view * inv).abs_diff_eq(Mat4::IDENTITY, 1e-4));
        assert_eq!(u.position, [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn wasd_moves_along_front() {
        let mut cam = FlyCamera::new(Vec3::ZERO);
        let mut input = InputState::new();
        input.keys_held.insert(KeyCode::KeyW);
        cam.update(&input, 0.1);
        assert!((cam.position - Vec3::new(0.0, 0.0, -1.25)).length() < 1e-4);
    }
}
