//! Geometry pass: rasterize every draw item once into view-space position,
//! normal and albedo+specular targets sharing one depth/stencil store.

use std::collections::HashMap;
use std::ops::Range;

use glam::{Mat3, Mat4};

use crate::assets::{self, Texture};
use crate::camera::CAMERA_WGSL;
use crate::config::TargetFormats;
use crate::error::RenderResult;
use crate::geometry::{MeshKind, MeshLibrary, Vertex};
use crate::renderer::framebuffer::{AttachmentInfo, Framebuffer, FramebufferLayout, Load};
use crate::renderer::instances::InstanceBuffer;
use crate::renderer::quad::{create_shader, sampler_entry, texture_entry};
use crate::renderer::target::{Filter, PixelFormat, RenderTarget, TargetDesc};
use crate::scene::DrawItem;

// ── Per-instance data ─────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    /// Inverse-transpose of the model's upper 3×3, one column per row.
    pub normal: [[f32; 4]; 3],
    /// rgb albedo; a unused.
    pub albedo: [f32; 4],
    /// metallic, roughness, specular, unused.
    pub material: [f32; 4],
}

impl InstanceRaw {
    const ATTRIBS: [wgpu::VertexAttribute; 9] = wgpu::vertex_attr_array![
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
        10 => Float32x4,
        11 => Float32x4,
        12 => Float32x4,
        13 => Float32x4,
    ];

    pub fn from_item(item: &DrawItem) -> Self {
        let m = &item.material;
        Self {
            model: item.transform.to_cols_array_2d(),
            normal: normal_matrix(item.transform),
            albedo: m.albedo.extend(1.0).to_array(),
            material: [m.metallic, m.roughness, m.specular, 0.0],
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

fn normal_matrix(model: Mat4) -> [[f32; 4]; 3] {
    let upper = Mat3::from_mat4(model);
    let n = if upper.determinant().abs() > f32::EPSILON { upper.inverse().transpose() } else { upper };
    [n.x_axis.extend(0.0).to_array(), n.y_axis.extend(0.0).to_array(), n.z_axis.extend(0.0).to_array()]
}

// ── Batching ──────────────────────────────────────────────────────────────────

/// Mesh and material textures shared by a run of instances.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    pub mesh: MeshKind,
    pub texture: Option<usize>,
    pub normal_map: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub key: BatchKey,
    pub instances: Range<u32>,
}

/// Sort items into contiguous runs so each run is one instanced draw.
pub fn batch_items(items: &[DrawItem]) -> (Vec<InstanceRaw>, Vec<Batch>) {
    let key_of = |item: &DrawItem| BatchKey {
        mesh: item.mesh,
        texture: item.material.texture,
        normal_map: item.material.normal_map,
    };
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by_key(|&i| key_of(&items[i]));

    let mut instances = Vec::with_capacity(items.len());
    let mut batches: Vec<Batch> = Vec::new();
    for i in order {
        let key = key_of(&items[i]);
        let index = instances.len() as u32;
        instances.push(InstanceRaw::from_item(&items[i]));
        match batches.last_mut() {
            Some(batch) if batch.key == key => batch.instances.end = index + 1,
            _ => batches.push(Batch { key, instances: index..index + 1 }),
        }
    }
    (instances, batches)
}

// ── Material textures ─────────────────────────────────────────────────────────

/// Loaded material textures plus one bind group per (texture, normal map) pair in use.
pub struct MaterialSet {
    layout: wgpu::BindGroupLayout,
    textures: Vec<Texture>,
    white: Texture,
    flat_normal: Texture,
    groups: HashMap<(Option<usize>, Option<usize>), wgpu::BindGroup>,
}

impl MaterialSet {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, textures: Vec<Texture>) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2, true),
                texture_entry(1, wgpu::TextureViewDimension::D2, true),
                sampler_entry(2, wgpu::SamplerBindingType::Filtering),
            ],
        });
        Self {
            layout,
            textures,
            white: assets::default_white_texture(device, queue),
            flat_normal: assets::default_normal_texture(device, queue),
            groups: HashMap::new(),
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout { &self.layout }
    pub fn texture_count(&self) -> usize { self.textures.len() }

    fn resolve(&self, index: Option<usize>) -> Option<&Texture> {
        let index = index?;
        let texture = self.textures.get(index);
        if texture.is_none() {
            log::warn!("material texture {} out of range ({} loaded), using default", index, self.textures.len());
        }
        texture
    }

    /// Create the bind group for `key` unless it already exists.
    pub fn prepare(&mut self, device: &wgpu::Device, key: (Option<usize>, Option<usize>)) {
        if self.groups.contains_key(&key) {
            return;
        }
        let diffuse = self.resolve(key.0).unwrap_or(&self.white);
        let normal = self.resolve(key.1).unwrap_or(&self.flat_normal);
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material_bg"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&diffuse.view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&normal.view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&diffuse.sampler) },
            ],
        });
        self.groups.insert(key, group);
    }

    pub fn group(&self, key: (Option<usize>, Option<usize>)) -> Option<&wgpu::BindGroup> {
        self.groups.get(&key)
    }
}

// ── Shader ────────────────────────────────────────────────────────────────────

const GBUFFER_WGSL: &str = "
@group(1) @binding(0) var diffuse_map: texture_2d<f32>;
@group(1) @binding(1) var normal_map: texture_2d<f32>;
@group(1) @binding(2) var material_sampler: sampler;

struct VertexIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec3<f32>,
    @location(4) bitangent: vec3<f32>,
}

struct InstanceIn {
    @location(5) model_0: vec4<f32>,
    @location(6) model_1: vec4<f32>,
    @location(7) model_2: vec4<f32>,
    @location(8) model_3: vec4<f32>,
    @location(9) normal_0: vec4<f32>,
    @location(10) normal_1: vec4<f32>,
    @location(11) normal_2: vec4<f32>,
    @location(12) albedo: vec4<f32>,
    @location(13) material: vec4<f32>,
}

struct GeometryOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) view_pos: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) tangent: vec3<f32>,
    @location(3) bitangent: vec3<f32>,
    @location(4) normal: vec3<f32>,
    @location(5) albedo: vec4<f32>,
    @location(6) material: vec4<f32>,
}

@vertex
fn vs_main(v: VertexIn, inst: InstanceIn) -> GeometryOut {
    let model = mat4x4<f32>(inst.model_0, inst.model_1, inst.model_2, inst.model_3);
    let normal_mat = mat3x3<f32>(inst.normal_0.xyz, inst.normal_1.xyz, inst.normal_2.xyz);
    let model3 = mat3x3<f32>(inst.model_0.xyz, inst.model_1.xyz, inst.model_2.xyz);
    let to_view = mat3x3<f32>(camera.view[0].xyz, camera.view[1].xyz, camera.view[2].xyz);

    let view_pos = camera.view * model * vec4<f32>(v.position, 1.0);
    var out: GeometryOut;
    out.clip = camera.projection * view_pos;
    out.view_pos = view_pos.xyz;
    out.uv = v.uv;
    out.normal = normalize(to_view * normal_mat * v.normal);
    out.tangent = normalize(to_view * model3 * v.tangent);
    out.bitangent = normalize(to_view * model3 * v.bitangent);
    out.albedo = inst.albedo;
    out.material = inst.material;
    return out;
}

struct GeometryTargets {
    @location(0) position: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) albedo_spec: vec4<f32>,
}

@fragment
fn fs_main(in: GeometryOut) -> GeometryTargets {
    let texel = textureSample(diffuse_map, material_sampler, in.uv);
    let mapped = textureSample(normal_map, material_sampler, in.uv).xyz * 2.0 - 1.0;
    let tbn = mat3x3<f32>(normalize(in.tangent), normalize(in.bitangent), normalize(in.normal));
    let n = normalize(tbn * mapped);

    var out: GeometryTargets;
    out.position = vec4<f32>(in.view_pos, in.material.x);
    out.normal = vec4<f32>(n, in.material.y);
    out.albedo_spec = vec4<f32>(texel.rgb * in.albedo.rgb, in.material.z);
    return out;
}
";

pub(crate) fn gbuffer_source() -> String {
    format!("{CAMERA_WGSL}{GBUFFER_WGSL}")
}

// ── Targets ───────────────────────────────────────────────────────────────────

/// Attachment layout of the G-Buffer at `width × height`.
pub fn gbuffer_layout(formats: &TargetFormats, width: u32, height: u32) -> FramebufferLayout {
    FramebufferLayout::new("gbuffer")
        .with_color(0, AttachmentInfo::new("g_position", width, height, formats.position))
        .with_color(1, AttachmentInfo::new("g_normal", width, height, formats.normal))
        .with_color(2, AttachmentInfo::new("g_albedo_spec", width, height, formats.albedo_spec))
        .with_depth(AttachmentInfo::new("g_depth", width, height, formats.depth))
}

pub struct GBufferTargets {
    pub position: RenderTarget,
    pub normal: RenderTarget,
    pub albedo_spec: RenderTarget,
    pub depth: RenderTarget,
}

impl GBufferTargets {
    pub fn new(device: &wgpu::Device, formats: &TargetFormats, width: u32, height: u32) -> RenderResult<Self> {
        let (w, h) = (width.max(1), height.max(1));
        // Positions are read texel-exact; no filtering between fragments.
        Ok(Self {
            position: RenderTarget::new(
                device,
                TargetDesc::new("g_position", w, h, formats.position).with_filter(Filter::Nearest),
            )?,
            normal: RenderTarget::new(device, TargetDesc::new("g_normal", w, h, formats.normal).with_filter(Filter::Nearest))?,
            albedo_spec: RenderTarget::new(
                device,
                TargetDesc::new("g_albedo_spec", w, h, formats.albedo_spec).with_filter(Filter::Nearest),
            )?,
            depth: RenderTarget::new(device, TargetDesc::new("g_depth", w, h, formats.depth))?,
        })
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> RenderResult<()> {
        self.position.recreate(device, width, height)?;
        self.normal.recreate(device, width, height)?;
        self.albedo_spec.recreate(device, width, height)?;
        self.depth.recreate(device, width, height)
    }

    pub fn size(&self) -> (u32, u32) {
        self.position.size()
    }

    pub fn depth_format(&self) -> PixelFormat {
        self.depth.format()
    }
}

// ── Pass ──────────────────────────────────────────────────────────────────────

pub struct GeometryPass {
    pub targets: GBufferTargets,
    framebuffer: Framebuffer,
    pipeline: wgpu::RenderPipeline,
    materials: MaterialSet,
    instances: InstanceBuffer<InstanceRaw>,
    batches: Vec<Batch>,
}

impl GeometryPass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera_layout: &wgpu::BindGroupLayout,
        formats: &TargetFormats,
        size: (u32, u32),
        textures: Vec<Texture>,
    ) -> RenderResult<Self> {
        let targets = GBufferTargets::new(device, formats, size.0, size.1)?;
        let framebuffer = Self::framebuffer(&targets)?;
        let materials = MaterialSet::new(device, queue, textures);

        let shader = create_shader(device, "gbuffer", &gbuffer_source())?;
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gbuffer_layout"),
            bind_group_layouts: &[camera_layout, materials.layout()],
            ..Default::default()
        });
        let color_targets = framebuffer.layout().color_targets(None);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("gbuffer"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout(), InstanceRaw::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &color_targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: formats.depth.to_wgpu(),
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::info!("geometry pass: {}x{} G-Buffer, {} material textures", size.0, size.1, materials.texture_count());
        Ok(Self {
            targets,
            framebuffer,
            pipeline,
            materials,
            instances: InstanceBuffer::new(device, "gbuffer_instances"),
            batches: Vec::new(),
        })
    }

    fn framebuffer(targets: &GBufferTargets) -> RenderResult<Framebuffer> {
        Framebuffer::with_targets(
            "gbuffer",
            &[&targets.position, &targets.normal, &targets.albedo_spec],
            Some(&targets.depth),
        )
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> RenderResult<()> {
        self.targets.resize(device, width, height)?;
        self.framebuffer = Self::framebuffer(&self.targets)?;
        Ok(())
    }

    /// Upload this frame's instances and make sure every material group exists.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, items: &[DrawItem]) {
        let (instances, batches) = batch_items(items);
        for batch in &batches {
            self.materials.prepare(device, (batch.key.texture, batch.key.normal_map));
        }
        self.instances.write(device, queue, &instances);
        self.batches = batches;
    }

    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        camera: &wgpu::BindGroup,
        meshes: &MeshLibrary,
    ) -> RenderResult<()> {
        let mut pass = self.framebuffer.bind(encoder, Load::Clear)?;
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        for batch in &self.batches {
            let Some(group) = self.materials.group((batch.key.texture, batch.key.normal_map)) else {
                continue;
            };
            pass.set_bind_group(1, group, &[]);
            pass.set_vertex_buffer(1, self.instances.slice());
            meshes.get(batch.key.mesh).draw_instanced(&mut pass, batch.instances.clone());
        }
        Framebuffer::unbind(pass);
        Ok(())
    }

    /// Prepared instance data, shared with the shadow passes.
    pub fn instances(&self) -> (&InstanceBuffer<InstanceRaw>, &[Batch]) {
        (&self.instances, &self.batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Material;
    use glam::Vec3;

    #[test]
    fn gbuffer_layout_is_complete_and_same_size() {
        let layout = gbuffer_layout(&TargetFormats::default(), 800, 600);
        assert_eq!(layout.check_complete().unwrap(), (800, 600));
        assert_eq!(layout.colors.len(), 3);
        assert_eq!(layout.depth_format(), Some(wgpu::TextureFormat::Depth24PlusStencil8));
    }

    #[test]
    fn mismatched_depth_is_incomplete() {
        let layout = FramebufferLayout::new("gbuffer")
            .with_color(0, AttachmentInfo::new("g_position", 800, 600, PixelFormat::Rgba16Float))
            .with_depth(AttachmentInfo::new("g_depth", 1024, 768, PixelFormat::Depth24PlusStencil8));
        assert!(layout.check_complete().is_err());
    }

    #[test]
    fn batches_are_contiguous_per_key() {
        let tex = Material::default().with_texture(0);
        let items = vec![
            DrawItem::new(MeshKind::Sphere, Mat4::IDENTITY, Material::default()),
            DrawItem::new(MeshKind::Cube, Mat4::IDENTITY, tex),
            DrawItem::new(MeshKind::Sphere, Mat4::IDENTITY, Material::default()),
            DrawItem::new(MeshKind::Cube, Mat4::IDENTITY, Material::default()),
        ];
        let (instances, batches) = batch_items(&items);
        assert_eq!(instances.len(), 4);
        assert_eq!(batches.len(), 3);
        let covered: u32 = batches.iter().map(|b| b.instances.end - b.instances.start).sum();
        assert_eq!(covered, 4);
        for pair in batches.windows(2) {
            assert_eq!(pair[0].instances.end, pair[1].instances.start);
            assert_ne!(pair[0].key, pair[1].key);
        }
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = normal_matrix(model);
        assert!((n[0][0] - 0.5).abs() < 1e-6);
        assert!((n[1][1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn instance_layout_fits_vertex_attribute_limit() {
        assert_eq!(std::mem::size_of::<InstanceRaw>(), 4 * 4 * 9);
        assert!(InstanceRaw::ATTRIBS.len() + 5 <= 16);
    }
}
