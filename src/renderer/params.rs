use std::marker::PhantomData;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use crate::error::{RenderError, RenderResult};

/// Uniform parameter block of one shading program.
///
/// Implementors are `#[repr(C)]` Pod structs whose layout mirrors the WGSL
/// struct field for field, padded to 16 bytes.
pub trait ProgramParams: bytemuck::Pod {
    /// Name used in labels and error messages.
    const LABEL: &'static str;

    fn size() -> u64 {
        std::mem::size_of::<Self>() as u64
    }
}

/// Layout entry for a `var<uniform>` of type `T`.
pub fn uniform_entry<T: ProgramParams>(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(T::size()),
        },
        count: None,
    }
}

/// Check that `entry` is a uniform buffer slot sized exactly for `T`.
pub fn check_layout<T: ProgramParams>(entry: &wgpu::BindGroupLayoutEntry) -> RenderResult<()> {
    let size = T::size();
    if size == 0 || size % 16 != 0 {
        return Err(RenderError::param_layout(
            T::LABEL,
            format!("size {} is not a non-zero multiple of 16", size),
        ));
    }
    match entry.ty {
        wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            min_binding_size,
            ..
        } => match min_binding_size {
            Some(min) if min.get() == size => Ok(()),
            Some(min) => Err(RenderError::param_layout(
                T::LABEL,
                format!("binding {} expects {} bytes, block is {}", entry.binding, min.get(), size),
            )),
            None => Err(RenderError::param_layout(
                T::LABEL,
                format!("binding {} has no declared size", entry.binding),
            )),
        },
        _ => Err(RenderError::param_layout(
            T::LABEL,
            format!("binding {} is not a uniform buffer", entry.binding),
        )),
    }
}

/// GPU buffer holding one `T`.
pub struct UniformBlock<T: ProgramParams> {
    buffer: wgpu::Buffer,
    _params: PhantomData<T>,
}

impl<T: ProgramParams> UniformBlock<T> {
    pub fn new(device: &wgpu::Device, initial: &T) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(T::LABEL),
            contents: bytemuck::bytes_of(initial),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        Self { buffer, _params: PhantomData }
    }

    pub fn write(&self, queue: &wgpu::Queue, params: &T) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(params));
    }

    /// Bind-group entry for this block, validated against the layout slot it fills.
    pub fn entry(&self, layout: &wgpu::BindGroupLayoutEntry) -> RenderResult<wgpu::BindGroupEntry<'_>> {
        check_layout::<T>(layout)?;
        Ok(wgpu::BindGroupEntry {
            binding: layout.binding,
            resource: self.buffer.as_entire_binding(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Exposure {
        exposure: f32,
        gamma: f32,
        _pad: [f32; 2],
    }

    impl ProgramParams for Exposure {
        const LABEL: &'static str = "exposure";
    }

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Unpadded {
        value: f32,
    }

    impl ProgramParams for Unpadded {
        const LABEL: &'static str = "unpadded";
    }

    #[test]
    fn matching_entry_validates() {
        let entry = uniform_entry::<Exposure>(0, wgpu::ShaderStages::FRAGMENT);
        assert!(check_layout::<Exposure>(&entry).is_ok());
    }

    #[test]
    fn size_mismatch_is_reported() {
        let mut entry = uniform_entry::<Exposure>(2, wgpu::ShaderStages::FRAGMENT);
        if let wgpu::BindingType::Buffer { ref mut min_binding_size, .. } = entry.ty {
            *min_binding_size = NonZeroU64::new(32);
        }
        let err = check_layout::<Exposure>(&entry).unwrap_err();
        assert!(err.to_string().contains("expects 32 bytes"), "{err}");
    }

    #[test]
    fn texture_slot_is_not_a_uniform() {
        let entry = wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        assert!(check_layout::<Exposure>(&entry).is_err());
    }

    #[test]
    fn unpadded_block_is_rejected() {
        let entry = uniform_entry::<Unpadded>(0, wgpu::ShaderStages::FRAGMENT);
        assert!(matches!(check_layout::<Unpadded>(&entry), Err(RenderError::ParamLayout { .. })));
    }
}
