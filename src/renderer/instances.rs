use std::marker::PhantomData;

/// Per-instance vertex buffer that grows to the next power of two (min 64)
/// and is rewritten every frame.
pub struct InstanceBuffer<T: bytemuck::Pod> {
    label: &'static str,
    buffer: wgpu::Buffer,
    capacity: u32,
    len: u32,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> InstanceBuffer<T> {
    pub const MIN_CAPACITY: u32 = 64;

    pub fn new(device: &wgpu::Device, label: &'static str) -> Self {
        let capacity = Self::MIN_CAPACITY;
        Self { label, buffer: create(device, label, capacity, Self::stride()), capacity, len: 0, _marker: PhantomData }
    }

    fn stride() -> u64 {
        std::mem::size_of::<T>() as u64
    }

    /// Upload `items`, reallocating first when they no longer fit.
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, items: &[T]) {
        let count = items.len() as u32;
        if count > self.capacity {
            self.capacity = grown_capacity(count);
            log::debug!("{}: grow instance buffer to {}", self.label, self.capacity);
            self.buffer = create(device, self.label, self.capacity, Self::stride());
        }
        if !items.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(items));
        }
        self.len = count;
    }

    pub fn len(&self) -> u32 { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }
    pub fn capacity(&self) -> u32 { self.capacity }

    pub fn slice(&self) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(..self.len.max(1) as u64 * Self::stride())
    }
}

/// Capacity for `count` instances.
pub fn grown_capacity(count: u32) -> u32 {
    count.next_power_of_two().max(InstanceBuffer::<[f32; 4]>::MIN_CAPACITY)
}

fn create(device: &wgpu::Device, label: &str, capacity: u32, stride: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: capacity as u64 * stride,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_up_with_a_floor() {
        assert_eq!(grown_capacity(1), 64);
        assert_eq!(grown_capacity(64), 64);
        assert_eq!(grown_capacity(65), 128);
        assert_eq!(grown_capacity(1000), 1024);
    }
}
