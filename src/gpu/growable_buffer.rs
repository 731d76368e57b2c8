//! Storage buffers that grow (or shrink) with their contents copied forward

use crate::error::CullResult;
use crate::gpu::context::GpuContext;
use bytemuck::Pod;

/// A GPU buffer of fixed-size elements whose capacity can change between frames.
///
/// Resizing records the copy of the surviving prefix in its own submission so
/// that `queue.write_buffer` calls made afterwards land on top of the copied
/// contents rather than underneath them.
pub struct GrowableBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    element_size: u64,
    capacity: u64,
    buffer: wgpu::Buffer,
    generation: u64,
}

impl GrowableBuffer {
    pub fn new(
        gpu: &GpuContext,
        label: &'static str,
        element_size: u64,
        capacity: u64,
        usage: wgpu::BufferUsages,
    ) -> CullResult<Self> {
        let usage = usage | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;
        let capacity = capacity.max(1);
        let buffer = gpu.create_buffer(label, element_size * capacity, usage)?;

        Ok(Self {
            label,
            usage,
            element_size,
            capacity,
            buffer,
            generation: 0,
        })
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Capacity in elements
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn byte_size(&self) -> u64 {
        self.capacity * self.element_size
    }

    /// Bumped on every reallocation; bind groups built against an older
    /// generation are stale
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reallocate to `new_capacity` elements, preserving the common prefix
    pub fn resize(&mut self, gpu: &GpuContext, new_capacity: u64) -> CullResult<()> {
        let new_capacity = new_capacity.max(1);
        if new_capacity == self.capacity {
            return Ok(());
        }

        let replacement = gpu.create_buffer(self.label, new_capacity * self.element_size, self.usage)?;

        let mut encoder = gpu.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Growable Buffer Copy Encoder"),
        });
        let preserved = self.capacity.min(new_capacity) * self.element_size;
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &replacement, 0, preserved);
        gpu.queue().submit(Some(encoder.finish()));

        log::info!(
            "[GrowableBuffer] {} resized {} -> {} elements ({} bytes preserved)",
            self.label,
            self.capacity,
            new_capacity,
            preserved
        );

        self.buffer = replacement;
        self.capacity = new_capacity;
        self.generation += 1;
        Ok(())
    }

    /// Write `data` starting at element `first`; out-of-range writes are clipped
    pub fn write<T: Pod>(&self, gpu: &GpuContext, first: u64, data: &[T]) {
        debug_assert_eq!(std::mem::size_of::<T>() as u64, self.element_size);
        if first >= self.capacity || data.is_empty() {
            return;
        }
        let count = (data.len() as u64).min(self.capacity - first) as usize;
        gpu.queue().write_buffer(
            &self.buffer,
            first * self.element_size,
            bytemuck::cast_slice(&data[..count]),
        );
    }
}
