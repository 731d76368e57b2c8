//! Fixed ring of MAP_READ staging buffers

use crate::error::CullResult;
use crate::gpu::GpuContext;

struct StagingSlot {
    buffer: Option<wgpu::Buffer>,
    size: u64,
    in_flight: bool,
}

/// Staging buffers handed out one per readback. Idle buffers are resized on
/// acquire; buffers in flight are never touched.
pub struct StagingRing {
    label: &'static str,
    slots: Vec<StagingSlot>,
    next: usize,
}

impl StagingRing {
    pub fn new(label: &'static str, size: usize) -> Self {
        let slots = (0..size.max(1))
            .map(|_| StagingSlot {
                buffer: None,
                size: 0,
                in_flight: false,
            })
            .collect();

        Self {
            label,
            slots,
            next: 0,
        }
    }

    /// Reserve an idle buffer of at least `bytes`; `None` when all are in flight
    pub fn acquire(&mut self, gpu: &GpuContext, bytes: u64) -> CullResult<Option<usize>> {
        let count = self.slots.len();
        let Some(index) = (0..count)
            .map(|offset| (self.next + offset) % count)
            .find(|index| !self.slots[*index].in_flight)
        else {
            return Ok(None);
        };

        let slot = &mut self.slots[index];
        if slot.buffer.is_none() || slot.size < bytes {
            let size = bytes.max(4).next_power_of_two();
            slot.buffer = Some(gpu.create_buffer(
                self.label,
                size,
                wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            )?);
            slot.size = size;
        }

        slot.in_flight = true;
        self.next = (index + 1) % count;
        Ok(Some(index))
    }

    pub fn buffer(&self, index: usize) -> Option<&wgpu::Buffer> {
        self.slots.get(index).and_then(|slot| slot.buffer.as_ref())
    }

    pub fn release(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.in_flight = false;
        }
    }

    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_flight).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drop every staging buffer
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.buffer = None;
            slot.size = 0;
            slot.in_flight = false;
        }
        self.next = 0;
    }
}
