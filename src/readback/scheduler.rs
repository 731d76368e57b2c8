//! Delayed, non-blocking GPU -> CPU readback

use super::request::{ReadbackQueue, ReadbackRequest};
use super::staging_ring::StagingRing;
use crate::error::{buffer_mapping_error, CullError, CullResult};
use crate::gpu::GpuContext;

/// Result of a consumed request. `data` holds the mapping error when the
/// staging buffer could not be read.
pub struct CompletedReadback<T> {
    pub payload: T,
    pub data: CullResult<Vec<u32>>,
}

/// Copies a GPU buffer into a staging ring each tick and hands the contents
/// back a configurable number of ticks later, without ever waiting on the GPU.
///
/// Per frame: `schedule` (records the copy), `after_submit` (issues the map
/// requests once the copy is submitted), `advance` (polls and consumes).
pub struct ReadbackScheduler<T> {
    name: &'static str,
    ring: StagingRing,
    queue: ReadbackQueue<T>,
    skipped: u64,
}

impl<T> ReadbackScheduler<T> {
    pub fn new(name: &'static str, ring_size: usize) -> Self {
        Self {
            name,
            ring: StagingRing::new(name, ring_size),
            queue: ReadbackQueue::new(),
            skipped: 0,
        }
    }

    /// Record a copy of the first `bytes` of `source`. Returns false (and
    /// records nothing) when every staging buffer is still in flight.
    pub fn schedule(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Buffer,
        bytes: u64,
        delay: u32,
        payload: T,
    ) -> CullResult<bool> {
        if bytes == 0 {
            return Ok(false);
        }

        let Some(index) = self.ring.acquire(gpu, bytes)? else {
            self.skipped += 1;
            log::debug!(
                "[{}] All {} staging buffers in flight, skipping readback",
                self.name,
                self.ring.capacity()
            );
            return Ok(false);
        };

        if let Some(staging) = self.ring.buffer(index) {
            encoder.copy_buffer_to_buffer(source, 0, staging, 0, bytes);
        }
        self.queue.push(ReadbackRequest::new(delay, index, bytes, payload));
        Ok(true)
    }

    /// Start mapping every request recorded since the last call. Must run
    /// after the encoder holding the copies has been submitted.
    pub fn after_submit(&mut self) {
        let ring = &self.ring;
        for request in self.queue.untransferred_mut() {
            request.transferred = true;

            let Some(staging) = ring.buffer(request.staging) else {
                request.signal.complete(false);
                continue;
            };

            let signal = request.signal.clone();
            staging
                .slice(..request.bytes)
                .map_async(wgpu::MapMode::Read, move |result| signal.complete(result.is_ok()));
        }
    }

    /// Poll without blocking, count down delays and consume ready requests
    /// in submission order
    pub fn advance(&mut self, gpu: &GpuContext) -> Vec<CompletedReadback<T>> {
        let _ = gpu.device().poll(wgpu::Maintain::Poll);
        self.queue.tick();

        let mut completed = Vec::new();
        while let Some(request) = self.queue.pop_ready() {
            completed.push(self.consume(request));
        }
        completed
    }

    fn consume(&mut self, request: ReadbackRequest<T>) -> CompletedReadback<T> {
        let data = match self.ring.buffer(request.staging) {
            Some(staging) if !request.signal.has_failed() => {
                let slice = staging.slice(..request.bytes);
                let words = bytemuck::cast_slice::<u8, u32>(&slice.get_mapped_range()).to_vec();
                staging.unmap();
                Ok(words)
            }
            _ => Err(self.mapping_failed(request.staging)),
        };

        self.ring.release(request.staging);
        CompletedReadback {
            payload: request.payload,
            data,
        }
    }

    fn mapping_failed(&self, staging: usize) -> CullError {
        buffer_mapping_error(&format!("{} staging {}", self.name, staging), "map_async reported failure")
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Readbacks dropped because the ring was exhausted
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Drop all pending requests and staging buffers
    pub fn clear(&mut self) {
        self.queue.drain().for_each(drop);
        self.ring.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_map_reports_staging_buffer() {
        let scheduler = ReadbackScheduler::<()>::new("RegionCounters", 3);
        let err = scheduler.mapping_failed(2);

        assert!(matches!(err, CullError::BufferMapping { .. }));
        assert_eq!(
            err.to_string(),
            "Failed to map GPU buffer RegionCounters staging 2: map_async reported failure"
        );
    }

    #[test]
    fn test_new_scheduler_is_idle() {
        let scheduler = ReadbackScheduler::<u32>::new("VisibilityReadback", 4);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.skipped(), 0);
    }
}
