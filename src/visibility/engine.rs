//! GPU visibility test for dynamic objects with staggered readback

use crate::capacity::visibility_capacity;
use crate::config::CullingConfig;
use crate::constants::visibility::{MIN_VISIBILITY_CAPACITY, VISIBILITY_WORKGROUP};
use crate::error::CullResult;
use crate::gpu::shader_includes::VISIBILITY_TEST_WGSL;
use crate::gpu::{compile_shader, dispatch_grid, GpuAabb, GpuContext, GpuCullView, GrowableBuffer, VisibilityParams};
use crate::hiz::DepthPyramid;
use crate::math::{Bounds, Cullable};
use crate::readback::ReadbackScheduler;
use crate::registry::{IdleThresholds, IndexedObjectRegistry, ObjectHandle, ObjectKind};
use rustc_hash::{FxHashMap, FxHashSet};

/// Slot mapping captured when a dispatch was recorded
type SlotSnapshot = Vec<Option<ObjectHandle>>;

/// Counters for the most recent tick and readback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityStats {
    /// Slots submitted with bounds and tested in the last dispatch
    pub tested: u32,
    /// Visible slots in the last consumed readback
    pub visible: u32,
    /// Live registry slots
    pub tracked: u32,
    /// Current slot capacity of the GPU buffers
    pub capacity: u32,
    pub pending_readbacks: u32,
    pub skipped_readbacks: u64,
}

#[derive(Debug, Clone, Copy)]
struct UnboundedEntry {
    kind: ObjectKind,
    last_touch: u64,
}

pub struct VisibilityMaskEngine {
    gpu: GpuContext,
    enabled: bool,
    excluded_types: FxHashSet<String>,
    thresholds: IdleThresholds,
    config: CullingConfig,
    fps: f32,

    registry: IndexedObjectRegistry<ObjectHandle>,
    /// CPU mirror of the bounds buffer, indexed by slot
    bounds: Vec<GpuAabb>,
    /// Always-visible objects (no extent or excluded type)
    unbounded: FxHashMap<ObjectHandle, UnboundedEntry>,
    /// Committed results of the last consumed readback
    results: FxHashMap<ObjectHandle, bool>,

    capacity: u32,
    bounds_buffer: GrowableBuffer,
    results_buffer: GrowableBuffer,
    view_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,

    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
    bind_group: Option<(wgpu::BindGroup, (u64, u64))>,

    readback: ReadbackScheduler<SlotSnapshot>,
    stats: VisibilityStats,
}

impl VisibilityMaskEngine {
    pub fn new(gpu: &GpuContext, config: &CullingConfig, sample_layout: &wgpu::BindGroupLayout) -> CullResult<Self> {
        let device = gpu.device();

        let layout = crate::create_bind_group_layout!(
            device,
            "Visibility Test Layout",
            0 => buffer(uniform),
            1 => buffer(storage_read),
            2 => buffer(storage),
            3 => buffer(uniform),
        );
        let shader = compile_shader(gpu, "visibility_test.wgsl", VISIBILITY_TEST_WGSL)?;
        let pipeline = gpu.create_compute_pipeline("Visibility Test Pipeline", &shader, &[&layout, sample_layout])?;

        let capacity = MIN_VISIBILITY_CAPACITY;
        let bounds_buffer = GrowableBuffer::new(
            gpu,
            "Visibility Bounds Buffer",
            std::mem::size_of::<GpuAabb>() as u64,
            capacity as u64,
            wgpu::BufferUsages::STORAGE,
        )?;
        let results_buffer = GrowableBuffer::new(
            gpu,
            "Visibility Result Buffer",
            std::mem::size_of::<u32>() as u64,
            capacity as u64,
            wgpu::BufferUsages::STORAGE,
        )?;
        let view_buffer = gpu.create_buffer(
            "Visibility Cull View",
            std::mem::size_of::<GpuCullView>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;
        let params_buffer = gpu.create_buffer(
            "Visibility Params",
            std::mem::size_of::<VisibilityParams>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;

        let thresholds = IdleThresholds::from_config(config);
        Ok(Self {
            gpu: gpu.clone(),
            enabled: config.entity_culling_active(),
            excluded_types: config.excluded_types.iter().cloned().collect(),
            thresholds,
            config: config.clone(),
            fps: 0.0,
            registry: IndexedObjectRegistry::new(thresholds),
            bounds: Vec::new(),
            unbounded: FxHashMap::default(),
            results: FxHashMap::default(),
            capacity,
            bounds_buffer,
            results_buffer,
            view_buffer,
            params_buffer,
            layout,
            pipeline,
            bind_group: None,
            readback: ReadbackScheduler::new("VisibilityReadback", config.readback_ring_size),
            stats: VisibilityStats::default(),
        })
    }

    /// Report an object for this tick's test
    pub fn submit(&mut self, handle: ObjectHandle, kind: ObjectKind, bounds: Bounds) {
        if !self.enabled {
            return;
        }

        match bounds.sanitized() {
            Bounds::Unbounded => self.mark_unbounded(handle, kind),
            Bounds::Bounded(aabb) => {
                self.unbounded.remove(&handle);
                let slot = self.registry.add(handle, kind) as usize;
                if slot >= self.bounds.len() {
                    self.bounds.resize(slot + 1, GpuAabb::INACTIVE);
                }
                self.bounds[slot] = GpuAabb::active(&aabb);
            }
        }
    }

    /// Submit through the `Cullable` capability; excluded types are never culled
    pub fn submit_object<C: Cullable + ?Sized>(&mut self, handle: ObjectHandle, kind: ObjectKind, object: &C) {
        if self.is_excluded(object.cull_type()) {
            if self.enabled {
                self.mark_unbounded(handle, kind);
            }
            return;
        }
        self.submit(handle, kind, object.cull_bounds());
    }

    pub fn is_excluded(&self, type_name: &str) -> bool {
        !type_name.is_empty() && self.excluded_types.contains(type_name)
    }

    fn mark_unbounded(&mut self, handle: ObjectHandle, kind: ObjectKind) {
        if let Some(slot) = self.registry.remove(handle) {
            self.release_slot(slot);
        }
        self.results.remove(&handle);
        self.unbounded.insert(
            handle,
            UnboundedEntry {
                kind,
                last_touch: self.registry.clock(),
            },
        );
    }

    fn release_slot(&mut self, slot: u32) {
        if let Some(entry) = self.bounds.get_mut(slot as usize) {
            *entry = GpuAabb::INACTIVE;
        }
        self.bounds.truncate(self.registry.high_water() as usize);
    }

    /// Fail-open visibility: only a committed "occluded" result hides an object
    pub fn is_visible(&self, handle: ObjectHandle) -> bool {
        if !self.enabled || self.unbounded.contains_key(&handle) {
            return true;
        }
        self.results.get(&handle).copied().unwrap_or(true)
    }

    /// Drop an object immediately instead of waiting for idle eviction
    pub fn forget(&mut self, handle: ObjectHandle) {
        if let Some(slot) = self.registry.remove(handle) {
            self.release_slot(slot);
        }
        self.results.remove(&handle);
        self.unbounded.remove(&handle);
    }

    /// Evict idle objects, resize buffers, upload bounds, dispatch the test
    /// and schedule the readback of its results
    pub fn tick(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &GpuCullView,
        pyramid: &DepthPyramid,
    ) -> CullResult<()> {
        if !self.enabled {
            return Ok(());
        }

        self.evict_idle();
        self.ensure_capacity()?;

        let slot_count = self.registry.high_water();
        self.stats.tracked = self.registry.len() as u32;
        self.stats.capacity = self.capacity;
        if slot_count == 0 {
            self.stats.tested = 0;
            return Ok(());
        }

        let queue = self.gpu.queue();
        queue.write_buffer(&self.view_buffer, 0, bytemuck::bytes_of(view));
        let params = VisibilityParams {
            slot_count,
            ..Default::default()
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
        self.bounds_buffer.write(&self.gpu, 0, &self.bounds[..slot_count as usize]);

        self.refresh_bind_group();
        if let Some((bind_group, _)) = &self.bind_group {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Visibility Test Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.set_bind_group(1, pyramid.sample_bind_group(), &[]);
            let (x, y) = dispatch_grid(slot_count.div_ceil(VISIBILITY_WORKGROUP));
            pass.dispatch_workgroups(x, y, 1);
        }

        let delay = self.readback_delay();
        self.readback.schedule(
            &self.gpu,
            encoder,
            self.results_buffer.buffer(),
            slot_count as u64 * std::mem::size_of::<u32>() as u64,
            delay,
            self.registry.snapshot(),
        )?;

        // Slots must be re-submitted to stay active next tick
        self.stats.tested = self.bounds.iter().filter(|b| b.is_active()).count() as u32;
        for entry in &mut self.bounds {
            entry.flags = 0;
        }

        log::trace!(
            "[VisibilityMaskEngine] Dispatched {} slots ({} active), delay {}",
            slot_count,
            self.stats.tested,
            delay
        );
        Ok(())
    }

    fn evict_idle(&mut self) {
        for (handle, slot) in self.registry.tick() {
            if let Some(entry) = self.bounds.get_mut(slot as usize) {
                *entry = GpuAabb::INACTIVE;
            }
            self.results.remove(&handle);
        }
        self.bounds.resize(self.registry.high_water() as usize, GpuAabb::INACTIVE);

        let clock = self.registry.clock();
        let thresholds = self.thresholds;
        self.unbounded.retain(|_, entry| match thresholds.for_kind(entry.kind) {
            Some(limit) => clock - entry.last_touch < u64::from(limit),
            None => true,
        });
    }

    fn ensure_capacity(&mut self) -> CullResult<()> {
        let Some(capacity) = visibility_capacity(self.capacity, self.registry.high_water()) else {
            return Ok(());
        };

        log::info!(
            "[VisibilityMaskEngine] Resizing slot buffers {} -> {} (high water {})",
            self.capacity,
            capacity,
            self.registry.high_water()
        );
        self.bounds_buffer.resize(&self.gpu, capacity as u64)?;
        self.results_buffer.resize(&self.gpu, capacity as u64)?;
        self.capacity = capacity;
        Ok(())
    }

    fn refresh_bind_group(&mut self) {
        let key = (self.bounds_buffer.generation(), self.results_buffer.generation());
        if matches!(&self.bind_group, Some((_, current)) if *current == key) {
            return;
        }

        let bind_group = crate::create_bind_group!(
            self.gpu.device(),
            "Visibility Test Bind Group",
            &self.layout,
            0 => self.view_buffer.as_entire_binding(),
            1 => self.bounds_buffer.buffer().as_entire_binding(),
            2 => self.results_buffer.buffer().as_entire_binding(),
            3 => self.params_buffer.as_entire_binding(),
        );
        self.bind_group = Some((bind_group, key));
    }

    /// Readback delay for the frame rate given to the last `poll_readbacks`
    pub fn readback_delay(&self) -> u32 {
        self.config.readback_delay(self.fps)
    }

    /// Start mapping this frame's readbacks; call after `queue.submit`
    pub fn after_submit(&mut self) {
        self.readback.after_submit();
    }

    /// Non-blocking poll; consumes every readback that became ready
    pub fn poll_readbacks(&mut self, fps: f32) {
        self.fps = fps;
        for completed in self.readback.advance(&self.gpu) {
            match completed.data {
                Ok(words) => self.commit(completed.payload, &words),
                Err(e) => log::error!("[VisibilityMaskEngine] Dropping readback: {}", e),
            }
        }
        self.stats.pending_readbacks = self.readback.pending() as u32;
        self.stats.skipped_readbacks = self.readback.skipped();
    }

    fn commit(&mut self, snapshot: SlotSnapshot, words: &[u32]) {
        self.results.clear();
        let mut visible = 0;
        for (slot, handle) in snapshot.iter().enumerate() {
            let Some(handle) = handle else { continue };
            // Skip objects evicted or re-slotted since the dispatch
            if self.registry.slot(*handle) != Some(slot as u32) {
                continue;
            }
            let bit = words.get(slot).map_or(true, |word| *word != 0);
            visible += u32::from(bit);
            self.results.insert(*handle, bit);
        }

        self.stats.visible = visible;
        self.registry.swap(snapshot);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled && !enabled {
            self.clear();
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn registry(&self) -> &IndexedObjectRegistry<ObjectHandle> {
        &self.registry
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn stats(&self) -> VisibilityStats {
        self.stats
    }

    /// Release every slot, result and pending readback
    pub fn clear(&mut self) {
        self.registry.clear();
        self.bounds.clear();
        self.unbounded.clear();
        self.results.clear();
        self.readback.clear();
        self.stats = VisibilityStats {
            capacity: self.capacity,
            ..Default::default()
        };
    }
}
