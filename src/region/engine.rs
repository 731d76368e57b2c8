//! GPU region/section culling that writes indirect draw commands

use super::layout::{DirtyRuns, RegionId, RegionTable, RenderPass, SectionGeometry};
use crate::capacity::grown_capacity;
use crate::config::CullingConfig;
use crate::constants::region::{
    COUNTER_WORDS, DEFAULT_COMMAND_CAPACITY, OVERFLOW_COUNTER, RENDER_PASSES, SECTIONS_PER_REGION,
};
use crate::error::CullResult;
use crate::gpu::shader_includes::REGION_CULL_WGSL;
use crate::gpu::{
    compile_shader, dispatch_grid, DrawIndexedIndirectArgs, GpuContext, GpuCullView, GpuRegion, GpuSection,
    GrowableBuffer, RegionCullParams,
};
use crate::hiz::DepthPyramid;
use crate::readback::ReadbackScheduler;

const COMMAND_SIZE: u64 = std::mem::size_of::<DrawIndexedIndirectArgs>() as u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionStats {
    pub regions: u32,
    /// Regions dispatched last tick
    pub active_regions: u32,
    /// Commands per pass in the last consumed counter readback
    pub commands: [u32; RENDER_PASSES],
    /// Dropped commands in the last consumed counter readback
    pub overflow: u32,
    pub command_capacity: u32,
    pub region_capacity: u32,
}

pub struct RegionCullingEngine {
    gpu: GpuContext,
    enabled: bool,
    facing_cull: bool,
    readback_delay: u32,

    table: RegionTable,

    region_buffer: GrowableBuffer,
    section_buffer: GrowableBuffer,
    table_buffer: GrowableBuffer,
    /// RENDER_PASSES consecutive blocks of `command_capacity` commands
    command_buffer: GrowableBuffer,
    counter_buffer: wgpu::Buffer,
    view_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    command_capacity: u32,

    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
    bind_group: Option<(wgpu::BindGroup, [u64; 4])>,

    counter_readback: ReadbackScheduler<()>,
    grow_after_overflow: bool,
    stats: RegionStats,
}

impl RegionCullingEngine {
    pub fn new(gpu: &GpuContext, config: &CullingConfig, sample_layout: &wgpu::BindGroupLayout) -> CullResult<Self> {
        let device = gpu.device();

        let layout = crate::create_bind_group_layout!(
            device,
            "Region Cull Layout",
            0 => buffer(uniform),
            1 => buffer(uniform),
            2 => buffer(storage_read),
            3 => buffer(storage_read),
            4 => buffer(storage_read),
            5 => buffer(storage),
            6 => buffer(storage),
        );
        let shader = compile_shader(gpu, "region_cull.wgsl", REGION_CULL_WGSL)?;
        let pipeline = gpu.create_compute_pipeline("Region Cull Pipeline", &shader, &[&layout, sample_layout])?;

        let region_capacity = config.initial_region_capacity as u64;
        let region_buffer = GrowableBuffer::new(
            gpu,
            "Region Header Buffer",
            std::mem::size_of::<GpuRegion>() as u64,
            region_capacity,
            wgpu::BufferUsages::STORAGE,
        )?;
        let section_buffer = GrowableBuffer::new(
            gpu,
            "Region Section Buffer",
            std::mem::size_of::<GpuSection>() as u64,
            region_capacity * SECTIONS_PER_REGION as u64,
            wgpu::BufferUsages::STORAGE,
        )?;
        let table_buffer = GrowableBuffer::new(
            gpu,
            "Region Index Table",
            std::mem::size_of::<u32>() as u64,
            region_capacity,
            wgpu::BufferUsages::STORAGE,
        )?;
        let command_capacity = DEFAULT_COMMAND_CAPACITY;
        let command_buffer = GrowableBuffer::new(
            gpu,
            "Region Indirect Commands",
            COMMAND_SIZE,
            command_capacity as u64 * RENDER_PASSES as u64,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT,
        )?;
        let counter_buffer = gpu.create_buffer(
            "Region Draw Counters",
            (COUNTER_WORDS * std::mem::size_of::<u32>()) as u64,
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        )?;
        let view_buffer = gpu.create_buffer(
            "Region Cull View",
            std::mem::size_of::<GpuCullView>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;
        let params_buffer = gpu.create_buffer(
            "Region Cull Params",
            std::mem::size_of::<RegionCullParams>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;

        log::info!(
            "[RegionCullingEngine] Created with {} regions, {} commands per pass (indirect count: {})",
            region_capacity,
            command_capacity,
            gpu.supports_indirect_count()
        );

        Ok(Self {
            gpu: gpu.clone(),
            enabled: config.region_culling_active(),
            facing_cull: config.facing_cull,
            readback_delay: config.readback_delay_ticks,
            table: RegionTable::new(),
            region_buffer,
            section_buffer,
            table_buffer,
            command_buffer,
            counter_buffer,
            view_buffer,
            params_buffer,
            command_capacity,
            layout,
            pipeline,
            bind_group: None,
            counter_readback: ReadbackScheduler::new("RegionCounterReadback", config.readback_ring_size),
            grow_after_overflow: false,
            stats: RegionStats::default(),
        })
    }

    /// Register a region (idempotent) and return its slot
    pub fn add_region(&mut self, id: RegionId, origin: [i32; 3]) -> u32 {
        self.table.add(id, origin)
    }

    /// Free the region's slot; its header is invalidated on the next upload
    pub fn remove_region(&mut self, id: RegionId) -> bool {
        self.table.remove(id).is_some()
    }

    pub fn update_section(&mut self, id: RegionId, section_index: u32, geometry: &SectionGeometry) -> bool {
        self.table.update_section(id, section_index, geometry)
    }

    pub fn clear_section(&mut self, id: RegionId, section_index: u32) -> bool {
        self.table.clear_section(id, section_index)
    }

    /// Grow buffers, upload changes and record the culling dispatch
    pub fn tick(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &GpuCullView,
        pyramid: &DepthPyramid,
    ) -> CullResult<()> {
        let active = self.table.active_slots();

        self.ensure_capacity(&active)?;
        self.upload(view, &active);

        encoder.clear_buffer(&self.counter_buffer, 0, None);
        if !self.gpu.supports_indirect_count() {
            // Unused entries must stay zero-count draws
            encoder.clear_buffer(self.command_buffer.buffer(), 0, None);
        }

        self.refresh_bind_group();
        if let Some((bind_group, _)) = self.bind_group.as_ref().filter(|_| !active.is_empty()) {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Region Cull Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.set_bind_group(1, pyramid.sample_bind_group(), &[]);
            let (x, y) = dispatch_grid(active.len() as u32);
            pass.dispatch_workgroups(x, y, 1);
        }

        self.counter_readback.schedule(
            &self.gpu,
            encoder,
            &self.counter_buffer,
            (COUNTER_WORDS * std::mem::size_of::<u32>()) as u64,
            self.readback_delay,
            (),
        )?;

        self.stats.regions = self.table.len() as u32;
        self.stats.active_regions = active.len() as u32;
        self.stats.command_capacity = self.command_capacity;
        self.stats.region_capacity = self.region_buffer.capacity() as u32;
        log::trace!("[RegionCullingEngine] Dispatched {} regions", active.len());
        Ok(())
    }

    fn ensure_capacity(&mut self, active: &[u32]) -> CullResult<()> {
        let mut grew = false;

        let slots = self.table.mirrored_slots() as u64;
        if let Some(capacity) = grown_capacity(self.region_buffer.capacity(), slots) {
            log::info!(
                "[RegionCullingEngine] Growing region buffers {} -> {} regions",
                self.region_buffer.capacity(),
                capacity
            );
            self.region_buffer.resize(&self.gpu, capacity)?;
            self.section_buffer
                .resize(&self.gpu, capacity * SECTIONS_PER_REGION as u64)?;
            grew = true;
        }

        if let Some(capacity) = grown_capacity(self.table_buffer.capacity(), active.len() as u64) {
            self.table_buffer.resize(&self.gpu, capacity)?;
        }

        let mut required = self.table.command_requirement(active);
        if std::mem::take(&mut self.grow_after_overflow) {
            required = required.max(self.command_capacity.saturating_mul(2));
        }
        if let Some(capacity) = grown_capacity(self.command_capacity as u64, required as u64) {
            log::info!(
                "[RegionCullingEngine] Growing command buffer {} -> {} commands per pass",
                self.command_capacity,
                capacity
            );
            self.command_buffer
                .resize(&self.gpu, capacity * RENDER_PASSES as u64)?;
            self.command_capacity = capacity as u32;
        }

        if grew {
            self.table.mark_all_dirty();
        }
        Ok(())
    }

    fn upload(&mut self, view: &GpuCullView, active: &[u32]) {
        let mut view = *view;
        if !self.enabled {
            // Culling off: every populated section is drawn
            view.pyramid_extent[3] = 0;
        } else if !self.facing_cull {
            view.pyramid_extent[3] &= !crate::constants::flags::FLAG_FACING;
        }

        let queue = self.gpu.queue();
        queue.write_buffer(&self.view_buffer, 0, bytemuck::bytes_of(&view));
        let params = RegionCullParams {
            active_count: active.len() as u32,
            command_capacity: self.command_capacity,
            ..Default::default()
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
        self.table_buffer.write(&self.gpu, 0, active);

        match self.table.take_dirty() {
            DirtyRuns::Full => {
                self.region_buffer.write(&self.gpu, 0, self.table.regions());
                self.section_buffer.write(&self.gpu, 0, self.table.sections());
            }
            DirtyRuns::Partial { regions, sections } => {
                for (first, count) in regions {
                    let range = first as usize..(first + count) as usize;
                    self.region_buffer
                        .write(&self.gpu, first as u64, &self.table.regions()[range]);
                }
                for (first, count) in sections {
                    let range = first as usize..(first + count) as usize;
                    self.section_buffer
                        .write(&self.gpu, first as u64, &self.table.sections()[range]);
                }
            }
        }
    }

    fn refresh_bind_group(&mut self) {
        let key = [
            self.region_buffer.generation(),
            self.section_buffer.generation(),
            self.table_buffer.generation(),
            self.command_buffer.generation(),
        ];
        if matches!(&self.bind_group, Some((_, current)) if *current == key) {
            return;
        }

        let bind_group = crate::create_bind_group!(
            self.gpu.device(),
            "Region Cull Bind Group",
            &self.layout,
            0 => self.view_buffer.as_entire_binding(),
            1 => self.params_buffer.as_entire_binding(),
            2 => self.table_buffer.buffer().as_entire_binding(),
            3 => self.region_buffer.buffer().as_entire_binding(),
            4 => self.section_buffer.buffer().as_entire_binding(),
            5 => self.command_buffer.buffer().as_entire_binding(),
            6 => self.counter_buffer.as_entire_binding(),
        );
        self.bind_group = Some((bind_group, key));
    }

    /// Start mapping the counter readback; call after `queue.submit`
    pub fn after_submit(&mut self) {
        self.counter_readback.after_submit();
    }

    /// Consume counter readbacks; an overflow doubles the command capacity
    /// at the next tick
    pub fn poll_readbacks(&mut self) {
        for completed in self.counter_readback.advance(&self.gpu) {
            let words = match completed.data {
                Ok(words) => words,
                Err(e) => {
                    log::error!("[RegionCullingEngine] Dropping counter readback: {}", e);
                    continue;
                }
            };
            if words.len() < COUNTER_WORDS {
                continue;
            }

            for (pass, count) in self.stats.commands.iter_mut().enumerate() {
                *count = words[pass].min(self.command_capacity);
            }
            self.stats.overflow = words[OVERFLOW_COUNTER];
            if self.stats.overflow > 0 {
                log::warn!(
                    "[RegionCullingEngine] {} draw commands dropped (capacity {} per pass), growing",
                    self.stats.overflow,
                    self.command_capacity
                );
                self.grow_after_overflow = true;
            }
        }
    }

    /// Issue this pass's indirect draws. The render pass must already have
    /// the section vertex/index buffers and pipeline bound.
    pub fn draw<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>, pass: RenderPass) {
        let offset = self.command_offset(pass);
        if self.gpu.supports_indirect_count() {
            render_pass.multi_draw_indexed_indirect_count(
                self.command_buffer.buffer(),
                offset,
                &self.counter_buffer,
                self.count_offset(pass),
                self.command_capacity,
            );
        } else if self.gpu.supports_multi_draw() {
            render_pass.multi_draw_indexed_indirect(self.command_buffer.buffer(), offset, self.command_capacity);
        } else {
            for command in 0..self.command_capacity as u64 {
                render_pass.draw_indexed_indirect(self.command_buffer.buffer(), offset + command * COMMAND_SIZE);
            }
        }
    }

    /// Buffer holding every pass's commands; see [`command_offset`](Self::command_offset)
    pub fn commands(&self) -> &wgpu::Buffer {
        self.command_buffer.buffer()
    }

    /// Byte offset of a pass's commands in [`commands`](Self::commands)
    pub fn command_offset(&self, pass: RenderPass) -> wgpu::BufferAddress {
        pass.index() as u64 * self.command_capacity as u64 * COMMAND_SIZE
    }

    /// Region headers indexed by slot, mirroring [`RegionTable::regions`]
    pub fn region_buffer(&self) -> &wgpu::Buffer {
        self.region_buffer.buffer()
    }

    /// One u32 draw count per pass, followed by the overflow counter
    pub fn count_buffer(&self) -> &wgpu::Buffer {
        &self.counter_buffer
    }

    pub fn count_offset(&self, pass: RenderPass) -> wgpu::BufferAddress {
        (pass.index() * std::mem::size_of::<u32>()) as u64
    }

    pub fn command_capacity(&self) -> u32 {
        self.command_capacity
    }

    pub fn table(&self) -> &RegionTable {
        &self.table
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> RegionStats {
        self.stats
    }

    /// Drop every region and pending readback
    pub fn clear(&mut self) {
        self.table.clear();
        self.counter_readback.clear();
        self.grow_after_overflow = false;
        self.stats = RegionStats::default();
    }
}
