//! Hierarchical depth pyramid builder
//!
//! Level 0 is a linearized copy of the main depth buffer; every further level
//! keeps the farthest distance of a 2x2 footprint. Levels are separate
//! single-mip R32Float textures so each reduction pass reads one texture and
//! writes another.

use super::cpu::level_extents;
use crate::config::{CullingConfig, DepthConvention};
use crate::constants::pyramid::{PYRAMID_LEVELS, PYRAMID_TILE};
use crate::error::CullResult;
use crate::gpu::shader_includes::{HZB_LINEARIZE_WGSL, HZB_REDUCE_WGSL};
use crate::gpu::{compile_shader, GpuContext, PyramidParams};

/// The caller's depth buffer for this frame
#[derive(Clone, Copy)]
pub struct DepthInput<'a> {
    /// Single-sample depth view (sample type `Depth`)
    pub view: &'a wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

struct PyramidLevels {
    textures: Vec<wgpu::Texture>,
    views: Vec<wgpu::TextureView>,
    extents: [(u32, u32); PYRAMID_LEVELS],
}

impl PyramidLevels {
    fn allocate(gpu: &GpuContext, width: u32, height: u32) -> CullResult<Self> {
        let extents = level_extents(width, height);
        let mut textures = Vec::with_capacity(PYRAMID_LEVELS);
        let mut views = Vec::with_capacity(PYRAMID_LEVELS);

        for (level, (w, h)) in extents.iter().enumerate() {
            let label = format!("HZB Level {}", level);
            let texture = gpu.checked(&label, |device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&label),
                    size: wgpu::Extent3d {
                        width: *w,
                        height: *h,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::R32Float,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::STORAGE_BINDING
                        | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                })
            })?;
            views.push(texture.create_view(&wgpu::TextureViewDescriptor::default()));
            textures.push(texture);
        }

        Ok(Self {
            textures,
            views,
            extents,
        })
    }
}

pub struct DepthPyramid {
    gpu: GpuContext,
    convention: DepthConvention,

    linearize_pipeline: wgpu::ComputePipeline,
    reduce_pipeline: wgpu::ComputePipeline,
    linearize_layout: wgpu::BindGroupLayout,
    reduce_layout: wgpu::BindGroupLayout,
    sample_layout: wgpu::BindGroupLayout,

    /// One uniform per level; all passes of a frame are in one submission
    params_buffers: Vec<wgpu::Buffer>,

    levels: PyramidLevels,
    reduce_bind_groups: Vec<wgpu::BindGroup>,
    sample_bind_group: wgpu::BindGroup,

    generation: u64,
    built: bool,
}

impl DepthPyramid {
    pub fn new(gpu: &GpuContext, config: &CullingConfig) -> CullResult<Self> {
        let device = gpu.device();

        let linearize_layout = crate::create_bind_group_layout!(
            device,
            "HZB Linearize Layout",
            0 => buffer(uniform),
            // Depth32Float bound as unfilterable float so GLSL backends can load it
            1 => texture(unfilterable),
            2 => storage_texture(r32float),
        );
        let reduce_layout = crate::create_bind_group_layout!(
            device,
            "HZB Reduce Layout",
            0 => buffer(uniform),
            1 => texture(unfilterable),
            2 => storage_texture(r32float),
        );
        let sample_layout = Self::create_sample_layout(device);

        let linearize_shader = compile_shader(gpu, "hzb_linearize.wgsl", HZB_LINEARIZE_WGSL)?;
        let reduce_shader = compile_shader(gpu, "hzb_reduce.wgsl", HZB_REDUCE_WGSL)?;
        let linearize_pipeline =
            gpu.create_compute_pipeline("HZB Linearize Pipeline", &linearize_shader, &[&linearize_layout])?;
        let reduce_pipeline =
            gpu.create_compute_pipeline("HZB Reduce Pipeline", &reduce_shader, &[&reduce_layout])?;

        let params_buffers = (0..PYRAMID_LEVELS)
            .map(|level| {
                gpu.create_buffer(
                    &format!("HZB Params {}", level),
                    std::mem::size_of::<PyramidParams>() as u64,
                    wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                )
            })
            .collect::<CullResult<Vec<_>>>()?;

        // 1x1 placeholder so consumers can bind before the first build
        let levels = PyramidLevels::allocate(gpu, 1, 1)?;
        let reduce_bind_groups = Self::create_reduce_bind_groups(device, &reduce_layout, &params_buffers, &levels);
        let sample_bind_group = Self::create_sample_bind_group(device, &sample_layout, &levels);

        Ok(Self {
            gpu: gpu.clone(),
            convention: config.depth_convention,
            linearize_pipeline,
            reduce_pipeline,
            linearize_layout,
            reduce_layout,
            sample_layout,
            params_buffers,
            levels,
            reduce_bind_groups,
            sample_bind_group,
            generation: 0,
            built: false,
        })
    }

    /// Layout of the group(1) pyramid bindings read by the culling shaders
    fn create_sample_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        crate::create_bind_group_layout!(
            device,
            "HZB Sample Layout",
            0 => texture(unfilterable),
            1 => texture(unfilterable),
            2 => texture(unfilterable),
            3 => texture(unfilterable),
            4 => texture(unfilterable),
            5 => texture(unfilterable),
            6 => texture(unfilterable),
            7 => texture(unfilterable),
        )
    }

    fn create_sample_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        levels: &PyramidLevels,
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = levels
            .views
            .iter()
            .enumerate()
            .map(|(level, view)| wgpu::BindGroupEntry {
                binding: level as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("HZB Sample Bind Group"),
            layout,
            entries: &entries,
        })
    }

    fn create_reduce_bind_groups(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        params: &[wgpu::Buffer],
        levels: &PyramidLevels,
    ) -> Vec<wgpu::BindGroup> {
        (1..PYRAMID_LEVELS)
            .map(|level| {
                crate::create_bind_group!(
                    device,
                    "HZB Reduce Bind Group",
                    layout,
                    0 => params[level].as_entire_binding(),
                    1 => wgpu::BindingResource::TextureView(&levels.views[level - 1]),
                    2 => wgpu::BindingResource::TextureView(&levels.views[level]),
                )
            })
            .collect()
    }

    /// Reallocate the levels when the depth buffer size changes
    fn ensure_extent(&mut self, width: u32, height: u32) -> CullResult<()> {
        let max_dimension = self.gpu.device().limits().max_texture_dimension_2d;
        let (clamped_w, clamped_h) = (width.clamp(1, max_dimension), height.clamp(1, max_dimension));
        if clamped_w != width || clamped_h != height {
            log::warn!(
                "[DepthPyramid::build] Depth size {}x{} clamped to {}x{} (max: {})",
                width,
                height,
                clamped_w,
                clamped_h,
                max_dimension
            );
        }

        if self.levels.extents[0] == (clamped_w, clamped_h) {
            return Ok(());
        }

        log::info!(
            "[DepthPyramid] Reallocating {} levels for {}x{} depth buffer",
            PYRAMID_LEVELS,
            clamped_w,
            clamped_h
        );

        let device = self.gpu.device();
        self.levels = PyramidLevels::allocate(&self.gpu, clamped_w, clamped_h)?;
        self.reduce_bind_groups =
            Self::create_reduce_bind_groups(device, &self.reduce_layout, &self.params_buffers, &self.levels);
        self.sample_bind_group = Self::create_sample_bind_group(device, &self.sample_layout, &self.levels);
        self.generation += 1;
        self.built = false;
        Ok(())
    }

    /// Record the pyramid build for this frame's depth buffer
    pub fn build(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        depth: &DepthInput,
        near: f32,
        far: f32,
    ) -> CullResult<()> {
        self.ensure_extent(depth.width, depth.height)?;

        let reversed = match self.convention {
            DepthConvention::Standard => 0.0,
            DepthConvention::Reversed => 1.0,
        };
        let extents = self.levels.extents;
        for level in 0..PYRAMID_LEVELS {
            let src = if level == 0 { extents[0] } else { extents[level - 1] };
            let params = PyramidParams {
                dst_size: [extents[level].0, extents[level].1],
                src_size: [src.0, src.1],
                depth: [near, far, reversed, 0.0],
            };
            self.gpu
                .queue()
                .write_buffer(&self.params_buffers[level], 0, bytemuck::bytes_of(&params));
        }

        let linearize_bind_group = crate::create_bind_group!(
            self.gpu.device(),
            "HZB Linearize Bind Group",
            &self.linearize_layout,
            0 => self.params_buffers[0].as_entire_binding(),
            1 => wgpu::BindingResource::TextureView(depth.view),
            2 => wgpu::BindingResource::TextureView(&self.levels.views[0]),
        );

        // One pass per level: the pass boundary orders the dependent levels
        for level in 0..PYRAMID_LEVELS {
            let (w, h) = extents[level];
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&format!("HZB Level {} Build", level)),
                timestamp_writes: None,
            });

            if level == 0 {
                pass.set_pipeline(&self.linearize_pipeline);
                pass.set_bind_group(0, &linearize_bind_group, &[]);
            } else {
                pass.set_pipeline(&self.reduce_pipeline);
                pass.set_bind_group(0, &self.reduce_bind_groups[level - 1], &[]);
            }
            pass.dispatch_workgroups(w.div_ceil(PYRAMID_TILE), h.div_ceil(PYRAMID_TILE), 1);
        }

        self.built = true;
        log::trace!("[DepthPyramid] Recorded build for {}x{}", extents[0].0, extents[0].1);
        Ok(())
    }

    pub fn sample_bind_group(&self) -> &wgpu::BindGroup {
        &self.sample_bind_group
    }

    pub fn sample_layout(&self) -> &wgpu::BindGroupLayout {
        &self.sample_layout
    }

    /// Incremented on every reallocation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Level 0 size
    pub fn extent(&self) -> (u32, u32) {
        self.levels.extents[0]
    }

    pub fn level_extent(&self, level: usize) -> Option<(u32, u32)> {
        self.levels.extents.get(level).copied()
    }

    /// A build has been recorded since the last reallocation
    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn level_view(&self, level: usize) -> Option<&wgpu::TextureView> {
        self.levels.views.get(level)
    }

    pub fn level_texture(&self, level: usize) -> Option<&wgpu::Texture> {
        self.levels.textures.get(level)
    }

    pub fn convention(&self) -> DepthConvention {
        self.convention
    }
}
