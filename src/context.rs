//! Per-renderer culling context
//!
//! Owns the depth pyramid and both culling engines. One frame is:
//!
//! 1. `begin_frame` with the camera snapshot
//! 2. `record_frame` into the frame's command encoder
//! 3. the caller submits the encoder
//! 4. `end_frame` to start readback mapping and consume ready results

use crate::config::CullingConfig;
use crate::constants::flags::{FLAG_FACING, FLAG_FRUSTUM, FLAG_HIZ};
use crate::constants::pyramid::PYRAMID_LEVELS;
use crate::error::{CullError, CullResult};
use crate::gpu::{GpuContext, GpuCullView};
use crate::hiz::{DepthInput, DepthPyramid};
use crate::math::CullView;
use crate::region::RegionCullingEngine;
use crate::registry::ObjectHandle;
use crate::stats::{CullStats, StatsWorker};
use crate::visibility::VisibilityMaskEngine;
use std::time::Duration;

struct Engines {
    pyramid: DepthPyramid,
    visibility: VisibilityMaskEngine,
    regions: RegionCullingEngine,
}

pub struct CullingContext {
    gpu: GpuContext,
    config: CullingConfig,
    /// `None` once torn down
    engines: Option<Engines>,
    stats_worker: Option<StatsWorker>,

    view: Option<CullView>,
    frame: u64,
    frame_dt: Duration,
    hiz_this_frame: bool,
    last_stats: CullStats,
}

impl CullingContext {
    /// Create the pyramid, both engines and (if configured) the stats
    /// worker. Any allocation failure aborts setup.
    pub fn new(gpu: GpuContext, config: CullingConfig) -> CullResult<Self> {
        config.validate()?;
        #[cfg(debug_assertions)]
        crate::gpu::validation::log_gpu_layouts();

        let pyramid = DepthPyramid::new(&gpu, &config)?;
        let visibility = VisibilityMaskEngine::new(&gpu, &config, pyramid.sample_layout())?;
        let regions = RegionCullingEngine::new(&gpu, &config, pyramid.sample_layout())?;

        let stats_worker = if config.stats_worker {
            Some(StatsWorker::spawn(config.stats_log_interval)?)
        } else {
            None
        };

        log::info!(
            "[CullingContext] Initialized (enabled: {}, entities: {}, regions: {}, hi-z: {})",
            config.enabled,
            config.entity_culling_active(),
            config.region_culling_active(),
            config.hiz_enabled
        );

        Ok(Self {
            gpu,
            config,
            engines: Some(Engines {
                pyramid,
                visibility,
                regions,
            }),
            stats_worker,
            view: None,
            frame: 0,
            frame_dt: Duration::ZERO,
            hiz_this_frame: false,
            last_stats: CullStats::default(),
        })
    }

    /// Record the camera for this frame and the previous frame's duration
    pub fn begin_frame(&mut self, view: CullView, frame_dt: Duration) {
        self.view = Some(view);
        self.frame_dt = frame_dt;
        self.frame += 1;
    }

    /// Record the pyramid build and both culling dispatches. Without a depth
    /// buffer the frame is culled against the frustum only.
    pub fn record_frame(&mut self, encoder: &mut wgpu::CommandEncoder, depth: Option<DepthInput>) -> CullResult<()> {
        let Some(view) = self.view else {
            log::debug!("[CullingContext] record_frame without begin_frame, skipping");
            return Ok(());
        };
        let config = &self.config;
        let engines = self.engines.as_mut().ok_or(CullError::TornDown)?;

        self.hiz_this_frame = false;
        if let Some(depth) = depth.filter(|_| config.enabled && config.hiz_enabled) {
            engines.pyramid.build(encoder, &depth, view.near, view.far)?;
            self.hiz_this_frame = true;
        }

        let mut flags = 0;
        if config.enabled {
            flags |= FLAG_FRUSTUM;
            if self.hiz_this_frame {
                flags |= FLAG_HIZ;
            }
            if config.facing_cull {
                flags |= FLAG_FACING;
            }
        }

        let (width, height) = engines.pyramid.extent();
        let gpu_view = GpuCullView::new(
            &view,
            config.depth_bias,
            (width, height, PYRAMID_LEVELS as u32),
            flags,
        );

        engines.visibility.tick(encoder, &gpu_view, &engines.pyramid)?;
        engines.regions.tick(encoder, &gpu_view, &engines.pyramid)?;
        Ok(())
    }

    /// Call after the encoder from `record_frame` has been submitted
    pub fn end_frame(&mut self) -> CullResult<()> {
        let fps = self.fps();
        let engines = self.engines.as_mut().ok_or(CullError::TornDown)?;

        engines.visibility.after_submit();
        engines.regions.after_submit();
        engines.visibility.poll_readbacks(fps);
        engines.regions.poll_readbacks();

        self.last_stats = CullStats {
            frame: self.frame,
            frame_time: self.frame_dt,
            hiz_built: self.hiz_this_frame,
            visibility: engines.visibility.stats(),
            regions: engines.regions.stats(),
        };
        if let Some(worker) = &self.stats_worker {
            worker.record(self.last_stats);
        }
        Ok(())
    }

    /// Frame rate implied by the last `begin_frame` duration
    pub fn fps(&self) -> f32 {
        let seconds = self.frame_dt.as_secs_f32();
        if seconds > 0.0 {
            1.0 / seconds
        } else {
            0.0
        }
    }

    /// Fail-open object visibility; always true after teardown
    pub fn is_visible(&self, handle: ObjectHandle) -> bool {
        self.engines
            .as_ref()
            .map_or(true, |engines| engines.visibility.is_visible(handle))
    }

    pub fn visibility(&self) -> CullResult<&VisibilityMaskEngine> {
        self.engines.as_ref().map(|e| &e.visibility).ok_or(CullError::TornDown)
    }

    pub fn visibility_mut(&mut self) -> CullResult<&mut VisibilityMaskEngine> {
        self.engines.as_mut().map(|e| &mut e.visibility).ok_or(CullError::TornDown)
    }

    pub fn regions(&self) -> CullResult<&RegionCullingEngine> {
        self.engines.as_ref().map(|e| &e.regions).ok_or(CullError::TornDown)
    }

    pub fn regions_mut(&mut self) -> CullResult<&mut RegionCullingEngine> {
        self.engines.as_mut().map(|e| &mut e.regions).ok_or(CullError::TornDown)
    }

    pub fn pyramid(&self) -> CullResult<&DepthPyramid> {
        self.engines.as_ref().map(|e| &e.pyramid).ok_or(CullError::TornDown)
    }

    pub fn config(&self) -> &CullingConfig {
        &self.config
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Statistics gathered by the last `end_frame`
    pub fn stats(&self) -> CullStats {
        self.last_stats
    }

    pub fn stats_worker(&self) -> Option<&StatsWorker> {
        self.stats_worker.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.engines.is_none()
    }

    /// Release every GPU buffer, registry and pending readback. The context
    /// cannot be used afterwards.
    pub fn teardown(&mut self) {
        let Some(mut engines) = self.engines.take() else {
            return;
        };

        engines.visibility.clear();
        engines.regions.clear();
        drop(engines);
        // wgpu frees dropped resources on the next maintain; block until done
        let _ = self.gpu.device().poll(wgpu::Maintain::Wait);

        if let Some(mut worker) = self.stats_worker.take() {
            worker.shutdown();
        }
        self.view = None;
        log::info!("[CullingContext] Torn down after {} frames", self.frame);
    }
}

impl Drop for CullingContext {
    fn drop(&mut self) {
        self.teardown();
    }
}
