//! Culling configuration
//!
//! Owned by the host's config layer and handed to `CullingContext::new` as
//! an opaque value. Loadable from TOML; every field has a default so partial
//! files are accepted.

use crate::error::{invalid_config, CullError, CullResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the main depth buffer encodes distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthConvention {
    /// 0 at the near plane, 1 at the far plane
    Standard,
    /// 1 at the near plane, 0 at the far plane
    Reversed,
}

impl Default for DepthConvention {
    fn default() -> Self {
        DepthConvention::Standard
    }
}

/// Main culling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Master switch; when off every query reports visible
    pub enabled: bool,
    /// Dynamic object (entity / block entity) culling
    pub entity_culling: bool,
    /// Region/section culling
    pub region_culling: bool,
    /// Use the depth pyramid in addition to the frustum
    pub hiz_enabled: bool,
    /// Only draw facing slices that can face the camera
    pub facing_cull: bool,

    /// Minimum ticks between a visibility dispatch and trusting its result
    pub readback_delay_ticks: u32,
    /// Frame rate above which the extra delay is applied
    pub high_fps_threshold: f32,
    /// Extra ticks of delay when running above the threshold
    pub high_fps_extra_delay: u32,
    /// Staging buffers available for in-flight readbacks
    pub readback_ring_size: usize,

    /// Idle ticks before a transient object (entity) is evicted
    pub transient_idle_ticks: u32,
    /// Idle ticks before a persistent object (block entity) is evicted
    pub persistent_idle_ticks: u32,
    /// Object type names that are never culled
    pub excluded_types: Vec<String>,

    pub depth_convention: DepthConvention,
    /// Distance slack added to pyramid samples before declaring occlusion
    pub depth_bias: f32,

    /// Region slots allocated up front
    pub initial_region_capacity: u32,

    /// Spawn the background statistics thread
    pub stats_worker: bool,
    /// Frames between statistics summaries
    pub stats_log_interval: u32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entity_culling: true,
            region_culling: true,
            hiz_enabled: true,
            facing_cull: true,
            readback_delay_ticks: 2,
            high_fps_threshold: 120.0,
            high_fps_extra_delay: 1,
            readback_ring_size: 4,
            transient_idle_ticks: 20,
            persistent_idle_ticks: 600,
            excluded_types: Vec::new(),
            depth_convention: DepthConvention::Standard,
            depth_bias: 0.05,
            initial_region_capacity: crate::constants::region::DEFAULT_REGION_CAPACITY,
            stats_worker: false,
            stats_log_interval: 300,
        }
    }
}

impl CullingConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(source: &str) -> CullResult<Self> {
        let config: CullingConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> CullResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| CullError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml_str(&source)?;
        log::info!("[CullingConfig::load] Loaded culling config from {}", path.display());
        Ok(config)
    }

    /// Reject values the engines cannot run with
    pub fn validate(&self) -> CullResult<()> {
        if self.readback_ring_size == 0 {
            return Err(invalid_config("readback_ring_size must be at least 1"));
        }
        if self.transient_idle_ticks == 0 || self.persistent_idle_ticks == 0 {
            return Err(invalid_config("idle tick thresholds must be at least 1"));
        }
        if !self.high_fps_threshold.is_finite() || self.high_fps_threshold <= 0.0 {
            return Err(invalid_config("high_fps_threshold must be a positive number"));
        }
        if !self.depth_bias.is_finite() || self.depth_bias < 0.0 {
            return Err(invalid_config("depth_bias must be a non-negative number"));
        }
        if self.initial_region_capacity == 0 {
            return Err(invalid_config("initial_region_capacity must be at least 1"));
        }
        if self.stats_worker && self.stats_log_interval == 0 {
            return Err(invalid_config("stats_log_interval must be at least 1"));
        }
        Ok(())
    }

    /// Readback delay for the current frame rate
    pub fn readback_delay(&self, fps: f32) -> u32 {
        if fps > self.high_fps_threshold {
            self.readback_delay_ticks + self.high_fps_extra_delay
        } else {
            self.readback_delay_ticks
        }
    }

    /// Whether dynamic objects are tested at all
    pub fn entity_culling_active(&self) -> bool {
        self.enabled && self.entity_culling
    }

    /// Whether region sections are tested (disabled still emits draws)
    pub fn region_culling_active(&self) -> bool {
        self.enabled && self.region_culling
    }
}
