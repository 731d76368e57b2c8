//! CPU reference of the depth pyramid and the Hi-Z box test
//!
//! Mirrors `hzb_linearize.wgsl`, `hzb_reduce.wgsl` and `aabb_occluded` in
//! `cull_common.wgsl` step for step, so GPU results can be checked against it.

use crate::config::DepthConvention;
use crate::constants::pyramid::PYRAMID_LEVELS;
use crate::math::{Aabb, CullView};

/// Size of every pyramid level for a `width` x `height` depth buffer
pub fn level_extents(width: u32, height: u32) -> [(u32, u32); PYRAMID_LEVELS] {
    let mut extents = [(1, 1); PYRAMID_LEVELS];
    let (mut w, mut h) = (width.max(1), height.max(1));
    for extent in extents.iter_mut() {
        *extent = (w, h);
        w = w.div_ceil(2).max(1);
        h = h.div_ceil(2).max(1);
    }
    extents
}

/// Depth buffer value -> linear view distance
pub fn linearize_depth(depth: f32, near: f32, far: f32, convention: DepthConvention) -> f32 {
    match convention {
        DepthConvention::Standard => near * far / (far - depth * (far - near)),
        DepthConvention::Reversed => near * far / (near + depth * (far - near)),
    }
}

/// Linear view distance -> depth buffer value (inverse of [`linearize_depth`])
pub fn depth_for_distance(distance: f32, near: f32, far: f32, convention: DepthConvention) -> f32 {
    let standard = far * (distance - near) / (distance * (far - near));
    match convention {
        DepthConvention::Standard => standard,
        DepthConvention::Reversed => 1.0 - standard,
    }
}

/// One 2x2 max reduction step; returns the level and its size
pub fn reduce_level_cpu(src: &[f32], width: u32, height: u32) -> (Vec<f32>, u32, u32) {
    let dst_w = width.div_ceil(2).max(1);
    let dst_h = height.div_ceil(2).max(1);
    let (last_x, last_y) = (width.saturating_sub(1), height.saturating_sub(1));
    let at = |x: u32, y: u32| src[(y.min(last_y) * width + x.min(last_x)) as usize];

    let mut dst = Vec::with_capacity((dst_w * dst_h) as usize);
    for y in 0..dst_h {
        for x in 0..dst_w {
            let (sx, sy) = (x * 2, y * 2);
            let farthest = at(sx, sy)
                .max(at(sx + 1, sy))
                .max(at(sx, sy + 1))
                .max(at(sx + 1, sy + 1));
            dst.push(farthest);
        }
    }
    (dst, dst_w, dst_h)
}

/// Full pyramid held in memory
#[derive(Debug, Clone)]
pub struct CpuPyramid {
    levels: Vec<(Vec<f32>, u32, u32)>,
}

impl CpuPyramid {
    /// Build from an already linear level 0
    pub fn from_linear(level0: Vec<f32>, width: u32, height: u32) -> Self {
        let mut levels = Vec::with_capacity(PYRAMID_LEVELS);
        levels.push((level0, width, height));
        for _ in 1..PYRAMID_LEVELS {
            let (src, w, h) = &levels[levels.len() - 1];
            let next = reduce_level_cpu(src, *w, *h);
            levels.push(next);
        }
        Self { levels }
    }

    /// Build from raw depth buffer values
    pub fn from_depth(
        depth: &[f32],
        width: u32,
        height: u32,
        near: f32,
        far: f32,
        convention: DepthConvention,
    ) -> Self {
        let linear = depth
            .iter()
            .map(|d| linearize_depth(*d, near, far, convention))
            .collect();
        Self::from_linear(linear, width, height)
    }

    pub fn level(&self, level: usize) -> Option<(&[f32], u32, u32)> {
        self.levels.get(level).map(|(data, w, h)| (data.as_slice(), *w, *h))
    }

    pub fn extent(&self) -> (u32, u32) {
        let (_, w, h) = &self.levels[0];
        (*w, *h)
    }

    /// Texel at `level`, coordinates clamped to the level
    pub fn load(&self, level: usize, x: u32, y: u32) -> f32 {
        let (data, w, h) = &self.levels[level.min(self.levels.len() - 1)];
        let x = x.min(w - 1);
        let y = y.min(h - 1);
        data[(y * w + x) as usize]
    }

    /// Hi-Z test of a world box against this pyramid
    pub fn is_occluded(&self, view: &CullView, aabb: &Aabb, depth_bias: f32) -> bool {
        let mut uv_min = [1.0f32, 1.0];
        let mut uv_max = [0.0f32, 0.0];
        let mut nearest = f32::MAX;

        for corner in aabb.corners() {
            let clip = view.project(corner);
            if clip.w <= view.near {
                return false;
            }
            let ndc = [clip.x / clip.w, clip.y / clip.w];
            let uv = [ndc[0] * 0.5 + 0.5, 0.5 - ndc[1] * 0.5];
            for axis in 0..2 {
                uv_min[axis] = uv_min[axis].min(uv[axis]);
                uv_max[axis] = uv_max[axis].max(uv[axis]);
            }
            nearest = nearest.min(clip.w);
        }

        let (width, height) = self.extent();
        let base = [width as f32, height as f32];
        let last = [width - 1, height - 1];
        for axis in 0..2 {
            uv_min[axis] = uv_min[axis].clamp(0.0, 1.0);
            uv_max[axis] = uv_max[axis].clamp(0.0, 1.0);
        }

        let footprint = ((uv_max[0] - uv_min[0]) * base[0]).max((uv_max[1] - uv_min[1]) * base[1]);
        let level = footprint.max(1.0).log2().ceil();
        if level > (PYRAMID_LEVELS - 1) as f32 {
            return false;
        }
        let level = level as u32;

        let texel = |uv: f32, axis: usize| ((uv * base[axis]).floor() as u32).min(last[axis]) >> level;
        let (x0, y0) = (texel(uv_min[0], 0), texel(uv_min[1], 1));
        let (x1, y1) = (texel(uv_max[0], 0), texel(uv_max[1], 1));

        let level = level as usize;
        let farthest = self
            .load(level, x0, y0)
            .max(self.load(level, x1, y0))
            .max(self.load(level, x0, y1))
            .max(self.load(level, x1, y1));

        nearest > farthest + depth_bias
    }
}
