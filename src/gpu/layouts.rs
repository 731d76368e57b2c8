//! Plain-old-data structs shared with the culling shaders
//!
//! Field order and padding match the WGSL declarations in `shaders/`;
//! `validation.rs` pins every size at compile time.

use crate::constants::region::{FACINGS, RENDER_PASSES};
use crate::constants::visibility::OBJECT_ACTIVE;
use crate::math::{Aabb, CullView};
use bytemuck::{Pod, Zeroable};

/// Camera uniform bound at group(0) binding(0) by every culling shader
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuCullView {
    pub view_proj: [[f32; 4]; 4],
    pub frustum_planes: [[f32; 4]; 6],
    /// xyz = camera position, w unused
    pub camera_position: [f32; 4],
    /// near, far, depth bias, unused
    pub depth_params: [f32; 4],
    /// pyramid width, height, level count, FLAG_* bits
    pub pyramid_extent: [u32; 4],
}

impl GpuCullView {
    pub fn new(view: &CullView, depth_bias: f32, pyramid: (u32, u32, u32), flags: u32) -> Self {
        let position = view.position_array();
        Self {
            view_proj: view.view_proj.into(),
            frustum_planes: view.frustum().as_arrays(),
            camera_position: [position[0], position[1], position[2], 1.0],
            depth_params: [view.near, view.far, depth_bias, 0.0],
            pyramid_extent: [pyramid.0, pyramid.1, pyramid.2, flags],
        }
    }
}

/// Per-slot bounds for the object visibility test
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuAabb {
    pub min: [f32; 3],
    /// OBJECT_ACTIVE when the slot was submitted this tick
    pub flags: u32,
    pub max: [f32; 3],
    pub _padding: u32,
}

impl GpuAabb {
    pub fn active(aabb: &Aabb) -> Self {
        Self {
            min: [aabb.min.x, aabb.min.y, aabb.min.z],
            flags: OBJECT_ACTIVE,
            max: [aabb.max.x, aabb.max.y, aabb.max.z],
            _padding: 0,
        }
    }

    /// Sentinel for free or idle slots; the shader reports these visible
    pub const INACTIVE: Self = Self {
        min: [0.0; 3],
        flags: 0,
        max: [0.0; 3],
        _padding: 0,
    };

    pub fn is_active(&self) -> bool {
        self.flags & OBJECT_ACTIVE != 0
    }
}

/// Parameters for one object visibility dispatch
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct VisibilityParams {
    pub slot_count: u32,
    pub _padding: [u32; 3],
}

/// Region header: origin in blocks, validity, one population bit per section
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuRegion {
    pub origin: [i32; 4],
    pub flags: u32,
    pub _padding: [u32; 3],
    pub population: [u32; 8],
}

/// Geometry of one section for one render pass
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuSectionPass {
    pub base_vertex: i32,
    /// Quad counts in facing order -Y, +Y, -Z, +Z, -X, +X
    pub facing_quads: [u32; FACINGS],
    pub _padding: u32,
}

/// Section record: one entry per render pass
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuSection {
    pub passes: [GpuSectionPass; RENDER_PASSES],
}

/// Parameters for one region culling dispatch
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct RegionCullParams {
    pub active_count: u32,
    /// Commands per render pass in the command buffer
    pub command_capacity: u32,
    pub _padding: [u32; 2],
}

/// Matches wgpu's `DrawIndexedIndirect` argument layout
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

/// Parameters for one pyramid reduction pass
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct PyramidParams {
    /// Destination level size
    pub dst_size: [u32; 2],
    /// Source level size
    pub src_size: [u32; 2],
    /// near, far, reversed (0 or 1), unused
    pub depth: [f32; 4],
}
