//! GPU plumbing shared by the culling engines
//!
//! Device handles, growable storage buffers, shader composition and the
//! `#[repr(C)]` structs mirrored in WGSL.

pub mod bind_group_macros;
pub mod context;
pub mod growable_buffer;
pub mod layouts;
pub mod preprocessor;
pub mod shader_includes;
pub mod validation;

pub use context::GpuContext;
pub use growable_buffer::GrowableBuffer;
pub use layouts::{
    DrawIndexedIndirectArgs, GpuAabb, GpuCullView, GpuRegion, GpuSection, GpuSectionPass,
    PyramidParams, RegionCullParams, VisibilityParams,
};
pub use preprocessor::{preprocess_shader, WgslPreprocessor};

use crate::error::CullResult;

/// Expand includes and compile an embedded shader
pub fn compile_shader(gpu: &GpuContext, name: &str, source: &str) -> CullResult<wgpu::ShaderModule> {
    let expanded = preprocess_shader(name, source)?;
    gpu.create_shader(name, &expanded)
}

/// Workgroup grid for `groups` workgroups, split across y past the per-axis limit
pub fn dispatch_grid(groups: u32) -> (u32, u32) {
    use crate::constants::MAX_DISPATCH_GROUPS;

    if groups <= MAX_DISPATCH_GROUPS {
        (groups, 1)
    } else {
        (MAX_DISPATCH_GROUPS, (groups + MAX_DISPATCH_GROUPS - 1) / MAX_DISPATCH_GROUPS)
    }
}
