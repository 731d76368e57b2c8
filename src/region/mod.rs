//! Region/section culling with GPU-written indirect draws
//!
//! Regions are 8x4x8 grids of 16^3 sections. Each tick the active regions
//! are tested on the GPU, section by section, and every visible section
//! appends one indexed indirect draw per render pass it has geometry in.

pub mod engine;
pub mod layout;

pub use engine::{RegionCullingEngine, RegionStats};
pub use layout::{
    section_coords, section_index, section_origin, DirtyRuns, Facing, PassGeometry, RegionId, RegionTable,
    RenderPass, SectionGeometry,
};
