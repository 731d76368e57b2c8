//! Embedded shader includes
//!
//! Everything is embedded at compile time so shader composition never touches
//! the filesystem at runtime.

/// Constants generated by build.rs from `crate::constants`
pub const CULL_CONSTANTS_WGSL: &str = include_str!(concat!(env!("OUT_DIR"), "/cull_constants.wgsl"));

/// Cull view uniform, pyramid bindings and the shared box tests
pub const CULL_COMMON_WGSL: &str = include_str!("shaders/cull_common.wgsl");

/// Pyramid level 0: linearize the depth buffer
pub const HZB_LINEARIZE_WGSL: &str = include_str!("shaders/hzb_linearize.wgsl");

/// Pyramid levels 1..N: 2x2 max reduction
pub const HZB_REDUCE_WGSL: &str = include_str!("shaders/hzb_reduce.wgsl");

/// Per-object AABB visibility test
pub const VISIBILITY_TEST_WGSL: &str = include_str!("shaders/visibility_test.wgsl");

/// Region/section culling and indirect command emission
pub const REGION_CULL_WGSL: &str = include_str!("shaders/region_cull.wgsl");

/// Get shader include content by name
pub fn get_shader_include(name: &str) -> Option<&'static str> {
    match name {
        "cull_constants.wgsl" | "generated/cull_constants.wgsl" => Some(CULL_CONSTANTS_WGSL),
        "cull_common.wgsl" => Some(CULL_COMMON_WGSL),
        _ => None,
    }
}
