//! Hierarchical depth ("Hi-Z") pyramid: GPU builder and CPU reference

pub mod cpu;
pub mod depth_pyramid;

pub use cpu::{depth_for_distance, level_extents, linearize_depth, reduce_level_cpu, CpuPyramid};
pub use depth_pyramid::{DepthInput, DepthPyramid};
