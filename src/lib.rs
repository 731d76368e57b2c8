//! GPU occlusion culling for a voxel world renderer.
//!
//! A hierarchical depth pyramid is built from the previous frame's depth
//! buffer each frame. Dynamic objects are tested against it and the view
//! frustum on the GPU, with results read back a few frames later. World
//! regions are culled section by section into indirect draw commands that
//! never leave the GPU.

pub mod capacity;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod gpu;
pub mod hiz;
pub mod math;
pub mod readback;
pub mod region;
pub mod registry;
pub mod stats;
pub mod visibility;

pub use config::{CullingConfig, DepthConvention};
pub use context::CullingContext;
pub use error::{CullError, CullResult};
pub use gpu::GpuContext;
pub use hiz::{CpuPyramid, DepthInput, DepthPyramid};
pub use math::{Aabb, Bounds, Cullable, CullView, Frustum};
pub use region::{Facing, PassGeometry, RegionCullingEngine, RegionId, RenderPass, SectionGeometry};
pub use registry::{IndexedObjectRegistry, ObjectHandle, ObjectKind};
pub use stats::{CullStats, StatsWorker};
pub use visibility::VisibilityMaskEngine;
