//! Per-object visibility mask for entities and block entities
//!
//! Objects are submitted each tick with their bounds, tested on the GPU
//! against the frustum and the depth pyramid, and the results come back a few
//! ticks later. Queries fail open: anything without a committed result is
//! visible.

pub mod engine;

pub use engine::{VisibilityMaskEngine, VisibilityStats};
