//! Geometry used by the culling engines: boxes, frustum planes and the
//! per-frame camera snapshot.

pub mod aabb;
pub mod frustum;
pub mod view;

pub use aabb::{Aabb, Bounds, Cullable};
pub use frustum::{Frustum, Plane};
pub use view::{CullView, OPENGL_TO_WGPU_MATRIX};
