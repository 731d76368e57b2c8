//! Camera snapshot consumed by the culling engines

use super::frustum::Frustum;
use cgmath::{perspective, Deg, EuclideanSpace, Matrix4, Point3, Vector3, Vector4};

/// Maps cgmath's OpenGL clip depth [-1, 1] onto wgpu's [0, 1]
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Per-frame camera state: matrices, derived frustum, clip distances
#[derive(Debug, Clone, Copy)]
pub struct CullView {
    pub view_proj: Matrix4<f32>,
    pub position: Point3<f32>,
    pub near: f32,
    pub far: f32,
    /// Render target size in pixels
    pub viewport: (u32, u32),
    frustum: Frustum,
}

impl CullView {
    pub fn new(
        view_proj: Matrix4<f32>,
        position: Point3<f32>,
        near: f32,
        far: f32,
        viewport: (u32, u32),
    ) -> Self {
        Self {
            view_proj,
            position,
            near,
            far,
            viewport,
            frustum: Frustum::from_view_projection(&view_proj),
        }
    }

    /// Right-handed perspective camera looking at `target`
    pub fn look_at(
        position: Point3<f32>,
        target: Point3<f32>,
        fovy: Deg<f32>,
        near: f32,
        far: f32,
        viewport: (u32, u32),
    ) -> Self {
        let aspect = viewport.0.max(1) as f32 / viewport.1.max(1) as f32;
        let view = Matrix4::look_at_rh(position, target, Vector3::unit_y());
        let proj = OPENGL_TO_WGPU_MATRIX * perspective(fovy, aspect, near, far);
        Self::new(proj * view, position, near, far, viewport)
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// World point to clip space
    #[inline]
    pub fn project(&self, point: Point3<f32>) -> Vector4<f32> {
        self.view_proj * point.to_homogeneous()
    }

    pub fn position_array(&self) -> [f32; 3] {
        self.position.to_vec().into()
    }
}
