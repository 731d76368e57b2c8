//! Frustum plane extraction and CPU-side box tests
//!
//! The same plane test runs in the culling shaders; this copy backs the CPU
//! reference path and the tests.

use super::aabb::Aabb;
use cgmath::{Matrix4, Vector4};

/// Plane as (normal.xyz, distance); points with a negative signed distance
/// lie outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane(pub Vector4<f32>);

impl Plane {
    pub fn normalized(self) -> Self {
        let v = self.0;
        let length = (v.x * v.x + v.y * v.y + v.z * v.z).sqrt();
        if length > 0.0 {
            Plane(v / length)
        } else {
            self
        }
    }

    #[inline]
    pub fn signed_distance(&self, point: [f32; 3]) -> f32 {
        self.0.x * point[0] + self.0.y * point[1] + self.0.z * point[2] + self.0.w
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.0.x, self.0.y, self.0.z, self.0.w]
    }
}

/// Six clip planes: left, right, bottom, top, near, far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract planes from a view-projection matrix (Gribb/Hartmann).
    ///
    /// The near plane uses row3 + row2, which is exact for [-1, 1] clip depth
    /// and slightly looser (never tighter) for wgpu's [0, 1].
    pub fn from_view_projection(m: &Matrix4<f32>) -> Self {
        let row = |r: usize| Vector4::new(m.x[r], m.y[r], m.z[r], m.w[r]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Plane(r3 + r0).normalized(),
                Plane(r3 - r0).normalized(),
                Plane(r3 + r1).normalized(),
                Plane(r3 - r1).normalized(),
                Plane(r3 + r2).normalized(),
                Plane(r3 - r2).normalized(),
            ],
        }
    }

    /// Conservative box test: false only if the box is fully outside a plane
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let center = aabb.center();
        let half = aabb.half_extents();
        let center = [center.x, center.y, center.z];

        self.planes.iter().all(|plane| {
            let radius = half[0] * plane.0.x.abs() + half[1] * plane.0.y.abs() + half[2] * plane.0.z.abs();
            plane.signed_distance(center) >= -radius
        })
    }

    pub fn as_arrays(&self) -> [[f32; 4]; 6] {
        let mut out = [[0.0; 4]; 6];
        for (dst, plane) in out.iter_mut().zip(self.planes.iter()) {
            *dst = plane.as_array();
        }
        out
    }
}
