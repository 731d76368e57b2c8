//! Axis-aligned bounding boxes and the capability trait for cullable objects

use cgmath::Point3;

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    pub fn from_arrays(min: [f32; 3], max: [f32; 3]) -> Self {
        Self {
            min: Point3::new(min[0], min[1], min[2]),
            max: Point3::new(max[0], max[1], max[2]),
        }
    }

    /// Box centred on `center` with the given half extents
    pub fn from_center(center: Point3<f32>, half_extents: [f32; 3]) -> Self {
        Self::from_arrays(
            [
                center.x - half_extents[0],
                center.y - half_extents[1],
                center.z - half_extents[2],
            ],
            [
                center.x + half_extents[0],
                center.y + half_extents[1],
                center.z + half_extents[2],
            ],
        )
    }

    pub fn center(&self) -> Point3<f32> {
        Point3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    pub fn half_extents(&self) -> [f32; 3] {
        [
            (self.max.x - self.min.x) * 0.5,
            (self.max.y - self.min.y) * 0.5,
            (self.max.z - self.min.z) * 0.5,
        ]
    }

    /// The eight corners, bit 0 selects x, bit 1 y, bit 2 z
    pub fn corners(&self) -> [Point3<f32>; 8] {
        let mut corners = [self.min; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            corner.x = if i & 1 != 0 { self.max.x } else { self.min.x };
            corner.y = if i & 2 != 0 { self.max.y } else { self.min.y };
            corner.z = if i & 4 != 0 { self.max.z } else { self.min.z };
        }
        corners
    }

    /// A box with NaN or inverted extents cannot be tested meaningfully
    pub fn is_valid(&self) -> bool {
        let finite = [self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z]
            .iter()
            .all(|v| v.is_finite());
        finite && self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }
}

/// Culling bounds reported by an object
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bounds {
    Bounded(Aabb),
    /// Sentinel for objects with no meaningful extent; always visible
    Unbounded,
}

impl Bounds {
    /// Invalid boxes degrade to `Unbounded` so they can never be culled
    pub fn sanitized(self) -> Self {
        match self {
            Bounds::Bounded(aabb) if !aabb.is_valid() => Bounds::Unbounded,
            other => other,
        }
    }
}

impl From<Aabb> for Bounds {
    fn from(aabb: Aabb) -> Self {
        Bounds::Bounded(aabb)
    }
}

/// Capability implemented by every type the visibility engine can test
pub trait Cullable {
    fn cull_bounds(&self) -> Bounds;

    /// Type name matched against `CullingConfig::excluded_types`
    fn cull_type(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners_cover_extents() {
        let aabb = Aabb::from_arrays([0.0, 1.0, 2.0], [3.0, 4.0, 5.0]);
        let corners = aabb.corners();
        assert_eq!(corners[0], Point3::new(0.0, 1.0, 2.0));
        assert_eq!(corners[7], Point3::new(3.0, 4.0, 5.0));
        assert_eq!(corners[5], Point3::new(3.0, 1.0, 5.0));
    }

    #[test]
    fn test_invalid_box_becomes_unbounded() {
        let inverted = Aabb::from_arrays([1.0, 0.0, 0.0], [0.0, 1.0, 1.0]);
        assert_eq!(Bounds::Bounded(inverted).sanitized(), Bounds::Unbounded);

        let nan = Aabb::from_arrays([f32::NAN, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert_eq!(Bounds::Bounded(nan).sanitized(), Bounds::Unbounded);

        let ok = Aabb::from_center(Point3::new(0.0, 0.0, 0.0), [0.5, 0.5, 0.5]);
        assert_eq!(Bounds::Bounded(ok).sanitized(), Bounds::Bounded(ok));
    }
}
