use crate::{Vec3, RAY_EPSILON};

/// A ray with a unit-length direction.
///
/// Distances returned by intersection routines are measured along
/// `direction`, so they are true euclidean distances.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray. The direction is normalized.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Spawn a ray leaving a surface point, offset along the normal on the
    /// side the direction points to.
    pub fn spawn(point: Vec3, normal: Vec3, direction: Vec3) -> Self {
        let side = if normal.dot(direction) >= 0.0 { 1.0 } else { -1.0 };
        Self::new(point + normal * (side * RAY_EPSILON), direction)
    }

    /// Spawn a shadow ray between two surface points.
    ///
    /// Returns the ray and the distance to test against, already shortened
    /// by the offsets applied at both ends.
    pub fn segment(from: Vec3, from_normal: Vec3, to: Vec3, to_normal: Vec3) -> (Self, f32) {
        let dir = to - from;
        let side_from = if from_normal.dot(dir) >= 0.0 { 1.0 } else { -1.0 };
        let side_to = if to_normal.dot(-dir) >= 0.0 { 1.0 } else { -1.0 };
        let start = from + from_normal * (side_from * RAY_EPSILON);
        let end = to + to_normal * (side_to * RAY_EPSILON);
        let delta = end - start;
        let dist = delta.length();
        (Self::new(start, delta), (dist - RAY_EPSILON).max(0.0))
    }

    /// Get the point along the ray at parameter t.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(ray.direction, Vec3::Y);
        assert_eq!(ray.at(2.0), Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_spawn_offsets_towards_direction() {
        let ray = Ray::spawn(Vec3::ZERO, Vec3::Y, Vec3::new(0.0, -1.0, 1.0));
        assert!(ray.origin.y < 0.0);

        let ray = Ray::spawn(Vec3::ZERO, Vec3::Y, Vec3::new(0.0, 1.0, 1.0));
        assert!(ray.origin.y > 0.0);
    }

    #[test]
    fn test_segment_is_shortened() {
        let from = Vec3::ZERO;
        let to = Vec3::new(0.0, 0.0, 2.0);
        let (ray, dist) = Ray::segment(from, Vec3::Z, to, -Vec3::Z);
        assert!(dist < 2.0);
        assert!(dist > 1.99);
        assert!((ray.direction - Vec3::Z).length() < 1e-6);
    }
}
