use crate::{Interval, Vec3};

/// Axis-aligned bounding box stored as one interval per axis.
///
/// Used for scene bounds, spatial index bounds and the hash-grid extent.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };

    /// Box spanned by two opposite corners, in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let (min, max) = (a.min(b), a.max(b));
        Self {
            x: Interval::new(min.x, max.x),
            y: Interval::new(min.y, max.y),
            z: Interval::new(min.z, max.z),
        }
    }

    /// Tightest box around `points`, `Aabb::EMPTY` if there are none.
    pub fn from_iter_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(p);
            max = max.max(p);
        }
        Self {
            x: Interval::new(min.x, max.x),
            y: Interval::new(min.y, max.y),
            z: Interval::new(min.z, max.z),
        }
    }

    pub fn surrounding(a: &Aabb, b: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&a.x, &b.x),
            y: Interval::surrounding(&a.y, &b.y),
            z: Interval::surrounding(&a.z, &b.z),
        }
    }

    /// Box grown by `amount` on every side.
    pub fn pad(&self, amount: f32) -> Self {
        Self {
            x: self.x.pad(amount),
            y: self.y.pad(amount),
            z: self.z.pad(amount),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.size() < 0.0 || self.y.size() < 0.0 || self.z.size() < 0.0
    }

    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    pub fn size(&self) -> Vec3 {
        self.max() - self.min()
    }

    /// Axis (0 = x, 1 = y, 2 = z) along which the box is widest. Ties go
    /// to the later axis.
    pub fn longest_axis(&self) -> usize {
        let size = self.size();
        if size.x > size.y && size.x > size.z {
            0
        } else if size.y > size.z {
            1
        } else {
            2
        }
    }

    pub fn center(&self) -> Vec3 {
        0.5 * (self.min() + self.max())
    }

    /// Sphere through the corners, as (center, radius).
    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        let center = self.center();
        (center, self.max().distance(center))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}
