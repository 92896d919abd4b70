//! Parallelogram primitive.
//!
//! Defined by a corner `q` and two edge vectors `u` and `v`. The outward
//! normal is `normalize(u x v)`. Area lights are quads.

use crate::hittable::{HitRecord, Hittable, SurfacePoint};
use vcm_math::{Aabb, Interval, Ray, Vec2, Vec3};

#[derive(Debug, Clone)]
pub struct Quad {
    q: Vec3,
    u: Vec3,
    v: Vec3,
    /// u x v / |u x v|^2, used to project hit points onto the edges
    w: Vec3,
    normal: Vec3,
    d: f32,
    area: f32,
    bbox: Aabb,
}

impl Quad {
    pub fn new(q: Vec3, u: Vec3, v: Vec3) -> Self {
        let n = u.cross(v);
        let area = n.length();
        let normal = n.normalize_or_zero();
        let w = if area > 0.0 { n / n.dot(n) } else { Vec3::ZERO };
        let bbox = Aabb::surrounding(
            &Aabb::from_points(q, q + u + v),
            &Aabb::from_points(q + u, q + v),
        );

        Self {
            q,
            u,
            v,
            w,
            normal,
            d: normal.dot(q),
            area,
            bbox,
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn corner(&self) -> Vec3 {
        self.q
    }

    pub fn edges(&self) -> (Vec3, Vec3) {
        (self.u, self.v)
    }
}

impl Hittable for Quad {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord> {
        let denom = self.normal.dot(ray.direction);

        // Ray is parallel to the plane
        if denom.abs() < 1e-8 {
            return None;
        }

        let t = (self.d - self.normal.dot(ray.origin)) / denom;
        if !ray_t.surrounds(t) {
            return None;
        }

        let planar = ray.at(t) - self.q;
        let alpha = self.w.dot(planar.cross(self.v));
        let beta = self.w.dot(self.u.cross(planar));
        if !(0.0..=1.0).contains(&alpha) || !(0.0..=1.0).contains(&beta) {
            return None;
        }

        Some(HitRecord::new(ray, t, self.normal))
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn area(&self) -> f32 {
        self.area
    }

    fn sample_point(&self, u: Vec2) -> SurfacePoint {
        SurfacePoint::new(self.q + self.u * u.x + self.v * u.y, self.normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> Quad {
        Quad::new(
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(2.0, 0.0, 0.0),
        )
    }

    #[test]
    fn test_quad_normal_and_area() {
        let quad = floor();
        assert!((quad.normal() - Vec3::Y).length() < 1e-6);
        assert!((quad.area() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_quad_hit() {
        let quad = floor();
        let ray = Ray::new(Vec3::new(0.5, 2.0, 0.5), -Vec3::Y);
        let rec = quad.hit(&ray, Interval::forward()).expect("should hit");
        assert!((rec.t - 2.0).abs() < 1e-5);
        assert!(rec.front_face);
    }

    #[test]
    fn test_quad_miss_outside_edges() {
        let quad = floor();
        let ray = Ray::new(Vec3::new(1.5, 2.0, 0.0), -Vec3::Y);
        assert!(quad.hit(&ray, Interval::forward()).is_none());

        let parallel = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::X);
        assert!(quad.hit(&parallel, Interval::forward()).is_none());
    }

    #[test]
    fn test_quad_sample_lies_on_plane() {
        let quad = floor();
        let p = quad.sample_point(Vec2::new(0.25, 0.75));
        assert!(p.position.y.abs() < 1e-6);
        assert!(p.position.x >= -1.0 && p.position.x <= 1.0);
    }
}
