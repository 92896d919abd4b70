//! Hittable trait and HitRecord for ray-shape intersection.

use vcm_math::{Aabb, Interval, Ray, Vec2, Vec3};

/// A point on a surface with its outward unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub position: Vec3,
    pub normal: Vec3,
}

impl SurfacePoint {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }
}

/// Record of a ray-shape intersection.
#[derive(Debug, Clone, Copy)]
pub struct HitRecord {
    /// Point of intersection
    pub p: Vec3,
    /// Outward surface normal, not flipped towards the ray
    pub normal: Vec3,
    /// Distance along the (unit) ray direction
    pub t: f32,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
}

impl HitRecord {
    /// Build a record, deriving `front_face` from the ray direction.
    pub fn new(ray: &Ray, t: f32, outward_normal: Vec3) -> Self {
        Self {
            p: ray.at(t),
            normal: outward_normal,
            t,
            front_face: ray.direction.dot(outward_normal) < 0.0,
        }
    }
}

/// Shapes that can be hit by rays and sampled uniformly by area.
pub trait Hittable: Send + Sync {
    /// Closest intersection within `ray_t`, if any.
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord>;

    /// Get the axis-aligned bounding box of this object.
    fn bounding_box(&self) -> Aabb;

    /// Total surface area.
    fn area(&self) -> f32;

    /// Point distributed uniformly over the surface (pdf = 1 / area).
    fn sample_point(&self, u: Vec2) -> SurfacePoint;
}
