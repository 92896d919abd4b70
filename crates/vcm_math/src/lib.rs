//! Math types shared by the light-transport crates.
//!
//! Re-exports glam and adds the small geometric vocabulary the engine
//! speaks: rays, parametric intervals, bounding boxes, shading frames and
//! the sample warps used to turn uniform numbers into directions and points.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod frame;
mod interval;
mod ray;
pub mod sampling;

pub use aabb::Aabb;
pub use frame::Frame;
pub use interval::Interval;
pub use ray::Ray;

/// Offset applied along the normal when spawning secondary rays.
pub const RAY_EPSILON: f32 = 1e-4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.dot(b), 32.0);
    }
}
