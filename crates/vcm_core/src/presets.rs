//! Small reference scenes used by examples and tests.

use crate::camera::PinholeCamera;
use crate::error::SceneResult;
use crate::material::{Color, Lambertian, Mirror};
use crate::quad::Quad;
use crate::scene::{GeometryScene, SceneBuilder};
use crate::sphere::Sphere;
use vcm_math::Vec3;

/// Classic Cornell box spanning [-1, 1]^3 with an open front, a square
/// ceiling light, a mirror sphere and a diffuse sphere.
pub fn cornell_box(width: u32, height: u32) -> SceneResult<(GeometryScene, PinholeCamera)> {
    let white = Lambertian::new(Color::new(0.73, 0.73, 0.73));

    let mut builder = SceneBuilder::new();
    builder
        // floor, ceiling, back
        .add(
            Quad::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(0.0, 0.0, 2.0), Vec3::new(2.0, 0.0, 0.0)),
            white.clone(),
        )
        .add(
            Quad::new(Vec3::new(-1.0, 1.0, -1.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0)),
            white.clone(),
        )
        .add(
            Quad::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)),
            white.clone(),
        )
        // left (red), right (green)
        .add(
            Quad::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 0.0, 2.0)),
            Lambertian::new(Color::new(0.65, 0.05, 0.05)),
        )
        .add(
            Quad::new(Vec3::new(1.0, -1.0, -1.0), Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.0, 2.0, 0.0)),
            Lambertian::new(Color::new(0.12, 0.45, 0.15)),
        )
        .add(Sphere::new(Vec3::new(-0.45, -0.6, -0.3), 0.4), Mirror::new(Color::splat(0.9)))
        .add(Sphere::new(Vec3::new(0.45, -0.6, 0.3), 0.4), white)
        .add_area_light(
            Quad::new(
                Vec3::new(-0.25, 0.999, -0.25),
                Vec3::new(0.5, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 0.5),
            ),
            Color::splat(12.0),
        );

    let camera = PinholeCamera::new()
        .with_resolution(width, height)
        .with_position(Vec3::new(0.0, 0.0, 3.4), Vec3::ZERO, Vec3::Y)
        .with_fov(40.0);

    Ok((builder.build()?, camera))
}

/// A single diffuse floor lit by a small square light at height one.
pub fn lit_floor(width: u32, height: u32, albedo: f32, radiance: f32) -> SceneResult<(GeometryScene, PinholeCamera)> {
    let mut builder = SceneBuilder::new();
    builder
        .add(
            Quad::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 10.0), Vec3::new(10.0, 0.0, 0.0)),
            Lambertian::new(Color::splat(albedo)),
        )
        .add_area_light(
            Quad::new(
                Vec3::new(-0.1, 1.0, -0.1),
                Vec3::new(0.2, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 0.2),
            ),
            Color::splat(radiance),
        );

    let camera = PinholeCamera::new()
        .with_resolution(width, height)
        .with_position(Vec3::new(2.0, 2.5, 0.0), Vec3::ZERO, Vec3::Y)
        .with_fov(30.0);

    Ok((builder.build()?, camera))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    #[test]
    fn test_cornell_box_builds() {
        let (scene, _camera) = cornell_box(16, 16).expect("valid scene");
        assert_eq!(scene.light_count(), 1);
        assert_eq!(scene.primitive_count(), 8);
        let (_, radius) = scene.bounding_box().bounding_sphere();
        assert!(radius > 1.7 && radius < 1.8);
    }

    #[test]
    fn test_lit_floor_light_faces_floor() {
        let (scene, _camera) = lit_floor(8, 8, 0.5, 10.0).expect("valid scene");
        assert!(scene.lights()[0].shape().normal().y < 0.0);
    }
}
