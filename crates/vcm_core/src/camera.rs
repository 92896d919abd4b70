//! Sensor trait and a pinhole camera.
//!
//! The image plane sits at the distance where one pixel covers unit area,
//! so importance values are expressed per pixel and splats from light
//! tracing land directly in framebuffer units.

use crate::hittable::SurfacePoint;
use crate::light::ExitantRay;
use crate::material::Color;
use vcm_math::{Ray, UVec2, Vec2, Vec3};

/// Result of connecting a surface point to the sensor.
#[derive(Debug, Clone, Copy)]
pub struct DirectImportance {
    /// Pixel the connection lands in
    pub pixel: UVec2,
    /// Importance divided by the density of the sensor point
    pub importance: f32,
    /// Shadow ray from the receiver towards the sensor
    pub shadow_ray: Ray,
    pub shadow_distance: f32,
    /// Density of reaching the receiver from the sensor, wrt the
    /// receiver's area
    pub reverse_pdf_wrt_area: f32,
}

pub trait Sensor: Send + Sync {
    /// Image size in pixels.
    fn resolution(&self) -> UVec2;

    /// Sensor ray through `pixel`, `image_sample` jittering within it.
    fn sample_exitant_ray(
        &self,
        pixel: UVec2,
        lens_sample: Vec2,
        image_sample: Vec2,
    ) -> Option<ExitantRay>;

    fn sample_direct_importance(
        &self,
        lens_sample: Vec2,
        receiver: &SurfacePoint,
    ) -> Option<DirectImportance>;
}

/// Pinhole camera.
#[derive(Debug, Clone)]
pub struct PinholeCamera {
    image_width: u32,
    image_height: u32,

    // Camera positioning
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,
    vfov: f32, // Vertical field of view in degrees

    // Cached computed values (set by initialize())
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    image_plane_dist: f32,
}

impl PinholeCamera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        let mut camera = Self {
            image_width: 256,
            image_height: 256,
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 60.0,
            forward: -Vec3::Z,
            right: Vec3::X,
            up: Vec3::Y,
            image_plane_dist: 1.0,
        };
        camera.initialize();
        camera
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self.initialize();
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self.initialize();
        self
    }

    /// Set the vertical field of view in degrees.
    pub fn with_fov(mut self, vfov: f32) -> Self {
        self.vfov = vfov;
        self.initialize();
        self
    }

    pub fn position(&self) -> Vec3 {
        self.look_from
    }

    fn initialize(&mut self) {
        self.forward = (self.look_at - self.look_from).normalize_or_zero();
        self.right = self.forward.cross(self.vup).normalize_or_zero();
        self.up = self.right.cross(self.forward);

        let half_height = (self.vfov.to_radians() / 2.0).tan();
        self.image_plane_dist = self.image_height as f32 / (2.0 * half_height);
    }

    /// Solid angle to image area conversion for a direction making
    /// `cos_at_camera` with the optical axis.
    fn image_to_solid_angle(&self, cos_at_camera: f32) -> f32 {
        let image_point_dist = self.image_plane_dist / cos_at_camera;
        image_point_dist * image_point_dist / cos_at_camera
    }
}

impl Default for PinholeCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for PinholeCamera {
    fn resolution(&self) -> UVec2 {
        UVec2::new(self.image_width, self.image_height)
    }

    fn sample_exitant_ray(
        &self,
        pixel: UVec2,
        _lens_sample: Vec2,
        image_sample: Vec2,
    ) -> Option<ExitantRay> {
        let x = pixel.x as f32 + image_sample.x - 0.5 * self.image_width as f32;
        let y = 0.5 * self.image_height as f32 - (pixel.y as f32 + image_sample.y);
        let direction = (self.right * x + self.up * y + self.forward * self.image_plane_dist)
            .normalize_or_zero();

        let cos_at_camera = direction.dot(self.forward);
        if cos_at_camera <= 0.0 {
            return None;
        }
        let pdf = self.image_to_solid_angle(cos_at_camera);

        Some(ExitantRay {
            ray: Ray::new(self.look_from, direction),
            value: Color::splat(pdf),
            origin_pdf: 1.0,
            direction_pdf: pdf,
            origin_cos: 0.0,
        })
    }

    fn sample_direct_importance(
        &self,
        _lens_sample: Vec2,
        receiver: &SurfacePoint,
    ) -> Option<DirectImportance> {
        let to_camera = self.look_from - receiver.position;
        let dist = to_camera.length();
        if dist == 0.0 {
            return None;
        }
        let dir_to_camera = to_camera / dist;
        let cos_at_camera = self.forward.dot(-dir_to_camera);
        if cos_at_camera <= 0.0 {
            return None;
        }

        let scale = self.image_plane_dist / cos_at_camera;
        let image_x = 0.5 * self.image_width as f32 + scale * self.right.dot(-dir_to_camera);
        let image_y = 0.5 * self.image_height as f32 - scale * self.up.dot(-dir_to_camera);
        if image_x < 0.0
            || image_y < 0.0
            || image_x >= self.image_width as f32
            || image_y >= self.image_height as f32
        {
            return None;
        }

        let dist2 = dist * dist;
        let image_to_solid_angle = self.image_to_solid_angle(cos_at_camera);
        let (shadow_ray, shadow_distance) =
            Ray::segment(receiver.position, receiver.normal, self.look_from, Vec3::ZERO);

        Some(DirectImportance {
            pixel: UVec2::new(image_x as u32, image_y as u32),
            importance: image_to_solid_angle / dist2,
            shadow_ray,
            shadow_distance,
            reverse_pdf_wrt_area: image_to_solid_angle * receiver.normal.dot(dir_to_camera).abs()
                / dist2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PinholeCamera {
        PinholeCamera::new()
            .with_resolution(64, 32)
            .with_position(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
            .with_fov(45.0)
    }

    #[test]
    fn test_center_ray_looks_forward() {
        let cam = camera();
        let ray = cam
            .sample_exitant_ray(UVec2::new(32, 16), Vec2::ZERO, Vec2::ZERO)
            .expect("inside image");
        assert!((ray.ray.direction + Vec3::Z).length() < 1e-5);
        assert_eq!(ray.origin_cos, 0.0);
        assert!((ray.value.x - ray.direction_pdf).abs() < 1e-6);
    }

    #[test]
    fn test_direct_importance_projects_back_to_pixel() {
        let cam = camera();
        let pixel = UVec2::new(10, 7);
        let ray = cam
            .sample_exitant_ray(pixel, Vec2::ZERO, Vec2::new(0.5, 0.5))
            .expect("inside image");
        let hit = ray.ray.at(4.0);
        let receiver = SurfacePoint::new(hit, -ray.ray.direction);
        let di = cam
            .sample_direct_importance(Vec2::ZERO, &receiver)
            .expect("visible");
        assert_eq!(di.pixel, pixel);
        // Facing the camera: importance * cos equals the reverse area pdf
        assert!((di.importance - di.reverse_pdf_wrt_area).abs() / di.importance < 1e-3);
    }

    #[test]
    fn test_points_behind_camera_are_rejected() {
        let cam = camera();
        let receiver = SurfacePoint::new(Vec3::new(0.0, 0.0, 10.0), Vec3::Z);
        assert!(cam.sample_direct_importance(Vec2::ZERO, &receiver).is_none());
    }

    #[test]
    fn test_pixel_footprint_is_unit_area() {
        // Integrating the direction pdf over one pixel at the center
        // approximates a unit image-plane area.
        let cam = camera();
        let ray = cam
            .sample_exitant_ray(UVec2::new(32, 16), Vec2::ZERO, Vec2::ZERO)
            .expect("inside image");
        let plane = cam.image_plane_dist;
        assert!((ray.direction_pdf - plane * plane).abs() / (plane * plane) < 1e-4);
    }
}
