//! Light sources.
//!
//! Lights are queried through the [`Light`] trait. Every sampling routine
//! takes its random numbers explicitly and returns `None` when the sample
//! carries no energy, so callers never divide by a zero pdf.

use crate::hittable::{Hittable, SurfacePoint};
use crate::material::Color;
use crate::quad::Quad;
use std::f32::consts::PI;
use vcm_math::{sampling, Frame, Ray, Vec2, Vec3};

/// A ray leaving an emitter (light or sensor) together with its densities.
#[derive(Debug, Clone, Copy)]
pub struct ExitantRay {
    pub ray: Ray,
    /// Emitted quantity, including the cosine at the origin
    pub value: Color,
    /// Density of the origin point with respect to area
    pub origin_pdf: f32,
    /// Density of the direction with respect to solid angle
    pub direction_pdf: f32,
    /// Cosine at the origin, zero for delta-position emitters
    pub origin_cos: f32,
}

/// Emitter point sampled as seen from a receiving surface point.
#[derive(Debug, Clone, Copy)]
pub struct DirectIllumination {
    /// Radiance leaving the light towards the receiver
    pub radiance: Color,
    /// Shadow ray from the receiver towards the light
    pub shadow_ray: Ray,
    pub shadow_distance: f32,
    /// Solid-angle density at the receiver
    pub pdf_wrt_solid_angle: f32,
    /// |cos at light| / dist^2
    pub jacobian: f32,
    /// Density of the sampled light point with respect to area
    pub point_pdf_wrt_area: f32,
    /// Density of reaching the receiver by emitting from the light point,
    /// with respect to the receiver's area
    pub reverse_pdf_wrt_area: f32,
}

/// Emission densities of a point and direction on a light.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmissionPdf {
    pub point_pdf_wrt_area: f32,
    pub direction_pdf: f32,
}

pub trait Light: Send + Sync {
    /// Total emitted power, used to build the light selection distribution.
    fn power(&self) -> Color;

    fn sample_exitant_ray(&self, position_sample: Vec2, direction_sample: Vec2)
        -> Option<ExitantRay>;

    fn sample_direct_illumination(
        &self,
        position_sample: Vec2,
        receiver: &SurfacePoint,
    ) -> Option<DirectIllumination>;

    /// Upper bound of the radiance / pdf reaching any point within `radius`
    /// of the receiver, and the direction from the receiver to the light.
    fn bounded_direct_illumination(
        &self,
        position_sample: Vec2,
        receiver: &SurfacePoint,
        radius: f32,
    ) -> Option<(Color, Vec3)>;

    /// Densities of emitting from `point` along `direction`.
    fn pdf(&self, point: Vec3, direction: Vec3) -> EmissionPdf;
}

/// One-sided parallelogram emitter with uniform radiance and a
/// cosine-distributed emission profile.
#[derive(Debug, Clone)]
pub struct AreaLight {
    shape: Quad,
    radiance: Color,
    frame: Frame,
}

impl AreaLight {
    pub fn new(shape: Quad, radiance: Color) -> Self {
        let frame = Frame::from_normal(shape.normal());
        Self {
            shape,
            radiance,
            frame,
        }
    }

    pub fn shape(&self) -> &Quad {
        &self.shape
    }

    pub fn radiance(&self) -> Color {
        self.radiance
    }

    fn point_pdf(&self) -> f32 {
        1.0 / self.shape.area()
    }

    /// Sample the light point and compute the unit direction and distance
    /// to the receiver. None if the receiver is behind the light.
    fn towards(&self, position_sample: Vec2, receiver: Vec3) -> Option<(SurfacePoint, Vec3, f32, f32)> {
        let point = self.shape.sample_point(position_sample);
        let offset = receiver - point.position;
        let dist = offset.length();
        if dist == 0.0 {
            return None;
        }
        let wo = offset / dist;
        let cos_light = wo.dot(point.normal);
        if cos_light <= 0.0 {
            return None;
        }
        Some((point, wo, dist, cos_light))
    }
}

impl Light for AreaLight {
    fn power(&self) -> Color {
        self.radiance * self.shape.area() * PI
    }

    fn sample_exitant_ray(
        &self,
        position_sample: Vec2,
        direction_sample: Vec2,
    ) -> Option<ExitantRay> {
        let point = self.shape.sample_point(position_sample);
        let (local, direction_pdf) = sampling::cosine_hemisphere(direction_sample);
        if direction_pdf == 0.0 {
            return None;
        }
        let direction = self.frame.to_world(local);
        Some(ExitantRay {
            ray: Ray::spawn(point.position, point.normal, direction),
            value: self.radiance * local.z,
            origin_pdf: self.point_pdf(),
            direction_pdf,
            origin_cos: local.z,
        })
    }

    fn sample_direct_illumination(
        &self,
        position_sample: Vec2,
        receiver: &SurfacePoint,
    ) -> Option<DirectIllumination> {
        let (point, wo, dist, cos_light) = self.towards(position_sample, receiver.position)?;
        let dist2 = dist * dist;
        let point_pdf = self.point_pdf();
        let (shadow_ray, shadow_distance) =
            Ray::segment(receiver.position, receiver.normal, point.position, point.normal);

        Some(DirectIllumination {
            radiance: self.radiance,
            shadow_ray,
            shadow_distance,
            pdf_wrt_solid_angle: point_pdf * dist2 / cos_light,
            jacobian: cos_light / dist2,
            point_pdf_wrt_area: point_pdf,
            reverse_pdf_wrt_area: sampling::cosine_hemisphere_pdf(cos_light)
                * receiver.normal.dot(wo).abs()
                / dist2,
        })
    }

    fn bounded_direct_illumination(
        &self,
        position_sample: Vec2,
        receiver: &SurfacePoint,
        radius: f32,
    ) -> Option<(Color, Vec3)> {
        let (_, wo, dist, cos_light) = self.towards(position_sample, receiver.position)?;
        let max_angle_change = -(radius / dist).clamp(0.0, 1.0).asin();
        let angle_to_receiver = cos_light.clamp(-1.0, 1.0).acos();
        let bound = (angle_to_receiver + max_angle_change).cos().max(0.0);
        let le_max = self.radiance * bound / (self.point_pdf() * dist * dist);
        Some((le_max, -wo))
    }

    fn pdf(&self, _point: Vec3, direction: Vec3) -> EmissionPdf {
        EmissionPdf {
            point_pdf_wrt_area: self.point_pdf(),
            direction_pdf: sampling::cosine_hemisphere_pdf(direction.dot(self.shape.normal())),
        }
    }
}
