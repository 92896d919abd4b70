//! BSDFs bound to a surface point and an incident direction.
//!
//! A [`Bsdf`] is a small `Copy` value: the lobe parameters, the geometric
//! normal and the direction pointing back along the path that reached the
//! point. Every query is expressed relative to that incident direction, so
//! "reverse" pdfs are those of sampling the incident direction from `wo`.

use crate::material::Color;
use std::f32::consts::FRAC_1_PI;
use vcm_math::{sampling, Frame, Vec2, Vec3};

/// How the direction arriving at a path vertex was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScatteringEvent {
    /// Root of a path: emitted by a light or the sensor.
    #[default]
    Emission,
    Diffuse,
    Specular,
}

/// Scattering model of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BsdfLobe {
    /// Absorbs everything.
    Black,
    /// Two-sided diffuse reflection.
    Lambertian { albedo: Color },
    /// Perfect specular reflection.
    Mirror { reflectance: Color },
}

/// Result of importance sampling a BSDF.
#[derive(Debug, Clone, Copy)]
pub struct BsdfSample {
    pub direction: Vec3,
    /// BSDF value for the sampled pair (without the cosine)
    pub value: Color,
    /// Solid-angle density, 1 for delta lobes
    pub pdf: f32,
    /// Cosine between the sampled direction and the geometric normal
    pub cos_theta: f32,
    pub event: ScatteringEvent,
}

/// BSDF value for an explicit outgoing direction.
#[derive(Debug, Clone, Copy)]
pub struct BsdfEval {
    pub value: Color,
    /// Signed cosine between `wo` and the geometric normal
    pub cos_theta: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bsdf {
    lobe: BsdfLobe,
    normal: Vec3,
    incident: Vec3,
}

impl Bsdf {
    pub fn new(lobe: BsdfLobe, normal: Vec3, incident: Vec3) -> Self {
        Self {
            lobe,
            normal,
            incident,
        }
    }

    /// BSDF of a path that escaped the scene. It only remembers the
    /// direction it left along.
    pub fn escaped(incident: Vec3) -> Self {
        Self::new(BsdfLobe::Black, Vec3::ZERO, incident)
    }

    /// Direction pointing back to the previous path vertex.
    pub fn incident_direction(&self) -> Vec3 {
        self.incident
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn lobe(&self) -> BsdfLobe {
        self.lobe
    }

    /// True if the BSDF is a Dirac distribution: it can be sampled but
    /// never evaluated for an explicit direction.
    pub fn is_delta(&self) -> bool {
        matches!(self.lobe, BsdfLobe::Mirror { .. })
    }

    /// Sample an outgoing direction. `u.z` is reserved for lobe selection.
    pub fn sample(&self, u: Vec3) -> Option<BsdfSample> {
        let cos_in = self.incident.dot(self.normal);
        if cos_in == 0.0 {
            return None;
        }

        match self.lobe {
            BsdfLobe::Black => None,
            BsdfLobe::Lambertian { albedo } => {
                let side = if cos_in > 0.0 { self.normal } else { -self.normal };
                let (local, pdf) = sampling::cosine_hemisphere(Vec2::new(u.x, u.y));
                if pdf == 0.0 {
                    return None;
                }
                let direction = Frame::from_normal(side).to_world(local);
                Some(BsdfSample {
                    direction,
                    value: albedo * FRAC_1_PI,
                    pdf,
                    cos_theta: direction.dot(self.normal),
                    event: ScatteringEvent::Diffuse,
                })
            }
            BsdfLobe::Mirror { reflectance } => {
                let direction = 2.0 * cos_in * self.normal - self.incident;
                Some(BsdfSample {
                    direction,
                    value: reflectance / cos_in.abs(),
                    pdf: 1.0,
                    cos_theta: cos_in,
                    event: ScatteringEvent::Specular,
                })
            }
        }
    }

    pub fn eval(&self, wo: Vec3) -> BsdfEval {
        let cos_theta = wo.dot(self.normal);
        let value = match self.lobe {
            BsdfLobe::Lambertian { albedo } if self.same_hemisphere(cos_theta) => {
                albedo * FRAC_1_PI
            }
            _ => Color::ZERO,
        };
        BsdfEval { value, cos_theta }
    }

    /// Solid-angle density of sampling `wo`, or of sampling the incident
    /// direction from `wo` when `reverse` is set.
    pub fn pdf(&self, wo: Vec3, reverse: bool) -> f32 {
        let cos_out = wo.dot(self.normal);
        match self.lobe {
            BsdfLobe::Lambertian { .. } if self.same_hemisphere(cos_out) => {
                let cos = if reverse {
                    self.incident.dot(self.normal)
                } else {
                    cos_out
                };
                cos.abs() * FRAC_1_PI
            }
            _ => 0.0,
        }
    }

    fn same_hemisphere(&self, cos_out: f32) -> bool {
        self.incident.dot(self.normal) * cos_out > 0.0
    }
}
