//! Material trait for surface scattering and emission.

use crate::bsdf::BsdfLobe;
use vcm_math::Vec3;

/// Color type alias (linear RGB)
pub type Color = Vec3;

/// Rec. 709 luminance of a linear RGB color.
#[inline]
pub fn luminance(color: Color) -> f32 {
    0.212671 * color.x + 0.715160 * color.y + 0.072169 * color.z
}

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    /// Scattering lobe at a surface point.
    fn lobe(&self) -> BsdfLobe;

    /// Radiance emitted from the front face. Most materials return black.
    fn emitted(&self) -> Color {
        Color::ZERO
    }
}

/// Lambertian (diffuse) material.
#[derive(Debug, Clone)]
pub struct Lambertian {
    albedo: Color,
}

impl Lambertian {
    /// Create a new Lambertian material with the given albedo color.
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }
}

impl Material for Lambertian {
    fn lobe(&self) -> BsdfLobe {
        BsdfLobe::Lambertian {
            albedo: self.albedo,
        }
    }
}

/// Perfect mirror.
#[derive(Debug, Clone)]
pub struct Mirror {
    reflectance: Color,
}

impl Mirror {
    pub fn new(reflectance: Color) -> Self {
        Self { reflectance }
    }
}

impl Material for Mirror {
    fn lobe(&self) -> BsdfLobe {
        BsdfLobe::Mirror {
            reflectance: self.reflectance,
        }
    }
}

/// Diffuse light emitter. The emitting surface itself does not reflect.
#[derive(Debug, Clone)]
pub struct DiffuseLight {
    emit: Color,
}

impl DiffuseLight {
    /// Create a new diffuse light with the given emission color.
    pub fn new(emit: Color) -> Self {
        Self { emit }
    }
}

impl Material for DiffuseLight {
    fn lobe(&self) -> BsdfLobe {
        BsdfLobe::Black
    }

    fn emitted(&self) -> Color {
        self.emit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_of_white_is_one() {
        assert!((luminance(Color::ONE) - 1.0).abs() < 1e-4);
        assert_eq!(luminance(Color::ZERO), 0.0);
    }

    #[test]
    fn test_light_does_not_scatter() {
        let light = DiffuseLight::new(Color::splat(4.0));
        assert_eq!(light.lobe(), BsdfLobe::Black);
        assert_eq!(light.emitted(), Color::splat(4.0));
        assert_eq!(Lambertian::new(Color::ONE).emitted(), Color::ZERO);
    }
}
