//! Warps from the unit square to directions and points.
//!
//! All functions take their random numbers as arguments so callers control
//! the sample source. Directions are returned in local coordinates
//! (z up) together with their solid-angle density.

use crate::{Vec2, Vec3};
use std::f32::consts::{FRAC_1_PI, PI};

/// Cosine-weighted direction on the upper hemisphere, with its pdf.
pub fn cosine_hemisphere(u: Vec2) -> (Vec3, f32) {
    let r = u.x.sqrt();
    let phi = 2.0 * PI * u.y;
    let z = (1.0 - u.x).max(0.0).sqrt();
    (Vec3::new(r * phi.cos(), r * phi.sin(), z), z * FRAC_1_PI)
}

#[inline]
pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
    cos_theta.max(0.0) * FRAC_1_PI
}

/// Uniform direction on the upper hemisphere, with its pdf.
pub fn uniform_hemisphere(u: Vec2) -> (Vec3, f32) {
    let z = u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u.y;
    (Vec3::new(r * phi.cos(), r * phi.sin(), z), 0.5 * FRAC_1_PI)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_cosine_hemisphere_pdf_matches() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let u = Vec2::new(rng.gen(), rng.gen());
            let (dir, pdf) = cosine_hemisphere(u);
            assert!((dir.length() - 1.0).abs() < 1e-4);
            assert!(dir.z >= 0.0);
            assert!((pdf - cosine_hemisphere_pdf(dir.z)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cosine_hemisphere_mean_cosine() {
        // E[cos] under p = cos/pi is 2/3
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20000;
        let mean: f32 = (0..n)
            .map(|_| cosine_hemisphere(Vec2::new(rng.gen(), rng.gen())).0.z)
            .sum::<f32>()
            / n as f32;
        assert!((mean - 2.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn test_uniform_hemisphere_is_unit() {
        let (dir, pdf) = uniform_hemisphere(Vec2::new(0.5, 0.25));
        assert!((dir.length() - 1.0).abs() < 1e-5);
        assert!((pdf - 1.0 / (2.0 * PI)).abs() < 1e-6);
    }
}
