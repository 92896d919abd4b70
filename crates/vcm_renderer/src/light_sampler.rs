//! Light selection proportional to emitted power.

use crate::distribution::{Distribution1D, Sample};
use vcm_core::{luminance, Scene};

#[derive(Debug, Clone, Default)]
pub struct PowerLightSampler {
    distribution: Distribution1D,
}

impl PowerLightSampler {
    pub fn new(scene: &dyn Scene) -> Self {
        let weights: Vec<f32> = (0..scene.light_count())
            .map(|i| luminance(scene.light(i).power()))
            .collect();
        Self {
            distribution: Distribution1D::new(&weights),
        }
    }

    pub fn light_count(&self) -> usize {
        self.distribution.len()
    }

    /// Pick a light. `None` if the scene has no emitting light.
    pub fn sample(&self, u: f32) -> Option<Sample<usize>> {
        self.distribution.sample(u)
    }

    /// Probability of picking light `light_id`.
    pub fn pdf(&self, light_id: usize) -> f32 {
        self.distribution.pdf(light_id)
    }
}
