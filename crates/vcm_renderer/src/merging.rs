//! Vertex merging: density estimation over the light vertices of a frame.

use crate::hash_grid::HashGrid;
use crate::mis::{MisContext, MisHeuristic};
use crate::path::PathVertex;
use std::f32::consts::PI;
use vcm_core::Color;
use vcm_math::Vec3;

/// Smallest merging radius, for numeric stability.
pub const MIN_MERGE_RADIUS: f32 = 1e-7;

/// Merging radius for `iteration` (zero based), shrinking as
/// `(iteration + 1)^(-(1 - alpha) / 2)`.
pub fn merge_radius(base_radius: f32, iteration: u32, alpha: f32) -> f32 {
    let radius = base_radius / ((iteration + 1) as f32).powf(0.5 * (1.0 - alpha));
    radius.max(MIN_MERGE_RADIUS)
}

/// Per-frame merging constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeFactors {
    pub radius: f32,
    /// Divides merged energy by the disk area and the light path count
    pub normalization: f32,
    pub vc_weight_factor: f32,
    pub vm_weight_factor: f32,
}

impl MergeFactors {
    pub fn new(
        radius: f32,
        light_path_count: usize,
        heuristic: MisHeuristic,
        use_vc: bool,
        use_vm: bool,
    ) -> Self {
        let disk_area = PI * radius * radius;
        let paths = light_path_count.max(1) as f32;
        let eta_vcm = disk_area * paths;
        Self {
            radius,
            normalization: 1.0 / eta_vcm,
            vc_weight_factor: if use_vc { heuristic.weight(1.0 / eta_vcm) } else { 0.0 },
            vm_weight_factor: if use_vm { heuristic.weight(eta_vcm) } else { 0.0 },
        }
    }
}

/// Range-search structure over the mergeable light vertices of a frame.
#[derive(Debug, Clone, Default)]
pub struct VertexMerger {
    grid: HashGrid,
    /// Light buffer index of each grid point
    vertex_indices: Vec<u32>,
    normalization: f32,
}

impl VertexMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every valid, non-delta surface vertex of `vertices`.
    pub fn build(&mut self, vertices: &[PathVertex], factors: &MergeFactors) {
        self.vertex_indices.clear();
        let mut positions = Vec::with_capacity(vertices.len());
        for (i, v) in vertices.iter().enumerate() {
            if let Some(hit) = v.surface() {
                if !v.bsdf.is_delta() {
                    self.vertex_indices.push(i as u32);
                    positions.push(hit.position);
                }
            }
        }
        self.grid.build(&positions, factors.radius);
        self.normalization = factors.normalization;
        log::debug!("Vertex merger: {} mergeable light vertices", positions.len());
    }

    pub fn len(&self) -> usize {
        self.vertex_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_indices.is_empty()
    }

    /// Merge `eye` with every light vertex within the radius. Calls
    /// `f(total_depth, contribution)` per accepted vertex; contributions
    /// include the eye throughput and the normalization.
    ///
    /// Weights are dropped when `ppm` is set.
    pub fn merge(
        &self,
        eye: &PathVertex,
        vertices: &[PathVertex],
        max_depth: u32,
        mis: &MisContext,
        ppm: bool,
        mut f: impl FnMut(u32, Color),
    ) {
        let Some(eye_hit) = eye.surface() else {
            return;
        };
        if eye.bsdf.is_delta() {
            return;
        }
        let scale = eye.throughput * self.normalization;

        self.grid.process(eye_hit.position, |point| {
            let light = &vertices[self.vertex_indices[point as usize] as usize];
            let total_depth = light.depth + eye.depth;
            if total_depth > max_depth {
                return;
            }
            let light_dir: Vec3 = light.bsdf.incident_direction();
            if light_dir.dot(eye_hit.normal) < 0.0 {
                return;
            }
            let fr = eye.bsdf.eval(light_dir).value;
            if fr == Color::ZERO {
                return;
            }

            let weight = if ppm {
                1.0
            } else {
                let dir_pdf = eye.bsdf.pdf(light_dir, false);
                let rev_pdf = eye.bsdf.pdf(light_dir, true);
                let w_light = light.d_vcm * mis.vc_weight_factor + light.d_vm * mis.mis(dir_pdf);
                let w_camera = eye.d_vcm * mis.vc_weight_factor + eye.d_vm * mis.mis(rev_pdf);
                1.0 / (w_light + 1.0 + w_camera)
            };

            f(total_depth, scale * weight * fr * light.throughput);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light_sampler::PowerLightSampler;
    use crate::path::sample_light_path;
    use crate::rng::RngHandle;
    use vcm_core::presets::lit_floor;
    use vcm_core::{Intersection, Scene, ScatteringEvent};

    #[test]
    fn test_radius_shrinks() {
        let r0 = merge_radius(1.0, 0, 0.75);
        let r9 = merge_radius(1.0, 9, 0.75);
        assert_eq!(r0, 1.0);
        assert!((r9 - 10f32.powf(-0.125)).abs() < 1e-6);
        assert_eq!(merge_radius(0.0, 3, 0.75), MIN_MERGE_RADIUS);
    }

    #[test]
    fn test_factors_for_disabled_techniques() {
        let f = MergeFactors::new(0.1, 100, MisHeuristic::Balance, false, true);
        let eta = PI * 0.01 * 100.0;
        assert_eq!(f.vc_weight_factor, 0.0);
        assert!((f.vm_weight_factor - eta).abs() < 1e-4);
        assert!((f.normalization - 1.0 / eta).abs() < 1e-6);

        let f = MergeFactors::new(0.1, 100, MisHeuristic::Balance, true, false);
        assert_eq!(f.vm_weight_factor, 0.0);
        assert!((f.vc_weight_factor - 1.0 / eta).abs() < 1e-6);
    }

    fn floor_eye(scene: &dyn Scene) -> PathVertex {
        let hit = Intersection {
            position: Vec3::new(0.2, 0.0, 0.1),
            normal: Vec3::Y,
            distance: 1.0,
            emission: Color::ZERO,
            light_id: None,
            primitive: 0,
        };
        PathVertex {
            bsdf: scene.bsdf(&hit, Vec3::Y),
            intersection: Some(hit),
            sampled_event: ScatteringEvent::Emission,
            throughput: Color::ONE,
            path_pdf: 1.0,
            pdf_wrt_area: 1.0,
            depth: 1,
            d_vcm: 0.0,
            d_vc: 0.0,
            d_vm: 0.0,
        }
    }

    fn light_vertices(scene: &dyn Scene, count: usize, mis: &MisContext) -> Vec<PathVertex> {
        let sampler = PowerLightSampler::new(scene);
        let mut rng = RngHandle::new(42);
        let depth = 2;
        let mut buffer = vec![PathVertex::invalid(); count * depth];
        for path in buffer.chunks_mut(depth) {
            sample_light_path(path, scene, &sampler, mis, &mut rng);
        }
        buffer
    }

    #[test]
    fn test_merging_vanishes_with_radius() {
        let (scene, _camera) = lit_floor(8, 8, 0.5, 10.0).expect("scene");
        let eye = floor_eye(&scene);
        let paths = 2000;

        let gathered = |radius: f32| {
            let factors = MergeFactors::new(radius, paths, MisHeuristic::Balance, false, true);
            let mis = MisContext::vertex_merging(
                MisHeuristic::Balance,
                1,
                factors.vc_weight_factor,
                factors.vm_weight_factor,
            );
            let vertices = light_vertices(&scene, paths, &mis);
            let mut merger = VertexMerger::new();
            merger.build(&vertices, &factors);
            assert!(!merger.is_empty());

            let mut count = 0;
            let mut sum = Color::ZERO;
            merger.merge(&eye, &vertices, 4, &mis, true, |depth, c| {
                assert!(depth >= 2);
                assert!(c.is_finite());
                count += 1;
                sum += c;
            });
            (count, sum)
        };

        let (wide_count, wide_sum) = gathered(0.5);
        assert!(wide_count > 0);
        assert!(wide_sum.x > 0.0);

        let (tiny_count, tiny_sum) = gathered(1e-6);
        assert_eq!(tiny_count, 0);
        assert_eq!(tiny_sum, Color::ZERO);
    }

    #[test]
    fn test_merge_respects_max_depth_and_side() {
        let (scene, _camera) = lit_floor(8, 8, 0.5, 10.0).expect("scene");
        let factors = MergeFactors::new(0.5, 500, MisHeuristic::Balance, true, true);
        let mis = MisContext::vertex_merging(
            MisHeuristic::Balance,
            1,
            factors.vc_weight_factor,
            factors.vm_weight_factor,
        );
        let vertices = light_vertices(&scene, 500, &mis);
        let mut merger = VertexMerger::new();
        merger.build(&vertices, &factors);

        let eye = floor_eye(&scene);
        let mut calls = 0;
        merger.merge(&eye, &vertices, 1, &mis, false, |_, _| calls += 1);
        assert_eq!(calls, 0, "every merged path has at least two edges");

        // Seen from below the floor, light arrives from the other side
        let below = PathVertex {
            bsdf: scene.bsdf(eye.surface().expect("surface"), -Vec3::Y),
            intersection: eye.intersection.map(|h| Intersection { normal: -Vec3::Y, ..h }),
            ..eye
        };
        merger.merge(&below, &vertices, 8, &mis, false, |_, _| calls += 1);
        assert_eq!(calls, 0);
    }
}
