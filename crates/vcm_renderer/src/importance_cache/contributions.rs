//! Contribution estimates of light vertices at importance records, used as
//! distribution weights.

use super::distributions::DistributionKind;
use super::records::ImportanceRecord;
use crate::path::{EmissionVertex, PathVertex};
use vcm_core::{luminance, Color, Scene};
use vcm_math::{Ray, Vec3};

/// Evaluates how much a light vertex would contribute at a record.
pub struct ContributionEvaluator<'a> {
    scene: &'a dyn Scene,
    /// Cosine bound on the incident angle at the record, for
    /// [`DistributionKind::Bounded`]. Never negative.
    cos_max_incident_angle: f32,
}

impl<'a> ContributionEvaluator<'a> {
    pub fn new(scene: &'a dyn Scene, cos_max_incident_angle: f32) -> Self {
        Self {
            scene,
            cos_max_incident_angle: cos_max_incident_angle.max(0.0),
        }
    }

    /// Weight of a surface light vertex. Zero for invalid vertices.
    pub fn light_vertex(&self, kind: DistributionKind, record: &ImportanceRecord, vertex: &PathVertex) -> f32 {
        if vertex.surface().is_none() {
            return 0.0;
        }
        let contrib = match kind {
            DistributionKind::Full => self.connection(record, vertex, true),
            DistributionKind::Unoccluded => self.connection(record, vertex, false),
            DistributionKind::Bounded => self.bounded_connection(record, vertex),
            DistributionKind::Conservative => return 1.0,
        };
        luminance(contrib)
    }

    /// Weight of an emission vertex (direct light sampling from the record).
    pub fn emission_vertex(&self, kind: DistributionKind, record: &ImportanceRecord, emission: &EmissionVertex) -> f32 {
        if !emission.is_valid() {
            return 0.0;
        }
        let contrib = match kind {
            DistributionKind::Full => self.direct_illumination(record, emission, true),
            DistributionKind::Unoccluded => self.direct_illumination(record, emission, false),
            DistributionKind::Bounded => self.bounded_direct_illumination(record, emission),
            DistributionKind::Conservative => return 1.0,
        };
        luminance(contrib)
    }

    fn connection(&self, record: &ImportanceRecord, vertex: &PathVertex, occlusion: bool) -> Color {
        let Some(light_hit) = vertex.surface() else {
            return Color::ZERO;
        };
        let offset = light_hit.position - record.point.position;
        let dist_squared = offset.length_squared();
        if dist_squared == 0.0 {
            return Color::ZERO;
        }
        let wi = offset / dist_squared.sqrt();

        let record_eval = record.bsdf.eval(wi);
        let light_eval = vertex.bsdf.eval(-wi);
        let g = record_eval.cos_theta.abs() * light_eval.cos_theta.abs() / dist_squared;
        let m = record_eval.value * light_eval.value;
        if g <= 0.0 || m == Color::ZERO {
            return Color::ZERO;
        }
        if occlusion {
            let (ray, dist) = Ray::segment(
                record.point.position,
                record.point.normal,
                light_hit.position,
                light_hit.normal,
            );
            if self.scene.occluded(&ray, dist) {
                return Color::ZERO;
            }
        }
        m * g * vertex.throughput
    }

    /// Geometric term maximized over the record's disk: the distance is
    /// shortened by the radius and the angle at the light vertex widened by
    /// the angle the disk subtends.
    fn bounded_geometric_factor(&self, record: &ImportanceRecord, vertex: &PathVertex) -> Option<(f32, Vec3)> {
        let light_hit = vertex.surface()?;
        let offset = light_hit.position - record.point.position;
        let dist = offset.length();
        if dist == 0.0 {
            return None;
        }
        let wi = offset / dist;
        let dist_min = (dist - record.radius).max(0.0);
        if dist_min == 0.0 {
            return None;
        }
        let max_angle_change = -(record.radius / dist).clamp(0.0, 1.0).asin();
        let angle_to_record = light_hit.normal.dot(-wi).clamp(-1.0, 1.0).acos();
        let g = (angle_to_record + max_angle_change).cos().max(0.0) * self.cos_max_incident_angle
            / (dist_min * dist_min);
        Some((g, wi))
    }

    fn bounded_connection(&self, record: &ImportanceRecord, vertex: &PathVertex) -> Color {
        let Some((g, wi)) = self.bounded_geometric_factor(record, vertex) else {
            return Color::ZERO;
        };
        let m = record.bsdf.eval(wi).value * vertex.bsdf.eval(-wi).value;
        m * g * vertex.throughput
    }

    fn direct_illumination(&self, record: &ImportanceRecord, emission: &EmissionVertex, occlusion: bool) -> Color {
        let light = self.scene.light(emission.light_id);
        let Some(di) = light.sample_direct_illumination(emission.position_sample, &record.point) else {
            return Color::ZERO;
        };
        let pdf = di.pdf_wrt_solid_angle * emission.light_pdf;
        if pdf == 0.0 || di.radiance == Color::ZERO {
            return Color::ZERO;
        }
        let eval = record.bsdf.eval(di.shadow_ray.direction);
        let contrib = di.radiance * eval.value * eval.cos_theta.abs() / pdf;
        if contrib == Color::ZERO {
            return Color::ZERO;
        }
        if occlusion && self.scene.occluded(&di.shadow_ray, di.shadow_distance) {
            return Color::ZERO;
        }
        contrib
    }

    fn bounded_direct_illumination(&self, record: &ImportanceRecord, emission: &EmissionVertex) -> Color {
        let light = self.scene.light(emission.light_id);
        let Some((le_max, dir)) =
            light.bounded_direct_illumination(emission.position_sample, &record.point, record.radius)
        else {
            return Color::ZERO;
        };
        record.bsdf.eval(dir).value * self.cos_max_incident_angle * le_max / emission.light_pdf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importance_cache::records::place_uniform;
    use crate::light_sampler::PowerLightSampler;
    use crate::mis::{MisContext, MisHeuristic};
    use crate::path::sample_light_path;
    use crate::rng::RngHandle;
    use vcm_core::presets::{cornell_box, lit_floor};
    use vcm_core::Bsdf;
    use vcm_math::Vec3;

    fn floor_record(scene: &dyn Scene, radius: f32) -> ImportanceRecord {
        let hit = vcm_core::Intersection {
            position: Vec3::new(0.1, 0.0, -0.1),
            normal: Vec3::Y,
            distance: 1.0,
            emission: Color::ZERO,
            light_id: None,
            primitive: 0,
        };
        ImportanceRecord {
            point: hit.surface_point(),
            bsdf: scene.bsdf(&hit, Vec3::Y),
            radius,
            depth: 1,
        }
    }

    #[test]
    fn test_occlusion_only_removes_weight() {
        let (scene, _camera) = cornell_box(16, 16).expect("scene");
        let sampler = PowerLightSampler::new(&scene);
        let mis = MisContext::connection(MisHeuristic::Balance, 1);
        let mut rng = RngHandle::new(42);
        let records = place_uniform(&scene, 64, &mut rng);
        let eval = ContributionEvaluator::new(&scene, 1.0);

        let mut path = vec![PathVertex::invalid(); 3];
        let mut compared = 0;
        for _ in 0..64 {
            let emission = sample_light_path(&mut path, &scene, &sampler, &mis, &mut rng);
            for record in &records {
                let full = eval.emission_vertex(DistributionKind::Full, record, &emission);
                let unoccluded = eval.emission_vertex(DistributionKind::Unoccluded, record, &emission);
                assert!(full <= unoccluded + 1e-6);
                assert!(full.is_finite() && unoccluded.is_finite());

                for vertex in path.iter().filter(|v| v.is_valid()) {
                    let full = eval.light_vertex(DistributionKind::Full, record, vertex);
                    let unoccluded = eval.light_vertex(DistributionKind::Unoccluded, record, vertex);
                    let bounded = eval.light_vertex(DistributionKind::Bounded, record, vertex);
                    assert!(full <= unoccluded + 1e-6);
                    assert!(bounded.is_finite() && bounded >= 0.0);
                    if full > 0.0 {
                        assert_eq!(full, unoccluded);
                        compared += 1;
                    }
                    assert_eq!(eval.light_vertex(DistributionKind::Conservative, record, vertex), 1.0);
                }
            }
        }
        assert!(compared > 0);
    }

    #[test]
    fn test_invalid_vertices_weigh_nothing() {
        let (scene, _camera) = lit_floor(8, 8, 0.5, 10.0).expect("scene");
        let eval = ContributionEvaluator::new(&scene, 1.0);
        let record = floor_record(&scene, 0.1);
        for kind in [
            DistributionKind::Full,
            DistributionKind::Unoccluded,
            DistributionKind::Bounded,
            DistributionKind::Conservative,
        ] {
            assert_eq!(eval.light_vertex(kind, &record, &PathVertex::invalid()), 0.0);
            assert_eq!(eval.emission_vertex(kind, &record, &EmissionVertex::default()), 0.0);
        }
    }

    #[test]
    fn test_direct_illumination_on_lit_floor() {
        let (scene, _camera) = lit_floor(8, 8, 0.5, 10.0).expect("scene");
        let eval = ContributionEvaluator::new(&scene, 1.0);
        let record = floor_record(&scene, 0.05);
        let emission = EmissionVertex::new(0, 1.0, vcm_math::Vec2::splat(0.5));
        let full = eval.emission_vertex(DistributionKind::Full, &record, &emission);
        let bounded = eval.emission_vertex(DistributionKind::Bounded, &record, &emission);
        assert!(full > 0.0);
        assert!(bounded >= full * (1.0 - 1e-4));
    }

    #[test]
    fn test_vertex_inside_record_is_unbounded_and_skipped() {
        let (scene, _camera) = lit_floor(8, 8, 0.5, 10.0).expect("scene");
        let eval = ContributionEvaluator::new(&scene, 1.0);
        let record = floor_record(&scene, 10.0);
        let hit = vcm_core::Intersection {
            position: Vec3::new(0.3, 0.0, 0.0),
            normal: Vec3::Y,
            distance: 1.0,
            emission: Color::ZERO,
            light_id: None,
            primitive: 0,
        };
        let vertex = PathVertex {
            intersection: Some(hit),
            bsdf: Bsdf::new(
                vcm_core::BsdfLobe::Lambertian { albedo: Color::splat(0.5) },
                Vec3::Y,
                Vec3::Y,
            ),
            throughput: Color::ONE,
            path_pdf: 1.0,
            pdf_wrt_area: 1.0,
            depth: 1,
            ..PathVertex::invalid()
        };
        assert_eq!(eval.light_vertex(DistributionKind::Bounded, &record, &vertex), 0.0);
        assert!(eval.light_vertex(DistributionKind::Unoccluded, &record, &vertex) == 0.0);
    }

    #[test]
    fn test_grazing_bound_past_ninety_degrees_is_zero() {
        let (scene, _camera) = lit_floor(8, 8, 0.5, 10.0).expect("scene");
        let record = floor_record(&scene, 0.05);
        let emission = EmissionVertex::new(0, 1.0, vcm_math::Vec2::splat(0.5));
        // cos(120 degrees)
        let eval = ContributionEvaluator::new(&scene, -0.5);
        assert_eq!(eval.emission_vertex(DistributionKind::Bounded, &record, &emission), 0.0);

        let vertex = PathVertex {
            intersection: Some(vcm_core::Intersection {
                position: Vec3::new(1.0, 0.5, 0.0),
                normal: Vec3::NEG_X,
                distance: 1.0,
                emission: Color::ZERO,
                light_id: None,
                primitive: 0,
            }),
            bsdf: Bsdf::new(
                vcm_core::BsdfLobe::Lambertian { albedo: Color::splat(0.5) },
                Vec3::NEG_X,
                Vec3::NEG_X,
            ),
            throughput: Color::ONE,
            path_pdf: 1.0,
            pdf_wrt_area: 1.0,
            depth: 1,
            ..PathVertex::invalid()
        };
        assert_eq!(eval.light_vertex(DistributionKind::Bounded, &record, &vertex), 0.0);

        let upright = ContributionEvaluator::new(&scene, 1.0);
        assert!(upright.emission_vertex(DistributionKind::Bounded, &record, &emission) > 0.0);
    }
}
