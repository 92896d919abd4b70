//! Connection estimators with their MIS weights.
//!
//! Each estimator evaluates one sampling strategy for a pair of sub-path
//! roots and returns the weighted contribution. The `path_count` of the
//! [`MisContext`] is the number of sub-paths the strategy combines a vertex
//! with. Degenerate configurations give `Color::ZERO`.

use crate::light_sampler::PowerLightSampler;
use crate::mis::MisContext;
use crate::path::{EmissionVertex, PathVertex, SensorVertex};
use vcm_core::{Color, Scene, Sensor};
use vcm_math::{Ray, UVec2};

/// Radiance emitted towards an eye vertex that landed on a light (s = 0).
pub fn emitted_radiance(
    eye: &PathVertex,
    scene: &dyn Scene,
    light_sampler: &PowerLightSampler,
    mis: &MisContext,
) -> Color {
    // Escaped vertices would be weighted against environment lights here.
    // The reference scene has none.
    let Some(hit) = eye.surface() else {
        return Color::ZERO;
    };
    if hit.emission == Color::ZERO {
        return Color::ZERO;
    }
    let contrib = eye.throughput * hit.emission;

    let mut rcp_weight = 1.0;
    if eye.depth > 1 {
        let Some(light_id) = hit.light_id else {
            return Color::ZERO;
        };
        let incident = eye.bsdf.incident_direction();
        let pdf = scene.light(light_id).pdf(hit.position, incident);
        let point_pdf = pdf.point_pdf_wrt_area * light_sampler.pdf(light_id);

        rcp_weight += mis.mis(point_pdf / mis.path_count)
            * (eye.d_vcm + mis.mis(pdf.direction_pdf) * eye.d_vc);
    }

    contrib / rcp_weight
}

/// Direct light sampling from an eye vertex (s = 1).
pub fn connect_emission(
    eye: &PathVertex,
    emission: &EmissionVertex,
    scene: &dyn Scene,
    mis: &MisContext,
) -> Color {
    if !emission.is_valid() {
        return Color::ZERO;
    }
    let Some(receiver) = eye.surface_point() else {
        return Color::ZERO;
    };
    let light = scene.light(emission.light_id);
    let Some(di) = light.sample_direct_illumination(emission.position_sample, &receiver) else {
        return Color::ZERO;
    };

    let pdf_wrt_solid_angle = di.pdf_wrt_solid_angle * emission.light_pdf;
    let point_pdf = di.point_pdf_wrt_area * emission.light_pdf;
    if pdf_wrt_solid_angle == 0.0 || point_pdf == 0.0 || di.radiance == Color::ZERO {
        return Color::ZERO;
    }
    let le = di.radiance / pdf_wrt_solid_angle;

    let dir = di.shadow_ray.direction;
    let eval = eye.bsdf.eval(dir);
    if eval.value == Color::ZERO || scene.occluded(&di.shadow_ray, di.shadow_distance) {
        return Color::ZERO;
    }
    let eye_dir_pdf = eye.bsdf.pdf(dir, false);
    let eye_rev_pdf = eye.bsdf.pdf(dir, true);

    let n = mis.path_count;
    let rcp_weight = 1.0
        + mis.mis(eye_dir_pdf * di.jacobian / (n * point_pdf))
        + mis.mis(di.reverse_pdf_wrt_area / n)
            * (mis.vm_weight_factor + eye.d_vcm + mis.mis(eye_rev_pdf) * eye.d_vc);

    eye.throughput * le * eval.value * eval.cos_theta.abs() / rcp_weight
}

/// Connect an eye vertex to a light vertex (s, t >= 2).
pub fn connect_vertices(
    eye: &PathVertex,
    light: &PathVertex,
    scene: &dyn Scene,
    mis: &MisContext,
) -> Color {
    let (Some(eye_hit), Some(light_hit)) = (eye.surface(), light.surface()) else {
        return Color::ZERO;
    };
    let offset = light_hit.position - eye_hit.position;
    let dist_squared = offset.length_squared();
    if dist_squared == 0.0 {
        return Color::ZERO;
    }
    let dir = offset / dist_squared.sqrt();

    let light_eval = light.bsdf.eval(-dir);
    let eye_eval = eye.bsdf.eval(dir);
    let m = light_eval.value * eye_eval.value;
    let cos_at_light = light_eval.cos_theta.abs();
    let cos_at_eye = eye_eval.cos_theta.abs();
    let g = cos_at_eye * cos_at_light / dist_squared;
    if g <= 0.0 || m == Color::ZERO {
        return Color::ZERO;
    }

    let (shadow_ray, shadow_distance) = Ray::segment(
        eye_hit.position,
        eye_hit.normal,
        light_hit.position,
        light_hit.normal,
    );
    if scene.occluded(&shadow_ray, shadow_distance) {
        return Color::ZERO;
    }

    let n = mis.path_count;
    let mut rcp_weight = 1.0;
    {
        let pdf_wrt_area = eye.bsdf.pdf(dir, false) * cos_at_light / dist_squared;
        let light_rev_pdf = light.bsdf.pdf(-dir, true);
        rcp_weight += mis.mis(pdf_wrt_area / n)
            * (mis.vm_weight_factor + light.d_vcm + mis.mis(light_rev_pdf) * light.d_vc);
    }
    {
        let pdf_wrt_area = light.bsdf.pdf(-dir, false) * cos_at_eye / dist_squared;
        let eye_rev_pdf = eye.bsdf.pdf(dir, true);
        rcp_weight += mis.mis(pdf_wrt_area / n)
            * (mis.vm_weight_factor + eye.d_vcm + mis.mis(eye_rev_pdf) * eye.d_vc);
    }

    eye.throughput * light.throughput * m * g / rcp_weight
}

/// Connect a light vertex to the sensor (t = 1). Returns the pixel hit and
/// the weighted contribution, to be scaled by the caller's light path
/// normalization.
pub fn connect_to_sensor(
    light: &PathVertex,
    sensor_vertex: &SensorVertex,
    scene: &dyn Scene,
    sensor: &dyn Sensor,
    mis: &MisContext,
    light_trace_only: bool,
) -> Option<(UVec2, Color)> {
    let receiver = light.surface_point()?;
    let di = sensor.sample_direct_importance(sensor_vertex.lens_sample, &receiver)?;
    if di.importance == 0.0 {
        return None;
    }

    let dir = di.shadow_ray.direction;
    let eval = light.bsdf.eval(dir);
    if eval.cos_theta == 0.0 || eval.value == Color::ZERO {
        return None;
    }
    if scene.occluded(&di.shadow_ray, di.shadow_distance) {
        return None;
    }

    let weight = if light_trace_only {
        1.0
    } else {
        let bsdf_rev_pdf = light.bsdf.pdf(dir, true);
        let w_light = mis.mis(di.reverse_pdf_wrt_area / mis.path_count)
            * (mis.vm_weight_factor + light.d_vcm + mis.mis(bsdf_rev_pdf) * light.d_vc);
        1.0 / (w_light + 1.0)
    };

    let contrib = weight * light.throughput * eval.value * eval.cos_theta.abs() * di.importance;
    Some((di.pixel, contrib))
}

/// Channel offset of the strategy with `s` light vertices among the
/// strategies for paths of `n` vertices (`n >= 3`).
#[inline]
pub fn bpt_strategy_offset(n: u32, s: u32) -> usize {
    (n * (n + 1) / 2 - 3 + s) as usize
}

/// Names of the per-strategy channels for paths up to `max_depth` edges,
/// in channel order.
pub fn strategy_channel_names(max_depth: u32) -> Vec<String> {
    let mut names = Vec::new();
    for depth in 1..=max_depth {
        let vertex_count = depth + 1;
        for s in 0..=vertex_count {
            names.push(format!("strategy_s_{}_t_{}", s, vertex_count - s));
        }
    }
    names
}
