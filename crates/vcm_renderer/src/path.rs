//! Path vertices with recursive MIS bookkeeping.
//!
//! Every vertex carries three partial MIS quantities:
//!
//! - `d_vcm`: ratio for the strategy that would have produced this vertex
//!   from the opposite sub-path (connection or merging);
//! - `d_vc`: accumulated ratio over the vertex-connection strategies of the
//!   previous vertices;
//! - `d_vm`: the same for vertex merging.
//!
//! Estimators combine them with the pdfs they evaluate locally, so MIS
//! weights never require walking the path back.

use crate::light_sampler::PowerLightSampler;
use crate::mis::MisContext;
use crate::rng::RngHandle;
use vcm_core::{Bsdf, Color, Intersection, Scene, ScatteringEvent, Sensor, SurfacePoint};
use vcm_math::{Ray, UVec2, Vec2, Vec3};

#[derive(Debug, Clone, Copy)]
pub struct PathVertex {
    /// Surface hit, `None` when the path escaped the scene
    pub intersection: Option<Intersection>,
    pub bsdf: Bsdf,
    /// How the direction reaching this vertex was sampled
    pub sampled_event: ScatteringEvent,
    /// Power (light paths) or importance (eye paths) divided by the path pdf
    pub throughput: Color,
    pub path_pdf: f32,
    /// Density of the last step, with respect to area (solid angle at
    /// infinity)
    pub pdf_wrt_area: f32,
    /// Number of edges from the root
    pub depth: u32,
    pub d_vcm: f32,
    pub d_vc: f32,
    pub d_vm: f32,
}

impl Default for PathVertex {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PathVertex {
    /// Marks a path that ended before reaching this depth.
    pub fn invalid() -> Self {
        Self {
            intersection: None,
            bsdf: Bsdf::escaped(Vec3::ZERO),
            sampled_event: ScatteringEvent::Emission,
            throughput: Color::ZERO,
            path_pdf: 0.0,
            pdf_wrt_area: 0.0,
            depth: 0,
            d_vcm: 0.0,
            d_vc: 0.0,
            d_vm: 0.0,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.path_pdf > 0.0
    }

    /// Valid vertex that escaped the scene.
    #[inline]
    pub fn is_infinite(&self) -> bool {
        self.is_valid() && self.intersection.is_none()
    }

    /// Valid vertex on a surface.
    #[inline]
    pub fn surface(&self) -> Option<&Intersection> {
        if self.is_valid() {
            self.intersection.as_ref()
        } else {
            None
        }
    }

    pub fn surface_point(&self) -> Option<SurfacePoint> {
        self.surface().map(Intersection::surface_point)
    }

    /// First vertex of an eye path, through `pixel`.
    pub fn primary_eye(
        scene: &dyn Scene,
        sensor: &dyn Sensor,
        pixel: UVec2,
        lens_sample: Vec2,
        image_sample: Vec2,
        mis: &MisContext,
    ) -> Self {
        let Some(sample) = sensor.sample_exitant_ray(pixel, lens_sample, image_sample) else {
            return Self::invalid();
        };
        let ray_pdf = sample.origin_pdf * sample.direction_pdf;
        if ray_pdf == 0.0 || sample.value == Color::ZERO {
            return Self::invalid();
        }
        let throughput = sample.value / ray_pdf;

        match scene.intersect(&sample.ray) {
            Some(hit) => Self::primary_hit(
                scene,
                hit,
                &sample.ray,
                throughput,
                sample.origin_pdf,
                sample.direction_pdf,
                sample.origin_cos,
                mis,
            ),
            None => Self {
                intersection: None,
                bsdf: Bsdf::escaped(-sample.ray.direction),
                throughput,
                path_pdf: ray_pdf,
                pdf_wrt_area: sample.direction_pdf,
                depth: 1,
                ..Self::invalid()
            },
        }
    }

    /// First vertex of a light path. Also returns the emission vertex
    /// (light choice and position sample) the path was rooted at; it is
    /// valid even when the emitted ray escapes.
    pub fn primary_light(
        scene: &dyn Scene,
        light_sampler: &PowerLightSampler,
        light_sample: f32,
        position_sample: Vec2,
        direction_sample: Vec2,
        mis: &MisContext,
    ) -> (Self, EmissionVertex) {
        let Some(pick) = light_sampler.sample(light_sample) else {
            return (Self::invalid(), EmissionVertex::default());
        };
        let emission = EmissionVertex {
            light_id: pick.value,
            light_pdf: pick.pdf,
            position_sample,
        };

        let light = scene.light(pick.value);
        let Some(sample) = light.sample_exitant_ray(position_sample, direction_sample) else {
            return (Self::invalid(), emission);
        };
        let ray_pdf = sample.origin_pdf * sample.direction_pdf * pick.pdf;
        if ray_pdf == 0.0 || sample.value == Color::ZERO {
            return (Self::invalid(), emission);
        }
        let throughput = sample.value / ray_pdf;

        let vertex = match scene.intersect(&sample.ray) {
            Some(hit) => Self::primary_hit(
                scene,
                hit,
                &sample.ray,
                throughput,
                sample.origin_pdf,
                sample.direction_pdf,
                sample.origin_cos,
                mis,
            ),
            None => Self::invalid(),
        };
        (vertex, emission)
    }

    #[allow(clippy::too_many_arguments)]
    fn primary_hit(
        scene: &dyn Scene,
        hit: Intersection,
        ray: &Ray,
        throughput: Color,
        origin_pdf: f32,
        direction_pdf: f32,
        origin_cos: f32,
        mis: &MisContext,
    ) -> Self {
        let dist_squared = hit.distance * hit.distance;
        if dist_squared == 0.0 {
            return Self::invalid();
        }
        let cos_at_hit = hit.normal.dot(-ray.direction).abs();
        let pdf_wrt_area = direction_pdf * cos_at_hit / dist_squared;
        let path_pdf = origin_pdf * pdf_wrt_area;
        if pdf_wrt_area == 0.0 || path_pdf == 0.0 {
            return Self::invalid();
        }

        let origin_to_hit_jacobian = origin_cos.abs() / dist_squared;
        let d_vcm = mis.mis(mis.path_count / pdf_wrt_area);
        let d_vc = mis.mis(mis.path_count * origin_to_hit_jacobian / path_pdf);
        let d_vm = if mis.merging {
            d_vc * mis.vc_weight_factor
        } else {
            0.0
        };

        Self {
            bsdf: scene.bsdf(&hit, -ray.direction),
            intersection: Some(hit),
            sampled_event: ScatteringEvent::Emission,
            throughput,
            path_pdf,
            pdf_wrt_area,
            depth: 1,
            d_vcm,
            d_vc,
            d_vm,
        }
    }

    /// Sample the BSDF, trace the scattered ray and write the resulting
    /// vertex into `next`.
    ///
    /// Returns false, leaving `next` untouched, when the path cannot be
    /// extended: from infinity, on a zero BSDF sample, or on a degenerate
    /// hop. Escaping the scene is a successful extension.
    pub fn extend(&self, next: &mut PathVertex, scene: &dyn Scene, mis: &MisContext, u: Vec3) -> bool {
        let Some(hit) = self.surface() else {
            return false;
        };
        let Some(sample) = self.bsdf.sample(u) else {
            return false;
        };
        if sample.pdf == 0.0 || sample.value == Color::ZERO {
            return false;
        }
        let reverse_pdf = self.bsdf.pdf(sample.direction, true);
        let cos_out = sample.cos_theta.abs();
        let ray = Ray::spawn(hit.position, hit.normal, sample.direction);

        let next_hit = scene.intersect(&ray);
        let (pdf_wrt_area, jacobian) = match &next_hit {
            Some(h) => {
                let dist_squared = h.distance * h.distance;
                if dist_squared == 0.0 {
                    return false;
                }
                let cos_in = h.normal.dot(-ray.direction).abs();
                (sample.pdf * cos_in / dist_squared, cos_out / dist_squared)
            }
            None => (sample.pdf, cos_out),
        };
        if pdf_wrt_area == 0.0 {
            return false;
        }

        let (d_vcm, d_vc, d_vm) = if sample.event == ScatteringEvent::Specular && self.bsdf.is_delta() {
            let g = mis.mis(jacobian);
            (0.0, g * self.d_vc, g * self.d_vm)
        } else {
            let g = mis.mis(jacobian / pdf_wrt_area);
            let rev = mis.mis(reverse_pdf);
            let d_vc = g * (mis.vm_weight_factor + self.d_vcm + rev * self.d_vc);
            let d_vm = if mis.merging {
                g * (1.0 + self.d_vcm * mis.vc_weight_factor + rev * self.d_vm)
            } else {
                0.0
            };
            (mis.mis(mis.path_count / pdf_wrt_area), d_vc, d_vm)
        };

        *next = PathVertex {
            bsdf: match &next_hit {
                Some(h) => scene.bsdf(h, -ray.direction),
                None => Bsdf::escaped(-ray.direction),
            },
            intersection: next_hit,
            sampled_event: sample.event,
            throughput: self.throughput * sample.value * (cos_out / sample.pdf),
            path_pdf: self.path_pdf * pdf_wrt_area,
            pdf_wrt_area,
            depth: self.depth + 1,
            d_vcm,
            d_vc,
            d_vm,
        };
        true
    }
}

/// Root of a light path, reused by direct light sampling (s = 1).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EmissionVertex {
    pub light_id: usize,
    /// Probability of having picked the light, zero if none was picked
    pub light_pdf: f32,
    pub position_sample: Vec2,
}

impl EmissionVertex {
    pub fn new(light_id: usize, light_pdf: f32, position_sample: Vec2) -> Self {
        Self {
            light_id,
            light_pdf,
            position_sample,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.light_pdf > 0.0
    }

    /// Pick a light and draw the position sample.
    pub fn sample(light_sampler: &PowerLightSampler, rng: &mut RngHandle) -> Self {
        let light_sample = rng.get_float();
        let position_sample = rng.get_float2();
        match light_sampler.sample(light_sample) {
            Some(pick) => Self::new(pick.value, pick.pdf, position_sample),
            None => Self::default(),
        }
    }
}

/// Root of an eye path, used when a light vertex connects to the sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorVertex {
    pub lens_sample: Vec2,
}

/// Forward walk along a path, keeping only the current vertex and the one
/// being written.
///
/// ```ignore
/// let mut path = Path::new(primary, max_depth);
/// while let Some(vertex) = path.advance(scene, &mis, rng) {
///     // estimators at `vertex`
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Path {
    slots: [PathVertex; 2],
    current: usize,
    max_depth: u32,
    started: bool,
}

impl Path {
    pub fn new(primary: PathVertex, max_depth: u32) -> Self {
        Self {
            slots: [primary, PathVertex::invalid()],
            current: 0,
            max_depth,
            started: false,
        }
    }

    /// Yield the primary vertex on the first call, then extend by one
    /// vertex per call. Returns `None` once the path is done.
    pub fn advance(
        &mut self,
        scene: &dyn Scene,
        mis: &MisContext,
        rng: &mut RngHandle,
    ) -> Option<&PathVertex> {
        if !self.started {
            self.started = true;
            let primary = &self.slots[self.current];
            return (primary.is_valid() && primary.depth <= self.max_depth).then_some(primary);
        }

        let current = self.slots[self.current];
        if !current.is_valid() || current.depth >= self.max_depth {
            self.slots[self.current] = PathVertex::invalid();
            return None;
        }

        let next_index = 1 - self.current;
        if !current.extend(&mut self.slots[next_index], scene, mis, rng.get_float3()) {
            self.slots[self.current] = PathVertex::invalid();
            return None;
        }
        self.current = next_index;
        Some(&self.slots[self.current])
    }
}

/// Sample a light path into `vertices`, one slot per depth. Slots past the
/// end of the path are invalidated, and so is a final vertex at infinity.
pub fn sample_light_path(
    vertices: &mut [PathVertex],
    scene: &dyn Scene,
    light_sampler: &PowerLightSampler,
    mis: &MisContext,
    rng: &mut RngHandle,
) -> EmissionVertex {
    vertices.fill(PathVertex::invalid());

    let light_sample = rng.get_float();
    let position_sample = rng.get_float2();
    let direction_sample = rng.get_float2();
    let (primary, emission) = PathVertex::primary_light(
        scene,
        light_sampler,
        light_sample,
        position_sample,
        direction_sample,
        mis,
    );

    let Some(first) = vertices.first_mut() else {
        return emission;
    };
    *first = primary;
    if !primary.is_valid() {
        return emission;
    }

    let mut last = 0;
    for i in 1..vertices.len() {
        let (done, rest) = vertices.split_at_mut(i);
        if !done[i - 1].extend(&mut rest[0], scene, mis, rng.get_float3()) {
            break;
        }
        last = i;
    }

    if vertices[last].intersection.is_none() {
        vertices[last] = PathVertex::invalid();
    }
    emission
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mis::MisHeuristic;
    use vcm_core::presets::{cornell_box, lit_floor};

    fn mis(path_count: usize) -> MisContext {
        MisContext::connection(MisHeuristic::Balance, path_count)
    }

    #[test]
    fn test_primary_eye_hits_box() {
        let (scene, camera) = cornell_box(32, 32).expect("scene");
        let v = PathVertex::primary_eye(
            &scene,
            &camera,
            UVec2::new(16, 16),
            Vec2::ZERO,
            Vec2::splat(0.5),
            &mis(1024),
        );
        assert!(v.is_valid());
        assert_eq!(v.depth, 1);
        assert!(v.surface().is_some());
        // Pinhole: no jacobian at the origin, so no connection history
        assert_eq!(v.d_vc, 0.0);
        assert!(v.d_vcm > 0.0);
        assert!((v.path_pdf - v.pdf_wrt_area).abs() / v.path_pdf < 1e-5);
    }

    #[test]
    fn test_escaped_eye_vertex_is_valid_and_infinite() {
        let (scene, camera) = lit_floor(16, 16, 0.5, 10.0).expect("scene");
        // Top row looks above the horizon
        let v = PathVertex::primary_eye(
            &scene,
            &camera,
            UVec2::new(8, 0),
            Vec2::ZERO,
            Vec2::splat(0.5),
            &mis(256),
        );
        if v.intersection.is_none() {
            assert!(v.is_infinite());
            let mut next = PathVertex::invalid();
            assert!(!v.extend(&mut next, &scene, &mis(1), Vec3::splat(0.5)));
            assert!(!next.is_valid());
        }
    }

    #[test]
    fn test_path_pdf_recursion() {
        let (scene, camera) = cornell_box(16, 16).expect("scene");
        let sampler = PowerLightSampler::new(&scene);
        let ctx = mis(1);
        let mut rng = RngHandle::new(42);

        for _ in 0..64 {
            let (primary, emission) = PathVertex::primary_light(
                &scene,
                &sampler,
                rng.get_float(),
                rng.get_float2(),
                rng.get_float2(),
                &ctx,
            );
            assert!(emission.is_valid());
            let mut current = primary;
            while current.is_valid() {
                let mut next = PathVertex::invalid();
                if !current.extend(&mut next, &scene, &ctx, rng.get_float3()) || next.depth > 6 {
                    break;
                }
                let expected = current.path_pdf * next.pdf_wrt_area;
                assert!((next.path_pdf - expected).abs() <= 1e-4 * expected.abs());
                assert_eq!(next.depth, current.depth + 1);
                assert!(next.throughput.is_finite());
                current = next;
            }
        }
        let _ = camera;
    }

    #[test]
    fn test_specular_step_resets_d_vcm() {
        let (scene, camera) = cornell_box(64, 64).expect("scene");
        let ctx = mis(64 * 64);
        let mut rng = RngHandle::new(42);
        let mut saw_specular = false;

        for y in 30..64 {
            for x in 0..64 {
                let primary = PathVertex::primary_eye(
                    &scene,
                    &camera,
                    UVec2::new(x, y),
                    Vec2::ZERO,
                    Vec2::splat(0.5),
                    &ctx,
                );
                if !primary.is_valid() || !primary.bsdf.is_delta() {
                    continue;
                }
                let mut next = PathVertex::invalid();
                if primary.extend(&mut next, &scene, &ctx.with_path_count(1), rng.get_float3()) {
                    assert_eq!(next.sampled_event, ScatteringEvent::Specular);
                    assert_eq!(next.d_vcm, 0.0);
                    saw_specular = true;
                }
            }
        }
        assert!(saw_specular, "the mirror sphere should be visible");
    }

    #[test]
    fn test_path_walk_respects_max_depth() {
        let (scene, camera) = cornell_box(16, 16).expect("scene");
        let ctx = mis(1);
        let mut rng = RngHandle::new(42);
        let primary = PathVertex::primary_eye(
            &scene,
            &camera,
            UVec2::new(8, 12),
            Vec2::ZERO,
            Vec2::splat(0.5),
            &ctx,
        );
        let mut path = Path::new(primary, 3);
        let mut depths = Vec::new();
        while let Some(v) = path.advance(&scene, &ctx, &mut rng) {
            depths.push(v.depth);
        }
        assert!(!depths.is_empty());
        assert!(depths.len() <= 3);
        assert_eq!(depths, (1..=depths.len() as u32).collect::<Vec<_>>());
        assert!(path.advance(&scene, &ctx, &mut rng).is_none());
    }

    #[test]
    fn test_light_path_layout() {
        let (scene, _camera) = cornell_box(16, 16).expect("scene");
        let sampler = PowerLightSampler::new(&scene);
        let ctx = mis(1);
        let mut rng = RngHandle::new(42);
        let mut buffer = vec![PathVertex::invalid(); 4];

        for _ in 0..32 {
            let emission = sample_light_path(&mut buffer, &scene, &sampler, &ctx, &mut rng);
            assert!(emission.is_valid());
            let mut ended = false;
            for (i, v) in buffer.iter().enumerate() {
                if v.is_valid() {
                    assert!(!ended, "valid vertex after the end of the path");
                    assert_eq!(v.depth as usize, i + 1);
                    assert!(v.intersection.is_some());
                } else {
                    ended = true;
                }
            }
        }
    }
}
