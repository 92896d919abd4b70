//! Importance records: shading points at which light vertex distributions
//! are cached, their placement and their lookup.

use crate::kd_tree::{KdTree, Neighbour};
use crate::rng::RngHandle;
use crate::sampling::{jittered_1d, jittered_2d};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use vcm_core::{Bsdf, Color, Intersection, Scene, Sensor, SurfacePoint};
use vcm_math::{sampling, Frame, Ray, UVec2, Vec2, Vec3};

#[derive(Debug, Clone, Copy)]
pub struct ImportanceRecord {
    pub point: SurfacePoint,
    pub bsdf: Bsdf,
    /// Radius of the surface region the record stands for
    pub radius: f32,
    /// Eye path depth the record was placed at, 0 for records spread over
    /// the scene surface
    pub depth: u32,
}

impl ImportanceRecord {
    fn from_hit(scene: &dyn Scene, hit: &Intersection, incident: Vec3, radius: f32, depth: u32) -> Self {
        Self {
            point: hit.surface_point(),
            bsdf: scene.bsdf(hit, incident),
            radius,
            depth,
        }
    }
}

/// Place about `count` records uniformly over the scene surface.
///
/// The count is rounded down to a square `N x N` so that position samples
/// can be stratified. Each record gets a BSDF bound to a uniformly sampled
/// incident direction.
pub fn place_uniform(scene: &dyn Scene, count: usize, rng: &mut RngHandle) -> Vec<ImportanceRecord> {
    let n = ((count as f32).sqrt() as usize).max(1);
    let total = n * n;

    let mut primitive_samples: Vec<f32> = (0..total)
        .map(|i| jittered_1d(i, total, rng.get_float()))
        .collect();
    rng.shuffle(&mut primitive_samples);
    let mut position_samples: Vec<Vec2> = (0..total)
        .map(|i| jittered_2d(i, n, n, rng.get_float2()))
        .collect();
    rng.shuffle(&mut position_samples);

    let radius = (scene.surface_area() / (total as f32 * PI)).sqrt();

    let mut records = Vec::with_capacity(total);
    for (&primitive_sample, &position_sample) in primitive_samples.iter().zip(&position_samples) {
        let Some(sample) = scene.sample_surface(primitive_sample, position_sample) else {
            continue;
        };
        let (local, _) = sampling::uniform_hemisphere(rng.get_float2());
        let incident = Frame::from_normal(sample.point.normal).to_world(local);
        let hit = Intersection {
            position: sample.point.position,
            normal: sample.point.normal,
            distance: 0.0,
            emission: Color::ZERO,
            light_id: None,
            primitive: sample.primitive,
        };
        records.push(ImportanceRecord::from_hit(scene, &hit, incident, radius, 0));
    }
    records
}

/// Place records at the primary hits of a jittered screen grid and along
/// BSDF-sampled continuations of those rays, up to `max_eye_depth` records
/// per cell.
///
/// The grid has about `density * width * height` cells and keeps the image
/// aspect ratio. A record's radius is the footprint of its grid cell on
/// the surface, carried through each bounce.
pub fn place_screen_grid(
    scene: &dyn Scene,
    sensor: &dyn Sensor,
    density: f32,
    max_eye_depth: u32,
    rng: &mut RngHandle,
) -> Vec<ImportanceRecord> {
    let resolution = sensor.resolution();
    let image_size = resolution.as_vec2();
    if resolution.x == 0 || resolution.y == 0 {
        return Vec::new();
    }

    let grid_height = density.sqrt() * image_size.y;
    let grid_width = grid_height * image_size.x / image_size.y;
    let grid = UVec2::new((grid_width as u32).max(1), (grid_height as u32).max(1));

    let screen_radius = (1.0 / grid.x as f32).max(1.0 / grid.y as f32);
    let screen_area = PI * screen_radius * screen_radius;
    // Camera pdfs are per unit pixel area
    let image_area = image_size.x * image_size.y;

    let cell_count = (grid.x * grid.y) as usize;
    let mut records = Vec::with_capacity(cell_count);
    for k in 0..cell_count {
        let s = jittered_2d(k, grid.x as usize, grid.y as usize, rng.get_float2());
        let image_point = s * image_size;
        let pixel = image_point.floor().as_uvec2().min(resolution - UVec2::ONE);
        let image_sample = image_point - pixel.as_vec2();

        let Some(exitant) = sensor.sample_exitant_ray(pixel, Vec2::splat(0.5), image_sample) else {
            continue;
        };
        let Some(mut hit) = scene.intersect(&exitant.ray) else {
            continue;
        };
        let dist_squared = hit.distance * hit.distance;
        let pdf_wrt_area =
            exitant.direction_pdf * hit.normal.dot(-exitant.ray.direction).abs() / dist_squared.max(f32::MIN_POSITIVE);
        if !(pdf_wrt_area > 0.0) || !pdf_wrt_area.is_finite() {
            continue;
        }
        let image_to_surface = image_area / pdf_wrt_area;
        let mut radius = (screen_area * image_to_surface / PI).sqrt();

        let mut record = ImportanceRecord::from_hit(scene, &hit, -exitant.ray.direction, radius, 1);
        records.push(record);

        for depth in 1..max_eye_depth {
            let Some(sample) = record.bsdf.sample(rng.get_float3()) else {
                break;
            };
            if sample.pdf == 0.0 || sample.value == Color::ZERO {
                break;
            }
            let ray = Ray::spawn(hit.position, hit.normal, sample.direction);
            let Some(next) = scene.intersect(&ray) else {
                break;
            };
            let cos_in = next.normal.dot(-sample.direction).abs();
            if cos_in == 0.0 {
                break;
            }
            let footprint = PI * radius * radius * sample.cos_theta.abs() / cos_in;
            radius = (footprint / PI).sqrt();
            hit = next;
            record = ImportanceRecord::from_hit(scene, &hit, -sample.direction, radius, depth + 1);
            records.push(record);
        }
    }
    records
}

/// Per-worker buffers for [`RecordSet::nearest`].
#[derive(Debug, Clone, Default)]
pub struct NearestRecordScratch {
    neighbours: Vec<Neighbour>,
    ranked: Vec<(f32, u32)>,
    selected: Vec<u32>,
}

impl NearestRecordScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The records of a frame with their k-d tree.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<ImportanceRecord>,
    tree: KdTree,
    orientation_trade_off: f32,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.tree = KdTree::new();
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ImportanceRecord>) {
        self.records.extend(records);
    }

    /// Index the records by position. Orientation differences are weighted
    /// against distances relative to the scene extent.
    pub fn build_tree(&mut self, scene: &dyn Scene) {
        let positions: Vec<Vec3> = self.records.iter().map(|r| r.point.position).collect();
        self.tree.build(&positions);
        let extent = scene.bounding_box().size().length();
        self.orientation_trade_off = if extent > 0.0 { 0.5 / extent } else { 0.0 };
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> &ImportanceRecord {
        &self.records[index]
    }

    pub fn records(&self) -> &[ImportanceRecord] {
        &self.records
    }

    /// The `k` best records for `point`.
    ///
    /// `unfiltered` candidates are gathered by distance, then ranked by
    /// distance plus an orientation penalty `trade_off * sqrt(|1 - n.n_r|)`.
    pub fn nearest<'s>(
        &self,
        point: &SurfacePoint,
        k: usize,
        unfiltered: usize,
        scratch: &'s mut NearestRecordScratch,
    ) -> &'s [u32] {
        scratch.selected.clear();
        if self.tree.is_empty() || k == 0 {
            return &scratch.selected;
        }

        self.tree.k_nearest(
            point.position,
            unfiltered.max(k),
            |i| self.records[i as usize].radius > 0.0,
            &mut scratch.neighbours,
        );

        scratch.ranked.clear();
        for neighbour in &scratch.neighbours {
            let record = &self.records[neighbour.index as usize];
            let misalignment = (1.0 - point.normal.dot(record.point.normal)).abs().sqrt();
            let metric = neighbour.distance_squared.sqrt() + self.orientation_trade_off * misalignment;
            scratch.ranked.push((metric, neighbour.index));
        }
        scratch
            .ranked
            .sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        scratch
            .selected
            .extend(scratch.ranked.iter().take(k).map(|&(_, index)| index));
        &scratch.selected
    }
}

/// Debug color of record `index`, stable across frames and runs.
pub fn record_color(index: u32) -> Color {
    let mut rng = StdRng::seed_from_u64(index as u64);
    Color::new(rng.gen(), rng.gen(), rng.gen())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcm_core::presets::{cornell_box, lit_floor};

    #[test]
    fn test_uniform_placement_rounds_to_square() {
        let (scene, _camera) = cornell_box(16, 16).expect("scene");
        let mut rng = RngHandle::new(42);
        let records = place_uniform(&scene, 50, &mut rng);
        assert_eq!(records.len(), 49);

        let expected = (scene.surface_area() / (49.0 * PI)).sqrt();
        for r in &records {
            assert!((r.radius - expected).abs() < 1e-5);
            assert_eq!(r.depth, 0);
            assert!((r.point.normal.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_screen_grid_records_follow_eye_paths() {
        let (scene, camera) = cornell_box(64, 48).expect("scene");
        let mut rng = RngHandle::new(42);
        let records = place_screen_grid(&scene, &camera, 0.01, 3, &mut rng);
        assert!(!records.is_empty());

        // 0.1 * 48 = 4.8 rows, 4.8 * 64 / 48 = 6.4 columns
        let primary = records.iter().filter(|r| r.depth == 1).count();
        assert!(primary <= 6 * 4);
        assert!(records.iter().all(|r| (1..=3).contains(&r.depth)));
        assert!(records.iter().all(|r| r.radius > 0.0 && r.radius.is_finite()));
        // Every chain starts with a primary record
        assert_eq!(records[0].depth, 1);
        for pair in records.windows(2) {
            assert!(pair[1].depth == 1 || pair[1].depth == pair[0].depth + 1);
        }
    }

    #[test]
    fn test_screen_grid_has_at_least_one_cell() {
        let (scene, camera) = lit_floor(8, 8, 0.5, 10.0).expect("scene");
        let mut rng = RngHandle::new(42);
        let records = place_screen_grid(&scene, &camera, 1e-6, 1, &mut rng);
        assert!(records.len() <= 1);
    }

    #[test]
    fn test_nearest_prefers_aligned_records() {
        let (scene, _camera) = cornell_box(16, 16).expect("scene");
        let mut rng = RngHandle::new(42);
        let mut set = RecordSet::new();
        set.extend(place_uniform(&scene, 400, &mut rng));
        set.build_tree(&scene);

        let records = set.records().to_vec();
        let query = records[10].point;
        let mut scratch = NearestRecordScratch::new();
        let nearest = set.nearest(&query, 3, 6, &mut scratch).to_vec();
        assert_eq!(nearest.len(), 3);
        assert_eq!(nearest[0], 10);

        // Metric must be non-decreasing
        let metric = |i: u32| {
            let r = &records[i as usize];
            let d = r.point.position.distance(query.position);
            d + 0.5 / scene.bounding_box().size().length()
                * (1.0 - query.normal.dot(r.point.normal)).abs().sqrt()
        };
        for pair in nearest.windows(2) {
            assert!(metric(pair[0]) <= metric(pair[1]) + 1e-6);
        }
    }

    #[test]
    fn test_empty_set_has_no_neighbours() {
        let set = RecordSet::new();
        let mut scratch = NearestRecordScratch::new();
        let point = SurfacePoint::new(Vec3::ZERO, Vec3::Y);
        assert!(set.nearest(&point, 3, 6, &mut scratch).is_empty());
    }

    #[test]
    fn test_record_colors_are_stable_and_in_range() {
        assert_eq!(record_color(3), record_color(3));
        assert_ne!(record_color(3), record_color(4));
        for index in 0..64 {
            let c = record_color(index);
            assert!(c.min_element() >= 0.0 && c.max_element() < 1.0);
        }
        let distinct: std::collections::HashSet<[u32; 3]> = (0..64)
            .map(|index| record_color(index).to_array().map(f32::to_bits))
            .collect();
        assert_eq!(distinct.len(), 64);
    }
}
