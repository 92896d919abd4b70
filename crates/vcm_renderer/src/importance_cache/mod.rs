//! Importance caching: per-record distributions over the light vertices of
//! a frame, used to resample the light vertex each eye vertex connects to.
//!
//! The cache is rebuilt every frame through a fixed sequence of steps:
//!
//! ```ignore
//! cache.clear();
//! cache.place_records(scene, sensor, max_eye_depth, rng);
//! cache.build_tree(scene);
//! cache.build_distributions(scene, &light_paths, rngs);
//! cache.optimize(rngs);
//! cache.finish();
//! ```
//!
//! Each step requires the previous one; [`CacheState`] tracks progress and
//! lookups return no records until the cache is [`CacheState::Ready`].

mod contributions;
mod distributions;
mod records;

pub use contributions::ContributionEvaluator;
pub use distributions::{alpha_max_indicator, DistributionKind, DistributionTables};
pub use records::{
    place_screen_grid, place_uniform, record_color, ImportanceRecord, NearestRecordScratch, RecordSet,
};

use crate::config::{ImportanceCacheSettings, RecordPlacement};
use crate::distribution::Sample;
use crate::error::ConfigError;
use crate::light_paths::LightPathBuffer;
use crate::rng::RngHandle;
use vcm_core::{Scene, Sensor, SurfacePoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheState {
    #[default]
    Clear,
    RecordsPlaced,
    TreeBuilt,
    DistributionsBuilt,
    Optimized,
    Ready,
}

#[derive(Debug, Clone)]
pub struct ImportanceCache {
    state: CacheState,
    settings: ImportanceCacheSettings,
    records: RecordSet,
    tables: DistributionTables,
}

impl ImportanceCache {
    pub fn new(settings: ImportanceCacheSettings) -> Result<Self, ConfigError> {
        let kinds = settings.distribution_kinds()?;
        let tables = DistributionTables::new(kinds, settings.alpha);
        Ok(Self {
            state: CacheState::Clear,
            settings,
            records: RecordSet::new(),
            tables,
        })
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn settings(&self) -> &ImportanceCacheSettings {
        &self.settings
    }

    fn expect_state(&self, expected: CacheState, step: &str) -> bool {
        if self.state != expected {
            log::warn!(
                "Importance cache: {step} skipped in state {:?} (expected {:?})",
                self.state,
                expected
            );
            return false;
        }
        true
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.state = CacheState::Clear;
    }

    /// Place the records of this frame. Placement draws from `rng` only, in
    /// a fixed order.
    pub fn place_records(
        &mut self,
        scene: &dyn Scene,
        sensor: &dyn Sensor,
        max_eye_depth: u32,
        rng: &mut RngHandle,
    ) {
        if !self.expect_state(CacheState::Clear, "record placement") {
            return;
        }
        let records = match self.settings.placement {
            RecordPlacement::Uniform { count } => place_uniform(scene, count, rng),
            RecordPlacement::ScreenGrid { density } => {
                place_screen_grid(scene, sensor, density, max_eye_depth, rng)
            }
        };
        self.records.extend(records);
        log::debug!("Placed {} importance records", self.records.len());
        self.state = CacheState::RecordsPlaced;
    }

    pub fn build_tree(&mut self, scene: &dyn Scene) {
        if !self.expect_state(CacheState::RecordsPlaced, "k-d tree build") {
            return;
        }
        self.records.build_tree(scene);
        self.state = CacheState::TreeBuilt;
    }

    /// Build every enabled distribution over the first
    /// `resampling_path_count` paths of `light_paths`. Depth 0 covers the
    /// emission vertices.
    pub fn build_distributions(
        &mut self,
        scene: &dyn Scene,
        light_paths: &LightPathBuffer,
        rngs: &mut [RngHandle],
    ) {
        if !self.expect_state(CacheState::TreeBuilt, "distribution build") {
            return;
        }
        let evaluator = ContributionEvaluator::new(scene, self.settings.cos_max_incident_angle());
        let path_count = self.settings.resampling_path_count.min(light_paths.path_count());
        let records = self.records.records();

        self.tables.build(
            records.len(),
            path_count,
            light_paths.max_light_depth(),
            rngs,
            |record, depth, kind, path| {
                let record = &records[record];
                if depth == 0 {
                    evaluator.emission_vertex(kind, record, light_paths.emission(path))
                } else {
                    evaluator.light_vertex(kind, record, light_paths.vertex(path, depth))
                }
            },
        );
        log::debug!(
            "Built {} distributions per record and depth over {} light paths",
            self.tables.kind_count(),
            path_count
        );
        self.state = CacheState::DistributionsBuilt;
    }

    /// Prune the distributions by their alpha-max indicators. Does nothing
    /// unless alpha-max weighting and optimization are both enabled.
    pub fn optimize(&mut self, rngs: &mut [RngHandle]) {
        if !self.expect_state(CacheState::DistributionsBuilt, "optimization") {
            return;
        }
        if self.settings.use_alpha_max && self.settings.optimize {
            self.tables.optimize(rngs);
        }
        self.state = CacheState::Optimized;
    }

    pub fn finish(&mut self) {
        if self.state == CacheState::DistributionsBuilt {
            self.state = CacheState::Optimized;
        }
        if !self.expect_state(CacheState::Optimized, "finish") {
            return;
        }
        if self.records.is_empty() {
            log::warn!("Importance cache is empty, falling back to uniform resampling");
        }
        self.state = CacheState::Ready;
    }

    pub fn is_ready(&self) -> bool {
        self.state == CacheState::Ready
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, index: u32) -> &ImportanceRecord {
        self.records.get(index as usize)
    }

    /// Number of enabled distributions.
    pub fn distribution_count(&self) -> usize {
        self.tables.kind_count()
    }

    pub fn path_count(&self) -> usize {
        self.tables.path_count()
    }

    /// Records to combine at `point`, best first. Empty until the cache is
    /// ready.
    pub fn nearest_records<'s>(&self, point: &SurfacePoint, scratch: &'s mut NearestRecordScratch) -> &'s [u32] {
        let k = if self.is_ready() {
            self.settings.records_per_point
        } else {
            0
        };
        let unfiltered = self.settings.unfiltered_factor * self.settings.records_per_point;
        self.records.nearest(point, k, unfiltered, scratch)
    }

    /// True if any enabled distribution of `records` can produce a vertex at
    /// light `depth`.
    pub fn has_candidates(&self, depth: usize, records: &[u32]) -> bool {
        self.is_ready() && depth <= self.tables.max_light_depth() && self.tables.has_candidates(depth, records)
    }

    pub fn sample(&self, depth: usize, distribution_index: usize, records: &[u32], u: f32) -> Option<Sample<u32>> {
        if !self.is_ready() {
            return None;
        }
        self.tables.sample(depth, distribution_index, records, u)
    }

    pub fn alpha_max_weight(
        &self,
        sample: &Sample<u32>,
        depth: usize,
        distribution_index: usize,
        records: &[u32],
    ) -> f32 {
        self.tables.alpha_max_weight(sample, depth, distribution_index, records)
    }

    pub fn balance_weight(&self, sample: &Sample<u32>, depth: usize, records: &[u32]) -> f32 {
        self.tables.balance_weight(sample, depth, records)
    }

    /// Weight of `sample` under the configured heuristic.
    pub fn weight(&self, sample: &Sample<u32>, depth: usize, distribution_index: usize, records: &[u32]) -> f32 {
        if self.settings.use_alpha_max {
            self.alpha_max_weight(sample, depth, distribution_index, records)
        } else {
            self.balance_weight(sample, depth, records)
        }
    }
}
