//! Per-record light vertex distributions and their combination across
//! neighbouring records.
//!
//! Each record owns one block of tables laid out as
//! `[depth][enabled kind][path]`, every table a CDF over the resampled
//! light paths (see [`crate::distribution`]). Blocks are contiguous so
//! records can be built in parallel.

use crate::distribution::{
    build_distribution, combined_pdf, distribution_buffer_size, distribution_pdf, is_non_empty,
    sample_combined, Sample,
};
use crate::error::ConfigError;
use crate::parallel::process_tasks_deterministic;
use crate::rng::RngHandle;

/// Light vertex weighting a distribution is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistributionKind {
    /// Unoccluded contribution, shadow ray included
    Full,
    /// Contribution ignoring visibility
    Unoccluded,
    /// Upper bound of the contribution over the record's region
    Bounded,
    /// Every valid vertex with the same weight
    Conservative,
}

impl DistributionKind {
    pub const MAX_ENABLED: usize = 4;

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'F' => Some(DistributionKind::Full),
            'U' => Some(DistributionKind::Unoccluded),
            'B' => Some(DistributionKind::Bounded),
            'C' => Some(DistributionKind::Conservative),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            DistributionKind::Full => 'F',
            DistributionKind::Unoccluded => 'U',
            DistributionKind::Bounded => 'B',
            DistributionKind::Conservative => 'C',
        }
    }

    /// Parse a selector such as `"FC"`. Kinds keep their order of first
    /// appearance; repeated letters are ignored.
    pub fn parse_selector(selector: &str) -> Result<Vec<Self>, ConfigError> {
        if selector.is_empty() {
            return Err(ConfigError::EmptyDistributionSelector);
        }
        let mut kinds = Vec::with_capacity(Self::MAX_ENABLED);
        for c in selector.chars() {
            let kind = Self::from_char(c).ok_or(ConfigError::UnknownDistribution(c))?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

/// Alpha-max indicator of the sample drawn from distribution `index`:
/// one for the first distribution reaching the largest alpha-scaled pdf,
/// zero for the others.
pub fn alpha_max_indicator(pdfs: &[f32], alpha: &[f32], index: usize, sample_pdf: f32) -> f32 {
    let max_alpha_pdf = pdfs
        .iter()
        .zip(alpha)
        .map(|(pdf, a)| a * pdf)
        .fold(0.0, f32::max);
    if sample_pdf < max_alpha_pdf {
        return 0.0;
    }
    if pdfs[..index].iter().any(|&pdf| pdf >= max_alpha_pdf) {
        return 0.0;
    }
    1.0
}

/// Distribution tables of every record for one frame.
#[derive(Debug, Clone, Default)]
pub struct DistributionTables {
    kinds: Vec<DistributionKind>,
    alpha: [f32; DistributionKind::MAX_ENABLED],
    path_count: usize,
    max_light_depth: usize,
    record_count: usize,
    data: Vec<f32>,
}

impl DistributionTables {
    pub fn new(kinds: Vec<DistributionKind>, alpha: [f32; DistributionKind::MAX_ENABLED]) -> Self {
        Self {
            kinds,
            alpha,
            ..Default::default()
        }
    }

    pub fn kinds(&self) -> &[DistributionKind] {
        &self.kinds
    }

    pub fn kind_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn path_count(&self) -> usize {
        self.path_count
    }

    pub fn max_light_depth(&self) -> usize {
        self.max_light_depth
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    fn table_size(&self) -> usize {
        distribution_buffer_size(self.path_count)
    }

    fn depth_stride(&self) -> usize {
        self.kinds.len() * self.table_size()
    }

    fn record_stride(&self) -> usize {
        (self.max_light_depth + 1) * self.depth_stride()
    }

    /// Table of enabled kind `kind_index` for `record` at light `depth`.
    pub fn table(&self, record: usize, depth: usize, kind_index: usize) -> &[f32] {
        let start = record * self.record_stride() + depth * self.depth_stride() + kind_index * self.table_size();
        &self.data[start..start + self.table_size()]
    }

    /// Build the tables of `record_count` records over `path_count` paths.
    /// `weight(record, depth, kind, path)` gives the unnormalized weight of
    /// a light vertex. Records are spread over the worker slots of `rngs`.
    pub fn build(
        &mut self,
        record_count: usize,
        path_count: usize,
        max_light_depth: usize,
        rngs: &mut [RngHandle],
        weight: impl Fn(usize, usize, DistributionKind, usize) -> f32 + Sync,
    ) {
        self.record_count = record_count;
        self.path_count = path_count;
        self.max_light_depth = max_light_depth;
        let stride = self.record_stride();
        self.data.clear();
        self.data.resize(record_count * stride, 0.0);
        if stride == 0 {
            return;
        }

        let kinds = &self.kinds;
        let table_size = distribution_buffer_size(path_count);
        process_tasks_deterministic(self.data.chunks_mut(stride), rngs, |record, block, _| {
            for (depth, depth_block) in block.chunks_mut(kinds.len() * table_size).enumerate() {
                for (&kind, cdf) in kinds.iter().zip(depth_block.chunks_mut(table_size)) {
                    build_distribution(|path| weight(record, depth, kind, path), cdf);
                }
            }
        });
    }

    /// Reweight every table by its alpha-max indicators, computed from the
    /// tables as built, so that each light vertex keeps a non-zero
    /// probability in at most one distribution of a record.
    pub fn optimize(&mut self, rngs: &mut [RngHandle]) {
        let stride = self.record_stride();
        if stride == 0 {
            return;
        }
        let kind_count = self.kinds.len();
        let table_size = self.table_size();
        let path_count = self.path_count;
        let alpha = self.alpha;

        process_tasks_deterministic(self.data.chunks_mut(stride), rngs, |_, block, _| {
            let mut weights = vec![0.0; kind_count * path_count];
            for depth_block in block.chunks_mut(kind_count * table_size) {
                for path in 0..path_count {
                    let mut pdfs = [0.0; DistributionKind::MAX_ENABLED];
                    for (k, pdf) in pdfs.iter_mut().enumerate().take(kind_count) {
                        *pdf = distribution_pdf(&depth_block[k * table_size..(k + 1) * table_size], path);
                    }
                    let pdfs = &pdfs[..kind_count];
                    for (k, &pdf) in pdfs.iter().enumerate() {
                        weights[k * path_count + path] = alpha_max_indicator(pdfs, &alpha, k, pdf) * pdf;
                    }
                }
                for (k, cdf) in depth_block.chunks_mut(table_size).enumerate() {
                    let w = &weights[k * path_count..(k + 1) * path_count];
                    build_distribution(|path| w[path], cdf);
                }
            }
        });
        log::debug!("Optimized distributions of {} importance records", self.record_count);
    }

    /// True if some record has a non-empty table at `depth`.
    pub fn has_candidates(&self, depth: usize, records: &[u32]) -> bool {
        records.iter().any(|&r| {
            (0..self.kinds.len()).any(|k| is_non_empty(self.table(r as usize, depth, k)))
        })
    }

    /// Sample a path index from the average of the `kind_index` tables of
    /// `records` at `depth`.
    pub fn sample(&self, depth: usize, kind_index: usize, records: &[u32], u: f32) -> Option<Sample<u32>> {
        if depth > self.max_light_depth || kind_index >= self.kinds.len() {
            return None;
        }
        sample_combined(
            records.len(),
            |i| self.table(records[i] as usize, depth, kind_index),
            self.path_count,
            u,
        )
        .map(|s| Sample::new(s.value as u32, s.pdf))
    }

    /// Probability of `path` under the combined `kind_index` distribution.
    pub fn pdf(&self, depth: usize, kind_index: usize, records: &[u32], path: u32) -> f32 {
        if (path as usize) >= self.path_count {
            return 0.0;
        }
        combined_pdf(
            records.len(),
            |i| self.table(records[i] as usize, depth, kind_index),
            path as usize,
        )
    }

    fn all_pdfs(&self, depth: usize, records: &[u32], path: u32) -> [f32; DistributionKind::MAX_ENABLED] {
        let mut pdfs = [0.0; DistributionKind::MAX_ENABLED];
        for (k, pdf) in pdfs.iter_mut().enumerate().take(self.kinds.len()) {
            *pdf = self.pdf(depth, k, records, path);
        }
        pdfs
    }

    pub fn alpha_max_weight(&self, sample: &Sample<u32>, depth: usize, kind_index: usize, records: &[u32]) -> f32 {
        let pdfs = self.all_pdfs(depth, records, sample.value);
        alpha_max_indicator(&pdfs[..self.kinds.len()], &self.alpha, kind_index, sample.pdf)
    }

    pub fn balance_weight(&self, sample: &Sample<u32>, depth: usize, records: &[u32]) -> f32 {
        let pdfs = self.all_pdfs(depth, records, sample.value);
        let sum: f32 = pdfs[..self.kinds.len()].iter().sum();
        if sum > 0.0 {
            sample.pdf / sum
        } else {
            0.0
        }
    }
}
