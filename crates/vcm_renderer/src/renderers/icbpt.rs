//! Bidirectional path tracing with importance-cached light vertex
//! resampling.
//!
//! For every eye vertex and light depth, one light vertex is drawn among
//! the first `R` light paths of the frame from a mixture of the cached
//! distributions of the nearest importance records.

use super::{connect_light_vertices_to_sensor, sample_primary_eye, ChannelLayout, FrameContext, Renderer};
use crate::config::{ImportanceCacheSettings, RenderSettings};
use crate::direct_importance::DirectImportancePartition;
use crate::error::ConfigError;
use crate::estimators::{connect_emission, connect_vertices, emitted_radiance};
use crate::framebuffer::TileAccumulator;
use crate::importance_cache::{record_color, ImportanceCache, NearestRecordScratch};
use crate::light_paths::LightPathBuffer;
use crate::mis::MisContext;
use crate::path::{Path, PathVertex};
use crate::rng::RngHandle;
use crate::sampling::uniform_discrete_sample;
use crate::tiles::Tile;
use vcm_core::Color;
use vcm_math::UVec2;

const NEAREST_RECORD_CHANNEL: usize = 0;

pub struct ImportanceCachingBptRenderer {
    layout: ChannelLayout,
    cache: ImportanceCache,
    resampling_path_count: usize,
    samples_per_pixel: u32,
    root_mis: MisContext,
    mis: MisContext,
    /// Emission hits compete with one resampled connection per eye vertex
    emission_mis: MisContext,
    light_paths: LightPathBuffer,
    direct_importance: DirectImportancePartition,
}

impl ImportanceCachingBptRenderer {
    pub fn new(settings: &RenderSettings, cache: &ImportanceCacheSettings) -> Result<Self, ConfigError> {
        let cache = ImportanceCache::new(cache.clone())?;
        let mut extra = vec!["nearest_importance_record".to_string()];
        extra.extend((0..cache.distribution_count()).map(|k| format!("dist{k}_contrib")));

        let resampling_path_count = cache.settings().resampling_path_count;
        let mis = MisContext::connection(settings.mis, resampling_path_count);
        Ok(Self {
            layout: ChannelLayout::new(settings.max_depth, &extra, true),
            resampling_path_count,
            samples_per_pixel: settings.samples_per_pixel,
            root_mis: MisContext::connection(settings.mis, settings.light_path_count()),
            mis,
            emission_mis: mis.with_path_count(1),
            cache,
            light_paths: LightPathBuffer::new(),
            direct_importance: DirectImportancePartition::new(),
        })
    }

    pub fn cache(&self) -> &ImportanceCache {
        &self.cache
    }

    /// Connect `eye` to the vertex at `light_depth` of light path `path`,
    /// the emission vertex when `light_depth` is 0.
    fn connect(&self, ctx: &FrameContext, eye: &PathVertex, light_depth: usize, path: usize) -> Color {
        if light_depth == 0 {
            connect_emission(eye, self.light_paths.emission(path), ctx.scene, &self.mis)
        } else {
            connect_vertices(eye, self.light_paths.vertex(path, light_depth), ctx.scene, &self.mis)
        }
    }

    /// Resample one light vertex at `light_depth` for `eye` and accumulate
    /// the weighted connection.
    #[allow(clippy::too_many_arguments)]
    fn resampled_connection(
        &self,
        ctx: &FrameContext,
        eye: &PathVertex,
        light_depth: usize,
        records: &[u32],
        acc: &mut TileAccumulator,
        pixel: UVec2,
        rng: &mut RngHandle,
    ) {
        let total_depth = eye.depth + light_depth as u32 + 1;
        let light_vertices = light_depth as u32 + 1;
        let path_count = self.resampling_path_count as f32;

        if records.is_empty() || !self.cache.has_candidates(light_depth, records) {
            // Uniform over the resampled paths: 1/R and the 1/R pdf cancel
            let Some((path, _)) = uniform_discrete_sample(self.resampling_path_count, rng.get_float()) else {
                return;
            };
            let contrib = self.connect(ctx, eye, light_depth, path);
            self.layout.record(acc, pixel, total_depth, light_vertices, contrib);
            return;
        }

        let Some((strategy, strategy_pdf)) = uniform_discrete_sample(self.cache.distribution_count(), rng.get_float())
        else {
            return;
        };
        let Some(sample) = self.cache.sample(light_depth, strategy, records, rng.get_float()) else {
            return;
        };
        if sample.pdf <= 0.0 {
            return;
        }
        let weight = self.cache.weight(&sample, light_depth, strategy, records);
        if weight <= 0.0 {
            return;
        }

        let contrib = self.connect(ctx, eye, light_depth, sample.value as usize) * weight
            / (path_count * strategy_pdf * sample.pdf);
        self.layout.record(acc, pixel, total_depth, light_vertices, contrib);
        if contrib != Color::ZERO {
            acc.add_color(self.layout.extra(1 + strategy), pixel, contrib);
        }
    }
}

impl Renderer for ImportanceCachingBptRenderer {
    fn name(&self) -> &'static str {
        "importance_caching_bpt"
    }

    fn channel_names(&self) -> Vec<String> {
        self.layout.names().to_vec()
    }

    fn preprocess(&mut self, ctx: &FrameContext) {
        log::info!(
            "Importance caching BPT: {} resampled light paths, distributions \"{}\", {} records per point",
            self.resampling_path_count,
            self.cache.settings().distribution_selector,
            self.cache.settings().records_per_point
        );
        log::debug!("Importance caching BPT over {} light paths per frame", ctx.settings.light_path_count());
    }

    fn begin_frame(&mut self, ctx: &FrameContext, rngs: &mut [RngHandle]) {
        self.light_paths
            .resize(ctx.settings.light_path_count(), ctx.max_light_depth());
        self.light_paths
            .sample(ctx.scene, ctx.light_sampler, &self.mis, rngs);

        self.cache.clear();
        if let Some(rng) = rngs.first_mut() {
            self.direct_importance
                .build(self.light_paths.vertices(), ctx.sensor, ctx.tiles, rng);
            self.cache
                .place_records(ctx.scene, ctx.sensor, ctx.max_depth(), rng);
        }
        self.cache.build_tree(ctx.scene);
        self.cache
            .build_distributions(ctx.scene, &self.light_paths, rngs);
        self.cache.optimize(rngs);
        self.cache.finish();
    }

    fn process_tile(&self, ctx: &FrameContext, tile: &Tile, rng: &mut RngHandle) -> TileAccumulator {
        let mut acc = self.layout.tile_accumulator(tile);
        let mut scratch = NearestRecordScratch::new();
        let importance_scale = 1.0 / self.samples_per_pixel as f32;
        let max_light_depth = ctx.max_light_depth();

        for pixel in tile.pixels() {
            acc.add_sample(pixel);

            for _ in 0..self.samples_per_pixel {
                let mut primary = sample_primary_eye(ctx, pixel, &self.root_mis, rng);
                if !primary.is_valid() {
                    continue;
                }
                primary.throughput *= importance_scale;

                let mut eye_path = Path::new(primary, ctx.max_depth());
                while let Some(eye) = eye_path.advance(ctx.scene, &self.mis, rng) {
                    let le = emitted_radiance(eye, ctx.scene, ctx.light_sampler, &self.emission_mis);
                    self.layout.record(&mut acc, pixel, eye.depth, 0, le);

                    let Some(point) = eye.surface_point() else {
                        continue;
                    };
                    let records = self.cache.nearest_records(&point, &mut scratch);
                    if eye.depth == 1 {
                        if let Some(&nearest) = records.first() {
                            acc.add_color(
                                self.layout.extra(NEAREST_RECORD_CHANNEL),
                                pixel,
                                record_color(nearest),
                            );
                        }
                    }
                    if eye.bsdf.is_delta() {
                        continue;
                    }

                    for light_depth in 0..=max_light_depth {
                        if eye.depth + light_depth as u32 + 1 > ctx.max_depth() {
                            break;
                        }
                        self.resampled_connection(ctx, eye, light_depth, records, &mut acc, pixel, rng);
                    }
                }
            }
        }

        connect_light_vertices_to_sensor(
            ctx,
            tile,
            &self.direct_importance,
            self.light_paths.vertices(),
            &self.root_mis,
            false,
            &self.layout,
            &mut acc,
        );
        acc
    }
}
