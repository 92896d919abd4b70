//! Bidirectional path tracing over a shared pool of light paths, one
//! picked uniformly for every eye sample.

use super::{
    connect_bpt_strategies, connect_light_vertices_to_sensor, sample_primary_eye, ChannelLayout,
    FrameContext, Renderer,
};
use crate::config::RenderSettings;
use crate::direct_importance::DirectImportancePartition;
use crate::framebuffer::TileAccumulator;
use crate::light_paths::LightPathBuffer;
use crate::mis::MisContext;
use crate::path::Path;
use crate::rng::RngHandle;
use crate::sampling::uniform_discrete_sample;
use crate::tiles::Tile;

pub struct UniformResamplingBptRenderer {
    layout: ChannelLayout,
    light_path_count: usize,
    samples_per_pixel: u32,
    root_mis: MisContext,
    mis: MisContext,
    light_paths: LightPathBuffer,
    direct_importance: DirectImportancePartition,
}

impl UniformResamplingBptRenderer {
    pub fn new(settings: &RenderSettings, light_path_count: usize) -> Self {
        let spp = settings.samples_per_pixel as usize;
        Self {
            layout: ChannelLayout::new(settings.max_depth, &[], true),
            light_path_count,
            samples_per_pixel: settings.samples_per_pixel,
            root_mis: MisContext::connection(settings.mis, light_path_count),
            mis: MisContext::connection(settings.mis, spp),
            light_paths: LightPathBuffer::new(),
            direct_importance: DirectImportancePartition::new(),
        }
    }
}

impl Renderer for UniformResamplingBptRenderer {
    fn name(&self) -> &'static str {
        "uniform_resampling_bpt"
    }

    fn channel_names(&self) -> Vec<String> {
        self.layout.names().to_vec()
    }

    fn preprocess(&mut self, ctx: &FrameContext) {
        log::info!(
            "Uniform resampling BPT: {} shared light paths, {} samples per pixel",
            self.light_path_count,
            ctx.settings.samples_per_pixel
        );
    }

    fn begin_frame(&mut self, ctx: &FrameContext, rngs: &mut [RngHandle]) {
        self.light_paths
            .resize(self.light_path_count, ctx.max_light_depth());
        self.light_paths
            .sample(ctx.scene, ctx.light_sampler, &self.mis, rngs);

        if let Some(rng) = rngs.first_mut() {
            self.direct_importance
                .build(self.light_paths.vertices(), ctx.sensor, ctx.tiles, rng);
        }
    }

    fn process_tile(&self, ctx: &FrameContext, tile: &Tile, rng: &mut RngHandle) -> TileAccumulator {
        let mut acc = self.layout.tile_accumulator(tile);
        let importance_scale = 1.0 / self.samples_per_pixel as f32;

        for pixel in tile.pixels() {
            acc.add_sample(pixel);

            for _ in 0..self.samples_per_pixel {
                let mut primary = sample_primary_eye(ctx, pixel, &self.root_mis, rng);
                if !primary.is_valid() {
                    continue;
                }
                primary.throughput *= importance_scale;

                let Some((path_index, _)) = uniform_discrete_sample(self.light_path_count, rng.get_float()) else {
                    continue;
                };
                let light_path = self.light_paths.path(path_index);

                let mut eye_path = Path::new(primary, ctx.max_depth());
                while let Some(eye) = eye_path.advance(ctx.scene, &self.mis, rng) {
                    connect_bpt_strategies(ctx, eye, light_path, &self.mis, &self.layout, &mut acc, pixel, rng);
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
