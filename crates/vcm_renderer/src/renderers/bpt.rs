//! Bidirectional path tracing with one light path per pixel.

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
use crate::tiles::Tile;

/// Pixel `i` connects its eye path to light path `i` only. Every light
/// vertex is also splatted to the sensor.
pub struct BptRenderer {
    layout: ChannelLayout,
    /// MIS constants of the eye root and of sensor connections
    root_mis: MisContext,
    mis: MisContext,
    light_paths: LightPathBuffer,
    direct_importance: DirectImportancePartition,
}

impl BptRenderer {
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            layout: ChannelLayout::new(settings.max_depth, &[], true),
            root_mis: MisContext::connection(settings.mis, settings.pixel_count()),
            mis: MisContext::connection(settings.mis, 1),
            light_paths: LightPathBuffer::new(),
            direct_importance: DirectImportancePartition::new(),
        }
    }
}

impl Renderer for BptRenderer {
    fn name(&self) -> &'static str {
        "bpt"
    }

    fn channel_names(&self) -> Vec<String> {
        self.layout.names().to_vec()
    }

    fn begin_frame(&mut self, ctx: &FrameContext, rngs: &mut [RngHandle]) {
        self.light_paths
            .resize(ctx.settings.pixel_count(), ctx.max_light_depth());
        self.light_paths
            .sample(ctx.scene, ctx.light_sampler, &self.mis, rngs);

        if let Some(rng) = rngs.first_mut() {
            self.direct_importance
                .build(self.light_paths.vertices(), ctx.sensor, ctx.tiles, rng);
        }
    }

    fn process_tile(&self, ctx: &FrameContext, tile: &Tile, rng: &mut RngHandle) -> TileAccumulator {
        let mut acc = self.layout.tile_accumulator(tile);

        for pixel in tile.pixels() {
            acc.add_sample(pixel);
            let light_path = self.light_paths.path(ctx.pixel_index(pixel));

            let primary = sample_primary_eye(ctx, pixel, &self.root_mis, rng);
            let mut eye_path = Path::new(primary, ctx.max_depth());
            while let Some(eye) = eye_path.advance(ctx.scene, &self.mis, rng) {
                connect_bpt_strategies(ctx, eye, light_path, &self.mis, &self.layout, &mut acc, pixel, rng);
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
