//! Frame renderers.
//!
//! A renderer is driven by the frame controller through four hooks:
//! [`Renderer::preprocess`] once, then per frame [`Renderer::begin_frame`]
//! (sequential, builds the shared per-frame state), [`Renderer::process_tile`]
//! (parallel, read-only access to that state) and [`Renderer::end_frame`].

mod bpt;
mod icbpt;
mod resampling_bpt;
mod vcm;

pub use bpt::BptRenderer;
pub use icbpt::ImportanceCachingBptRenderer;
pub use resampling_bpt::UniformResamplingBptRenderer;
pub use vcm::VcmRenderer;

use crate::config::{RenderSettings, RendererKind};
use crate::direct_importance::DirectImportancePartition;
use crate::error::ConfigError;
use crate::estimators::{
    bpt_strategy_offset, connect_emission, connect_to_sensor, connect_vertices, emitted_radiance,
    strategy_channel_names,
};
use crate::framebuffer::TileAccumulator;
use crate::light_sampler::PowerLightSampler;
use crate::mis::MisContext;
use crate::path::{EmissionVertex, PathVertex, SensorVertex};
use crate::rng::RngHandle;
use crate::tiles::{Tile, TileGrid};
use vcm_core::{Color, Scene, Sensor};
use vcm_math::UVec2;

/// Everything a renderer may read during a frame.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub scene: &'a dyn Scene,
    pub sensor: &'a dyn Sensor,
    pub light_sampler: &'a PowerLightSampler,
    pub settings: &'a RenderSettings,
    pub tiles: &'a TileGrid,
    /// Index of the frame being rendered, from 0
    pub frame: usize,
}

impl FrameContext<'_> {
    pub fn pixel_index(&self, pixel: UVec2) -> usize {
        (pixel.y * self.settings.width + pixel.x) as usize
    }

    pub fn max_depth(&self) -> u32 {
        self.settings.max_depth
    }

    /// Light paths stop one edge short: they never hit the sensor.
    pub fn max_light_depth(&self) -> usize {
        self.settings.max_depth.saturating_sub(1) as usize
    }
}

pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Framebuffer channels, in channel order.
    fn channel_names(&self) -> Vec<String>;

    fn preprocess(&mut self, _ctx: &FrameContext) {}

    /// Sample and index everything shared by the tiles of a frame.
    fn begin_frame(&mut self, ctx: &FrameContext, rngs: &mut [RngHandle]);

    /// Render one tile into its own accumulator.
    fn process_tile(&self, ctx: &FrameContext, tile: &Tile, rng: &mut RngHandle) -> TileAccumulator;

    fn end_frame(&mut self, _ctx: &FrameContext) {}
}

/// Instantiate the renderer selected by `settings`.
pub fn create_renderer(settings: &RenderSettings) -> Result<Box<dyn Renderer>, ConfigError> {
    let renderer: Box<dyn Renderer> = match &settings.renderer {
        RendererKind::Bpt => Box::new(BptRenderer::new(settings)),
        RendererKind::UniformResamplingBpt { light_path_count } => {
            Box::new(UniformResamplingBptRenderer::new(settings, *light_path_count))
        }
        RendererKind::Vcm(vcm) => Box::new(VcmRenderer::new(settings, vcm)),
        RendererKind::ImportanceCachingBpt(cache) => {
            Box::new(ImportanceCachingBptRenderer::new(settings, cache)?)
        }
    };
    Ok(renderer)
}

/// Channel layout shared by the bidirectional renderers:
/// `final_render`, then renderer specific channels, then one channel per
/// path depth and optionally one per (depth, strategy) pair.
#[derive(Debug, Clone)]
pub struct ChannelLayout {
    names: Vec<String>,
    max_depth: u32,
    depth_base: usize,
    strategy_base: Option<usize>,
}

impl ChannelLayout {
    pub const FINAL_RENDER: usize = 0;

    pub fn new(max_depth: u32, extra: &[String], strategies: bool) -> Self {
        let mut names = vec!["final_render".to_string()];
        names.extend(extra.iter().cloned());
        let depth_base = names.len();
        names.extend((1..=max_depth).map(|depth| format!("depth_{depth}")));
        let strategy_base = strategies.then(|| {
            let base = names.len();
            names.extend(strategy_channel_names(max_depth));
            base
        });
        Self {
            names,
            max_depth,
            depth_base,
            strategy_base,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Channel `index` among those passed as `extra`.
    pub fn extra(&self, index: usize) -> usize {
        1 + index
    }

    /// Channel of paths with `total_depth` edges.
    pub fn depth(&self, total_depth: u32) -> Option<usize> {
        (1..=self.max_depth)
            .contains(&total_depth)
            .then(|| self.depth_base + total_depth as usize - 1)
    }

    /// Channel of the strategy with `light_vertices` light vertices for
    /// paths with `total_depth` edges.
    pub fn strategy(&self, total_depth: u32, light_vertices: u32) -> Option<usize> {
        let base = self.strategy_base?;
        if !(1..=self.max_depth).contains(&total_depth) || light_vertices > total_depth + 1 {
            return None;
        }
        Some(base + bpt_strategy_offset(total_depth + 1, light_vertices))
    }

    pub fn tile_accumulator(&self, tile: &Tile) -> TileAccumulator {
        TileAccumulator::new(*tile, self.len())
    }

    /// Add a path contribution to the final image and to its depth and
    /// strategy channels.
    pub fn record(
        &self,
        acc: &mut TileAccumulator,
        pixel: UVec2,
        total_depth: u32,
        light_vertices: u32,
        contrib: Color,
    ) {
        if contrib == Color::ZERO {
            return;
        }
        check_measurement(contrib, pixel, total_depth, Some(light_vertices));
        acc.add_color(Self::FINAL_RENDER, pixel, contrib);
        if let Some(channel) = self.depth(total_depth) {
            acc.add_color(channel, pixel, contrib);
        }
        if let Some(channel) = self.strategy(total_depth, light_vertices) {
            acc.add_color(channel, pixel, contrib);
        }
    }

    /// Add a merged contribution, which has no connection strategy.
    pub fn record_merge(&self, acc: &mut TileAccumulator, pixel: UVec2, total_depth: u32, contrib: Color) {
        if contrib == Color::ZERO {
            return;
        }
        check_measurement(contrib, pixel, total_depth, None);
        acc.add_color(Self::FINAL_RENDER, pixel, contrib);
        if let Some(channel) = self.depth(total_depth) {
            acc.add_color(channel, pixel, contrib);
        }
    }
}

/// First eye vertex through `pixel`, with a jittered image position and a
/// random lens position.
pub(crate) fn sample_primary_eye(
    ctx: &FrameContext,
    pixel: UVec2,
    root_mis: &MisContext,
    rng: &mut RngHandle,
) -> PathVertex {
    let image_sample = rng.get_float2();
    let lens_sample = rng.get_float2();
    PathVertex::primary_eye(ctx.scene, ctx.sensor, pixel, lens_sample, image_sample, root_mis)
}

/// Evaluate emission (s = 0), direct light sampling (s = 1) and the
/// connections to every vertex of `light_path` at one eye vertex.
#[allow(clippy::too_many_arguments)]
pub(crate) fn connect_bpt_strategies(
    ctx: &FrameContext,
    eye: &PathVertex,
    light_path: &[PathVertex],
    mis: &MisContext,
    layout: &ChannelLayout,
    acc: &mut TileAccumulator,
    pixel: UVec2,
    rng: &mut RngHandle,
) {
    let max_depth = ctx.max_depth();

    let le = emitted_radiance(eye, ctx.scene, ctx.light_sampler, mis);
    layout.record(acc, pixel, eye.depth, 0, le);

    if eye.surface().is_none() || eye.depth + 1 > max_depth {
        return;
    }
    let emission = EmissionVertex::sample(ctx.light_sampler, rng);
    let direct = connect_emission(eye, &emission, ctx.scene, mis);
    layout.record(acc, pixel, eye.depth + 1, 1, direct);

    for light in light_path {
        let total_depth = eye.depth + light.depth + 1;
        if !light.is_valid() || total_depth > max_depth {
            break;
        }
        let contrib = connect_vertices(eye, light, ctx.scene, mis);
        layout.record(acc, pixel, total_depth, light.depth + 1, contrib);
    }
}

/// Splat the light vertices whose sensor connection lands in `tile` (t = 1).
/// Each splat is divided by the number of light paths of the frame, the
/// `path_count` of `root_mis`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn connect_light_vertices_to_sensor(
    ctx: &FrameContext,
    tile: &Tile,
    partition: &DirectImportancePartition,
    light_vertices: &[PathVertex],
    root_mis: &MisContext,
    light_trace_only: bool,
    layout: &ChannelLayout,
    acc: &mut TileAccumulator,
) {
    let rcp_path_count = 1.0 / root_mis.path_count.max(1.0);
    for sample in partition.tile(tile.index) {
        let light = &light_vertices[sample.light_vertex];
        let total_depth = light.depth + 1;
        if total_depth > ctx.max_depth() {
            continue;
        }
        let sensor_vertex = SensorVertex {
            lens_sample: sample.lens_sample,
        };
        let Some((pixel, contrib)) = connect_to_sensor(
            light,
            &sensor_vertex,
            ctx.scene,
            ctx.sensor,
            root_mis,
            light_trace_only,
        ) else {
            continue;
        };
        if !tile.contains(pixel) {
            continue;
        }
        layout.record(acc, pixel, total_depth, light.depth + 1, contrib * rcp_path_count);
    }
}

/// Report NaN, infinite or negative estimates. Diagnostic only.
pub(crate) fn check_measurement(contrib: Color, pixel: UVec2, total_depth: u32, light_vertices: Option<u32>) {
    if contrib.is_finite() && contrib.min_element() >= 0.0 {
        return;
    }
    match light_vertices {
        Some(s) => log::warn!(
            "Invalid contribution {contrib} at pixel {pixel} (s = {s}, t = {})",
            (total_depth + 1).saturating_sub(s)
        ),
        None => log::warn!("Invalid merged contribution {contrib} at pixel {pixel} (depth {total_depth})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_places_depth_and_strategy_channels() {
        let layout = ChannelLayout::new(3, &[], true);
        assert_eq!(layout.names()[0], "final_render");
        assert_eq!(layout.depth(1), Some(1));
        assert_eq!(layout.depth(3), Some(3));
        assert_eq!(layout.depth(0), None);
        assert_eq!(layout.depth(4), None);

        // Depth 1 has 3 strategies, depth 2 has 4, depth 3 has 5
        assert_eq!(layout.len(), 1 + 3 + 3 + 4 + 5);
        assert_eq!(layout.names()[layout.strategy(1, 0).unwrap()], "strategy_s_0_t_2");
        assert_eq!(layout.names()[layout.strategy(2, 1).unwrap()], "strategy_s_1_t_2");
        assert_eq!(layout.names()[layout.strategy(3, 4).unwrap()], "strategy_s_4_t_0");
        assert_eq!(layout.strategy(3, 5), None);
    }

    #[test]
    fn test_layout_extra_channels_come_first() {
        let extra = vec!["nearest_importance_record".to_string(), "dist0_contrib".to_string()];
        let layout = ChannelLayout::new(2, &extra, false);
        assert_eq!(layout.names()[layout.extra(0)], "nearest_importance_record");
        assert_eq!(layout.names()[layout.extra(1)], "dist0_contrib");
        assert_eq!(layout.names()[layout.depth(1).unwrap()], "depth_1");
        assert_eq!(layout.strategy(1, 0), None);
        assert_eq!(layout.len(), 5);
    }

    #[test]
    fn test_record_feeds_final_depth_and_strategy() {
        let layout = ChannelLayout::new(2, &[], true);
        let tile = Tile::new(0, 0, 2, 2, 0);
        let mut acc = layout.tile_accumulator(&tile);
        let pixel = UVec2::new(1, 1);
        layout.record(&mut acc, pixel, 2, 1, Color::new(1.0, 2.0, 3.0));

        let depth = layout.depth(2).unwrap();
        let strategy = layout.strategy(2, 1).unwrap();
        for channel in [ChannelLayout::FINAL_RENDER, depth, strategy] {
            assert_eq!(acc.get(channel, pixel).truncate(), Color::new(1.0, 2.0, 3.0));
        }
        assert_eq!(acc.get(layout.depth(1).unwrap(), pixel), vcm_math::Vec4::ZERO);
    }
}
