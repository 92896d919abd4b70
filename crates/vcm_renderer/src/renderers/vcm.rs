//! Vertex connection and merging.
//!
//! Every eye sample owns one light path (`pixel * spp + sample`) for its
//! connections and merges with the vertices of all light paths of the
//! frame. The algorithm setting restricts the estimators in use, which
//! also covers light tracing, progressive photon mapping, bidirectional
//! photon mapping and plain bidirectional path tracing.

use super::{connect_light_vertices_to_sensor, sample_primary_eye, ChannelLayout, FrameContext, Renderer};
use crate::config::{RenderSettings, VcmAlgorithm, VcmSettings};
use crate::direct_importance::DirectImportancePartition;
use crate::estimators::{connect_emission, connect_vertices, emitted_radiance};
use crate::framebuffer::TileAccumulator;
use crate::light_paths::LightPathBuffer;
use crate::merging::{merge_radius, MergeFactors, VertexMerger};
use crate::mis::MisContext;
use crate::path::{EmissionVertex, Path, PathVertex};
use crate::rng::RngHandle;
use crate::tiles::Tile;
use vcm_core::ScatteringEvent;
use vcm_math::UVec2;

pub struct VcmRenderer {
    settings: VcmSettings,
    layout: ChannelLayout,
    samples_per_pixel: u32,
    base_radius: f32,
    factors: MergeFactors,
    root_mis: MisContext,
    mis: MisContext,
    light_paths: LightPathBuffer,
    merger: VertexMerger,
    direct_importance: DirectImportancePartition,
}

impl VcmRenderer {
    pub fn new(settings: &RenderSettings, vcm: &VcmSettings) -> Self {
        let spp = settings.samples_per_pixel as usize;
        let light_path_count = settings.light_path_count();
        let factors = MergeFactors::new(
            merge_radius(vcm.radius_factor, 0, vcm.radius_alpha),
            light_path_count,
            settings.mis,
            vcm.algorithm.use_vc(),
            vcm.algorithm.use_vm(),
        );
        let mis = MisContext::vertex_merging(settings.mis, spp, factors.vc_weight_factor, factors.vm_weight_factor);
        Self {
            settings: *vcm,
            // Merged paths have no bidirectional strategy to file under
            layout: ChannelLayout::new(settings.max_depth, &[], !vcm.algorithm.use_vm()),
            samples_per_pixel: settings.samples_per_pixel,
            base_radius: 0.0,
            factors,
            root_mis: mis.with_path_count(light_path_count),
            mis,
            light_paths: LightPathBuffer::new(),
            merger: VertexMerger::new(),
            direct_importance: DirectImportancePartition::new(),
        }
    }

    fn algorithm(&self) -> VcmAlgorithm {
        self.settings.algorithm
    }

    /// Merge radius of the current frame.
    pub fn radius(&self) -> f32 {
        self.factors.radius
    }

    fn splats_to_sensor(&self) -> bool {
        self.algorithm().use_vc() || self.algorithm().light_trace_only()
    }

    /// Connections from one eye vertex: direct light sampling with the
    /// light picked for this sample, then every vertex of the owned light
    /// path.
    #[allow(clippy::too_many_arguments)]
    fn vertex_connection(
        &self,
        ctx: &FrameContext,
        eye: &PathVertex,
        light_path: &[PathVertex],
        light: Option<(usize, f32)>,
        acc: &mut TileAccumulator,
        pixel: UVec2,
        rng: &mut RngHandle,
    ) {
        let max_depth = ctx.max_depth();
        if eye.depth + 1 > max_depth {
            return;
        }
        if let Some((light_id, light_pdf)) = light {
            let emission = EmissionVertex::new(light_id, light_pdf, rng.get_float2());
            let direct = connect_emission(eye, &emission, ctx.scene, &self.mis);
            self.layout.record(acc, pixel, eye.depth + 1, 1, direct);
        }

        for light in light_path {
            let total_depth = eye.depth + light.depth + 1;
            if !light.is_valid() || total_depth > max_depth {
                break;
            }
            let contrib = connect_vertices(eye, light, ctx.scene, &self.mis);
            self.layout.record(acc, pixel, total_depth, light.depth + 1, contrib);
        }
    }
}

impl Renderer for VcmRenderer {
    fn name(&self) -> &'static str {
        "vcm"
    }

    fn channel_names(&self) -> Vec<String> {
        self.layout.names().to_vec()
    }

    fn preprocess(&mut self, ctx: &FrameContext) {
        let (_, scene_radius) = ctx.scene.bounding_box().bounding_sphere();
        self.base_radius = self.settings.radius_factor * scene_radius;
        log::info!(
            "VCM ({:?}): base merge radius {:.5}, {} light paths per frame",
            self.algorithm(),
            self.base_radius,
            ctx.settings.light_path_count()
        );
    }

    fn begin_frame(&mut self, ctx: &FrameContext, rngs: &mut [RngHandle]) {
        let algorithm = self.algorithm();
        let light_path_count = ctx.settings.light_path_count();

        let radius = merge_radius(self.base_radius, ctx.frame as u32, self.settings.radius_alpha);
        self.factors = MergeFactors::new(
            radius,
            light_path_count,
            ctx.settings.mis,
            algorithm.use_vc(),
            algorithm.use_vm(),
        );
        self.mis = MisContext::vertex_merging(
            ctx.settings.mis,
            self.samples_per_pixel as usize,
            self.factors.vc_weight_factor,
            self.factors.vm_weight_factor,
        );
        self.root_mis = self.mis.with_path_count(light_path_count);

        self.light_paths
            .resize(light_path_count, ctx.max_light_depth());
        self.light_paths
            .sample(ctx.scene, ctx.light_sampler, &self.mis, rngs);

        if self.splats_to_sensor() {
            if let Some(rng) = rngs.first_mut() {
                self.direct_importance
                    .build(self.light_paths.vertices(), ctx.sensor, ctx.tiles, rng);
            }
        }
        if algorithm.use_vm() {
            self.merger.build(self.light_paths.vertices(), &self.factors);
        }
        log::debug!("VCM frame {}: merge radius {:.6}", ctx.frame, radius);
    }

    fn process_tile(&self, ctx: &FrameContext, tile: &Tile, rng: &mut RngHandle) -> TileAccumulator {
        let algorithm = self.algorithm();
        let mut acc = self.layout.tile_accumulator(tile);
        let spp = self.samples_per_pixel as usize;
        let importance_scale = 1.0 / self.samples_per_pixel as f32;

        for pixel in tile.pixels() {
            acc.add_sample(pixel);
            let pixel_index = ctx.pixel_index(pixel);

            for sample in 0..spp {
                let mut primary = sample_primary_eye(ctx, pixel, &self.root_mis, rng);
                if !primary.is_valid() {
                    continue;
                }
                primary.throughput *= importance_scale;

                let light_path = self.light_paths.path(pixel_index * spp + sample);
                let light = ctx
                    .light_sampler
                    .sample(rng.get_float())
                    .map(|pick| (pick.value, pick.pdf));

                let mut eye_path = Path::new(primary, ctx.max_depth());
                while let Some(eye) = eye_path.advance(ctx.scene, &self.mis, rng) {
                    // Photon mapping merges at the first diffuse vertex only
                    if algorithm.ppm() && eye.depth > 1 && eye.sampled_event != ScatteringEvent::Specular {
                        break;
                    }

                    let le = emitted_radiance(eye, ctx.scene, ctx.light_sampler, &self.mis);
                    self.layout.record(&mut acc, pixel, eye.depth, 0, le);
                    if algorithm.light_trace_only() {
                        break;
                    }
                    if eye.surface().is_none() || eye.bsdf.is_delta() {
                        continue;
                    }

                    if algorithm.use_vc() {
                        self.vertex_connection(ctx, eye, light_path, light, &mut acc, pixel, rng);
                    }
                    if algorithm.use_vm() {
                        let layout = &self.layout;
                        self.merger.merge(
                            eye,
                            self.light_paths.vertices(),
                            ctx.max_depth(),
                            &self.mis,
                            algorithm.ppm(),
                            |total_depth, contrib| layout.record_merge(&mut acc, pixel, total_depth, contrib),
                        );
                    }
                }
            }
        }

        if self.splats_to_sensor() {
            connect_light_vertices_to_sensor(
                ctx,
                tile,
                &self.direct_importance,
                self.light_paths.vertices(),
                &self.root_mis,
                algorithm.light_trace_only(),
                &self.layout,
                &mut acc,
            );
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererKind;
    use crate::light_sampler::PowerLightSampler;
    use crate::tiles::TileGrid;
    use vcm_core::presets::cornell_box;
    use vcm_core::Scene;

    #[test]
    fn test_radius_shrinks_over_frames() {
        let (scene, camera) = cornell_box(8, 8).expect("scene");
        let vcm = VcmSettings::default();
        let settings = RenderSettings {
            width: 8,
            height: 8,
            max_depth: 3,
            worker_count: 2,
            renderer: RendererKind::Vcm(vcm),
            ..Default::default()
        };
        let sampler = PowerLightSampler::new(&scene);
        let tiles = TileGrid::new(8, 8, settings.tile_size);
        let mut renderer = VcmRenderer::new(&settings, &vcm);
        let mut rngs = vec![RngHandle::new(42), RngHandle::new(43)];

        let mut radii = Vec::new();
        for frame in 0..3 {
            let ctx = FrameContext {
                scene: &scene,
                sensor: &camera,
                light_sampler: &sampler,
                settings: &settings,
                tiles: &tiles,
                frame,
            };
            if frame == 0 {
                renderer.preprocess(&ctx);
            }
            renderer.begin_frame(&ctx, &mut rngs);
            radii.push(renderer.radius());
        }

        let (_, scene_radius) = scene.bounding_box().bounding_sphere();
        assert!((radii[0] - vcm.radius_factor * scene_radius).abs() < 1e-6);
        assert!(radii[1] < radii[0] && radii[2] < radii[1]);
        assert_eq!(renderer.root_mis.path_count, 64.0);
        assert_eq!(renderer.mis.path_count, 1.0);
    }

    #[test]
    fn test_strategy_channels_without_merging() {
        let settings = RenderSettings {
            max_depth: 3,
            ..Default::default()
        };
        for (algorithm, with_strategies) in [
            (VcmAlgorithm::Bpt, true),
            (VcmAlgorithm::LightTrace, true),
            (VcmAlgorithm::Bpm, false),
            (VcmAlgorithm::Vcm, false),
        ] {
            let vcm = VcmSettings {
                algorithm,
                ..Default::default()
            };
            let names = VcmRenderer::new(&settings, &vcm).channel_names();
            assert_eq!(names[0], "final_render");
            assert_eq!(
                names.iter().any(|n| n == "strategy_s_2_t_2"),
                with_strategies,
                "{algorithm:?}"
            );
        }
    }
}
