//! Frame controller: owns the framebuffer, the worker RNG pool and the
//! renderer, and runs one deterministic frame at a time.

use crate::config::RenderSettings;
use crate::error::RenderResult;
use crate::framebuffer::Framebuffer;
use crate::light_sampler::PowerLightSampler;
use crate::parallel::process_tiles;
use crate::renderers::{create_renderer, FrameContext, Renderer};
use crate::rng::RngPool;
use crate::tiles::TileGrid;
use std::time::Instant;
use vcm_core::{Color, Scene, SceneError, Sensor};
use vcm_math::UVec2;

/// Drives a renderer frame after frame, accumulating into one framebuffer.
///
/// ```ignore
/// let mut controller = FrameController::new(settings, &scene, &camera)?;
/// for _ in 0..16 {
///     controller.render_frame();
/// }
/// let image = controller.framebuffer().to_rgba(0);
/// ```
pub struct FrameController<'a> {
    scene: &'a dyn Scene,
    sensor: &'a dyn Sensor,
    settings: RenderSettings,
    light_sampler: PowerLightSampler,
    tiles: TileGrid,
    renderer: Box<dyn Renderer>,
    framebuffer: Framebuffer,
    rngs: RngPool,
    frame: usize,
}

impl<'a> FrameController<'a> {
    /// Validate `settings` against the scene and prepare the renderer.
    pub fn new(settings: RenderSettings, scene: &'a dyn Scene, sensor: &'a dyn Sensor) -> RenderResult<Self> {
        settings.validate()?;
        if scene.light_count() == 0 {
            return Err(SceneError::NoLights.into());
        }
        let resolution = sensor.resolution();
        if resolution != UVec2::new(settings.width, settings.height) {
            log::warn!(
                "Sensor resolution {}x{} differs from the framebuffer {}x{}",
                resolution.x,
                resolution.y,
                settings.width,
                settings.height
            );
        }

        let light_sampler = PowerLightSampler::new(scene);
        let tiles = TileGrid::new(settings.width, settings.height, settings.tile_size);
        let mut renderer = create_renderer(&settings)?;

        let mut framebuffer = Framebuffer::new(settings.width, settings.height);
        for name in renderer.channel_names() {
            framebuffer.add_channel(name);
        }
        let rngs = RngPool::new(settings.seed, settings.worker_count);

        let ctx = FrameContext {
            scene,
            sensor,
            light_sampler: &light_sampler,
            settings: &settings,
            tiles: &tiles,
            frame: 0,
        };
        renderer.preprocess(&ctx);

        log::info!(
            "Renderer {}: {}x{}, max depth {}, {} tiles over {} workers, {} channels",
            renderer.name(),
            settings.width,
            settings.height,
            settings.max_depth,
            tiles.len(),
            settings.worker_count,
            framebuffer.channel_count()
        );

        Ok(Self {
            scene,
            sensor,
            settings,
            light_sampler,
            tiles,
            renderer,
            framebuffer,
            rngs,
            frame: 0,
        })
    }

    /// Render one frame and accumulate it.
    pub fn render_frame(&mut self) {
        let start = Instant::now();
        log::info!("Frame {} started", self.frame);

        self.rngs.reseed(self.frame);
        let ctx = FrameContext {
            scene: self.scene,
            sensor: self.sensor,
            light_sampler: &self.light_sampler,
            settings: &self.settings,
            tiles: &self.tiles,
            frame: self.frame,
        };

        self.renderer.begin_frame(&ctx, self.rngs.handles_mut());

        let renderer = &*self.renderer;
        let accumulators = process_tiles(self.tiles.tiles(), self.rngs.handles_mut(), |tile, rng| {
            renderer.process_tile(&ctx, tile, rng)
        });
        for acc in &accumulators {
            self.framebuffer.merge_tile(acc);
        }

        self.renderer.end_frame(&ctx);
        self.frame += 1;
        log::info!(
            "Frame {} done in {:.2?}",
            self.frame - 1,
            start.elapsed()
        );
    }

    /// Render `count` frames.
    pub fn render(&mut self, count: usize) {
        for _ in 0..count {
            self.render_frame();
        }
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Frames accumulated so far.
    pub fn frame_count(&self) -> usize {
        self.frame
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Mean of the `final_render` channel.
    pub fn final_image(&self) -> Vec<Color> {
        self.framebuffer.resolve(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImportanceCacheSettings, RecordPlacement, RendererKind, VcmAlgorithm, VcmSettings};
    use crate::error::{ConfigError, RenderError};
    use crate::mis::MisHeuristic;
    use vcm_core::presets::{cornell_box, lit_floor};
    use vcm_core::{Lambertian, SceneBuilder, Sphere};
    use vcm_math::{Vec2, Vec3, Vec4};

    fn settings(width: u32, height: u32, renderer: RendererKind) -> RenderSettings {
        RenderSettings {
            width,
            height,
            max_depth: 3,
            tile_size: 4,
            worker_count: 2,
            seed: 42,
            renderer,
            ..Default::default()
        }
    }

    fn all_renderers() -> Vec<RendererKind> {
        vec![
            RendererKind::Bpt,
            RendererKind::UniformResamplingBpt { light_path_count: 32 },
            RendererKind::Vcm(VcmSettings {
                radius_factor: 0.05,
                ..Default::default()
            }),
            RendererKind::ImportanceCachingBpt(ImportanceCacheSettings {
                resampling_path_count: 32,
                placement: RecordPlacement::Uniform { count: 36 },
                ..Default::default()
            }),
        ]
    }

    #[test]
    fn test_same_seed_gives_identical_frames() {
        let (scene, camera) = cornell_box(8, 8).expect("scene");
        for renderer in all_renderers() {
            let mut a = FrameController::new(settings(8, 8, renderer.clone()), &scene, &camera).expect("valid");
            let mut b = FrameController::new(settings(8, 8, renderer.clone()), &scene, &camera).expect("valid");
            a.render(2);
            b.render(2);

            let fa = a.framebuffer();
            let fb = b.framebuffer();
            assert_eq!(fa.channel_names(), fb.channel_names());
            for c in 0..fa.channel_count() {
                assert_eq!(fa.channel(c), fb.channel(c), "{} channel {}", a.renderer_name(), fa.channel_names()[c]);
            }
            assert!(fa.channel(0).iter().any(|v| v.truncate() != Vec3::ZERO), "{}", a.renderer_name());
        }
    }

    #[test]
    fn test_alpha_counts_frames() {
        let (scene, camera) = cornell_box(8, 8).expect("scene");
        for renderer in all_renderers() {
            let mut controller = FrameController::new(settings(8, 8, renderer), &scene, &camera).expect("valid");
            controller.render(3);
            assert_eq!(controller.frame_count(), 3);
            let fb = controller.framebuffer();
            for c in 0..fb.channel_count() {
                assert!(fb.channel(c).iter().all(|v| v.w == 3.0));
            }
        }
    }

    #[test]
    fn test_strategy_channels_sum_to_depth() {
        let (scene, camera) = cornell_box(8, 8).expect("scene");
        let icbpt = |selector: &str| {
            RendererKind::ImportanceCachingBpt(ImportanceCacheSettings {
                resampling_path_count: 32,
                placement: RecordPlacement::Uniform { count: 36 },
                distribution_selector: selector.to_string(),
                ..Default::default()
            })
        };
        for renderer in [
            RendererKind::Bpt,
            RendererKind::UniformResamplingBpt { light_path_count: 16 },
            RendererKind::Vcm(VcmSettings {
                algorithm: VcmAlgorithm::Bpt,
                ..Default::default()
            }),
            icbpt("FUBC"),
            // Records beside the ceiling light never see its emission
            // vertices, so their lookups resample uniformly
            icbpt("F"),
        ] {
            let mut controller = FrameController::new(settings(8, 8, renderer), &scene, &camera).expect("valid");
            controller.render(2);
            let fb = controller.framebuffer();

            for depth in 1..=3u32 {
                let depth_channel = fb.channel_by_name(&format!("depth_{depth}")).expect("depth channel");
                let vertex_count = depth + 1;
                let strategies: Vec<&[Vec4]> = (0..=vertex_count)
                    .map(|s| {
                        fb.channel_by_name(&format!("strategy_s_{}_t_{}", s, vertex_count - s))
                            .expect("strategy channel")
                    })
                    .collect();
                for (pixel, expected) in depth_channel.iter().enumerate() {
                    let sum: Vec3 = strategies.iter().map(|c| c[pixel].truncate()).sum();
                    let diff = (sum - expected.truncate()).abs().max_element();
                    assert!(diff <= 1e-4 * expected.truncate().max_element().max(1.0));
                }
            }
        }
    }

    /// Irradiance at `point` on the floor from the lit floor's light,
    /// integrated on a fine grid over the light quad.
    fn floor_irradiance(point: Vec3, radiance: f32) -> f32 {
        let n = 64;
        let cell = 0.2 / n as f32;
        let mut sum = 0.0;
        for i in 0..n {
            for j in 0..n {
                let light = Vec3::new(-0.1 + (i as f32 + 0.5) * cell, 1.0, -0.1 + (j as f32 + 0.5) * cell);
                let d = light - point;
                let dist_squared = d.length_squared();
                let cos_floor = d.y / dist_squared.sqrt();
                let cos_light = cos_floor;
                sum += radiance * cos_floor * cos_light / dist_squared * cell * cell;
            }
        }
        sum
    }

    #[test]
    fn test_direct_lighting_matches_irradiance() {
        let (albedo, radiance) = (0.5, 10.0);
        let (scene, camera) = lit_floor(16, 16, albedo, radiance).expect("scene");

        let mut expected = 0.0;
        for y in 6..10 {
            for x in 6..10 {
                let ray = camera
                    .sample_exitant_ray(UVec2::new(x, y), Vec2::ZERO, Vec2::splat(0.5))
                    .expect("camera ray");
                let hit = scene.intersect(&ray.ray).expect("floor hit");
                expected += albedo / std::f32::consts::PI * floor_irradiance(hit.position, radiance);
            }
        }

        for (renderer, tolerance) in [
            (RendererKind::Bpt, 0.1),
            (RendererKind::UniformResamplingBpt { light_path_count: 32 }, 0.15),
            (RendererKind::Vcm(VcmSettings::default()), 0.15),
            (
                RendererKind::ImportanceCachingBpt(ImportanceCacheSettings {
                    resampling_path_count: 32,
                    placement: RecordPlacement::Uniform { count: 36 },
                    ..Default::default()
                }),
                0.15,
            ),
        ] {
            let mut s = settings(16, 16, renderer);
            s.max_depth = 2;
            let mut controller = FrameController::new(s, &scene, &camera).expect("valid");
            controller.render(64);

            let fb = controller.framebuffer();
            let depth_2 = fb.channel_by_name("depth_2").expect("depth channel");
            let mut estimate = 0.0;
            for y in 6..10 {
                for x in 6..10 {
                    let v = depth_2[fb.pixel_index(UVec2::new(x, y))];
                    estimate += v.x / v.w;
                }
            }
            let relative = (estimate - expected).abs() / expected;
            assert!(
                relative < tolerance,
                "{}: estimate {estimate} expected {expected}",
                controller.renderer_name()
            );
        }
    }

    #[test]
    fn test_vcm_variants_render() {
        let (scene, camera) = cornell_box(8, 8).expect("scene");
        for algorithm in [
            VcmAlgorithm::LightTrace,
            VcmAlgorithm::Ppm,
            VcmAlgorithm::Bpm,
            VcmAlgorithm::Bpt,
            VcmAlgorithm::Vcm,
        ] {
            let renderer = RendererKind::Vcm(VcmSettings {
                algorithm,
                radius_factor: 0.05,
                ..Default::default()
            });
            let mut controller = FrameController::new(settings(8, 8, renderer), &scene, &camera).expect("valid");
            controller.render(1);
            let image = controller.final_image();
            assert!(image.iter().all(|c| c.is_finite() && c.min_element() >= 0.0), "{algorithm:?}");
            assert!(image.iter().any(|c| *c != Color::ZERO), "{algorithm:?}");
        }
    }

    #[test]
    fn test_power_heuristic_renders() {
        let (scene, camera) = cornell_box(8, 8).expect("scene");
        let mut s = settings(8, 8, RendererKind::Bpt);
        s.mis = MisHeuristic::Power;
        let mut controller = FrameController::new(s, &scene, &camera).expect("valid");
        controller.render(1);
        assert!(controller.final_image().iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_invalid_settings_are_rejected_before_rendering() {
        let (scene, camera) = cornell_box(8, 8).expect("scene");
        let mut s = settings(8, 8, RendererKind::Bpt);
        s.max_depth = 0;
        assert!(matches!(
            FrameController::new(s, &scene, &camera),
            Err(RenderError::Config(ConfigError::ZeroMaxDepth))
        ));
    }

    #[test]
    fn test_scene_without_lights_is_rejected() {
        let mut builder = SceneBuilder::new();
        builder.add(Sphere::new(Vec3::ZERO, 1.0), Lambertian::new(Color::splat(0.5)));
        let scene = builder.build().expect("scene");
        let (_, camera) = cornell_box(8, 8).expect("camera");
        assert!(matches!(
            FrameController::new(settings(8, 8, RendererKind::Bpt), &scene, &camera),
            Err(RenderError::Scene(SceneError::NoLights))
        ));
    }
}
