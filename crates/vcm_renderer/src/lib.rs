//! Bidirectional light transport on the CPU.
//!
//! Four renderers share one path-vertex representation and one MIS
//! bookkeeping scheme:
//!
//! - **BPT**: bidirectional path tracing, one light path per pixel
//! - **Uniform resampling BPT**: a shared light path pool, one path picked per sample
//! - **VCM**: vertex connection and merging through a hash grid, also
//!   running light tracing, PPM, BPM and plain BPT
//! - **Importance caching BPT**: light vertices resampled from distributions
//!   cached at importance records and found through a k-d tree
//!
//! Frames are rendered tile by tile across a fixed worker pool. Every
//! worker owns a random stream reseeded per frame, so the same seed and
//! worker count give bit-identical framebuffers.
//!
//! # Example
//!
//! ```ignore
//! use vcm_core::presets::cornell_box;
//! use vcm_renderer::{FrameController, RenderSettings};
//!
//! let (scene, camera) = cornell_box(256, 256)?;
//! let mut controller = FrameController::new(RenderSettings::default(), &scene, &camera)?;
//! controller.render(16);
//! let rgba = controller.framebuffer().to_rgba(0);
//! ```

pub mod config;
pub mod direct_importance;
pub mod distribution;
pub mod error;
pub mod estimators;
pub mod frame;
pub mod framebuffer;
pub mod hash_grid;
pub mod importance_cache;
pub mod kd_tree;
pub mod light_paths;
pub mod light_sampler;
pub mod merging;
pub mod mis;
pub mod parallel;
pub mod path;
pub mod renderers;
pub mod rng;
pub mod sampling;
pub mod tiles;

pub use config::{ImportanceCacheSettings, RecordPlacement, RenderSettings, RendererKind, VcmAlgorithm, VcmSettings};
pub use error::{ConfigError, RenderError, RenderResult};
pub use frame::FrameController;
pub use framebuffer::{color_to_rgba, Framebuffer, TileAccumulator};
pub use importance_cache::{CacheState, ImportanceCache};
pub use mis::{MisContext, MisHeuristic};
pub use path::{EmissionVertex, Path, PathVertex, SensorVertex};
pub use renderers::{create_renderer, FrameContext, Renderer};
pub use rng::{RngHandle, RngPool};
pub use tiles::{Tile, TileGrid, DEFAULT_TILE_SIZE};
