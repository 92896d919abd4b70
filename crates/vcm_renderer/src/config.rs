//! Render settings.
//!
//! Settings are plain serde structs persisted as JSON. Every nested
//! renderer configuration falls back to its defaults for missing fields,
//! so a settings file only needs to name what it changes:
//!
//! ```ignore
//! let settings = RenderSettings::from_json(r#"{
//!     "width": 320, "height": 240,
//!     "renderer": { "type": "vcm", "algorithm": "bpm" }
//! }"#)?;
//! ```

use crate::error::{ConfigError, RenderResult};
use crate::importance_cache::DistributionKind;
use crate::mis::MisHeuristic;
use crate::tiles::DEFAULT_TILE_SIZE;
use serde::{Deserialize, Serialize};

/// Estimators combined by the VCM renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VcmAlgorithm {
    /// Light vertices splatted to the sensor only
    LightTrace,
    /// Progressive photon mapping: merging at the first diffuse eye vertex
    Ppm,
    /// Bidirectional photon mapping: merging at every eye vertex
    Bpm,
    /// Connections only
    Bpt,
    #[default]
    Vcm,
}

impl VcmAlgorithm {
    pub fn use_vc(self) -> bool {
        matches!(self, VcmAlgorithm::Bpt | VcmAlgorithm::Vcm)
    }

    pub fn use_vm(self) -> bool {
        matches!(self, VcmAlgorithm::Ppm | VcmAlgorithm::Bpm | VcmAlgorithm::Vcm)
    }

    pub fn ppm(self) -> bool {
        self == VcmAlgorithm::Ppm
    }

    pub fn light_trace_only(self) -> bool {
        self == VcmAlgorithm::LightTrace
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcmSettings {
    pub algorithm: VcmAlgorithm,
    /// Initial merging radius, relative to the scene bounding sphere
    pub radius_factor: f32,
    /// Radius reduction exponent across iterations
    pub radius_alpha: f32,
}

impl Default for VcmSettings {
    fn default() -> Self {
        Self {
            algorithm: VcmAlgorithm::Vcm,
            radius_factor: 0.003,
            radius_alpha: 0.75,
        }
    }
}

/// Where importance records are placed each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPlacement {
    /// Jittered samples over the whole scene surface
    Uniform { count: usize },
    /// Primary hits of a jittered screen grid, extended along BSDF samples.
    /// `density` is the fraction of pixels that get a record.
    ScreenGrid { density: f32 },
}

impl Default for RecordPlacement {
    fn default() -> Self {
        RecordPlacement::ScreenGrid { density: 0.001 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceCacheSettings {
    /// Light paths the distributions of a record range over (R)
    pub resampling_path_count: usize,
    pub placement: RecordPlacement,
    /// Records combined at each shading point (k)
    pub records_per_point: usize,
    /// Candidates gathered by distance before filtering by orientation,
    /// as a multiple of `records_per_point`
    pub unfiltered_factor: usize,
    /// Enabled distributions, among `F`, `U`, `B` and `C`
    pub distribution_selector: String,
    /// Confidence factor of each enabled distribution for the alpha-max
    /// heuristic
    pub alpha: [f32; 4],
    /// Alpha-max instead of balance weighting between distributions
    pub use_alpha_max: bool,
    /// Prune each distribution by the alpha-max indicators once built
    pub optimize: bool,
    /// Incident angle bound used by the bounded distribution, in degrees
    pub min_incident_angle: f32,
}

impl Default for ImportanceCacheSettings {
    fn default() -> Self {
        Self {
            resampling_path_count: 1024,
            placement: RecordPlacement::default(),
            records_per_point: 3,
            unfiltered_factor: 2,
            distribution_selector: "FC".to_string(),
            alpha: [1.0; 4],
            use_alpha_max: true,
            optimize: true,
            min_incident_angle: 0.0,
        }
    }
}

impl ImportanceCacheSettings {
    /// Parsed distribution selector.
    pub fn distribution_kinds(&self) -> Result<Vec<DistributionKind>, ConfigError> {
        DistributionKind::parse_selector(&self.distribution_selector)
    }

    /// Cosine of `min_incident_angle`.
    pub fn cos_max_incident_angle(&self) -> f32 {
        self.min_incident_angle.to_radians().cos()
    }
}

fn default_resampled_light_paths() -> usize {
    1024
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RendererKind {
    /// One light path per pixel, connected to every eye vertex
    Bpt,
    /// A shared pool of light paths, one picked uniformly per sample
    UniformResamplingBpt {
        #[serde(default = "default_resampled_light_paths")]
        light_path_count: usize,
    },
    Vcm(VcmSettings),
    /// Light vertices resampled from importance-cached distributions
    ImportanceCachingBpt(ImportanceCacheSettings),
}

impl Default for RendererKind {
    fn default() -> Self {
        RendererKind::Vcm(VcmSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    /// Maximum number of path edges
    pub max_depth: u32,
    pub samples_per_pixel: u32,
    pub tile_size: u32,
    pub worker_count: usize,
    pub seed: u64,
    pub mis: MisHeuristic,
    pub renderer: RendererKind,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            max_depth: 5,
            samples_per_pixel: 1,
            tile_size: DEFAULT_TILE_SIZE,
            worker_count: rayon::current_num_threads(),
            seed: 1024,
            mis: MisHeuristic::default(),
            renderer: RendererKind::default(),
        }
    }
}

impl RenderSettings {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Light paths sampled per frame by the configured renderer.
    pub fn light_path_count(&self) -> usize {
        match &self.renderer {
            RendererKind::Bpt | RendererKind::ImportanceCachingBpt(_) => self.pixel_count(),
            RendererKind::UniformResamplingBpt { light_path_count } => *light_path_count,
            RendererKind::Vcm(_) => self.pixel_count() * self.samples_per_pixel as usize,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyFramebuffer {
                width: self.width,
                height: self.height,
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroMaxDepth);
        }
        if self.samples_per_pixel == 0 {
            return Err(ConfigError::ZeroSamplesPerPixel);
        }
        if self.tile_size == 0 {
            return Err(ConfigError::ZeroTileSize);
        }
        if self.worker_count == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        match &self.renderer {
            RendererKind::Bpt => {}
            RendererKind::UniformResamplingBpt { light_path_count } => {
                if *light_path_count == 0 {
                    return Err(ConfigError::ZeroLightPaths);
                }
            }
            RendererKind::Vcm(vcm) => {
                if vcm.algorithm.use_vm() && !(vcm.radius_factor > 0.0) {
                    return Err(ConfigError::InvalidMergeRadius(vcm.radius_factor));
                }
                if !(0.0..=1.0).contains(&vcm.radius_alpha) {
                    return Err(ConfigError::InvalidRadiusAlpha(vcm.radius_alpha));
                }
            }
            RendererKind::ImportanceCachingBpt(cache) => {
                if cache.resampling_path_count == 0 {
                    return Err(ConfigError::ZeroResamplingPaths);
                }
                let available = self.light_path_count();
                if cache.resampling_path_count > available {
                    return Err(ConfigError::TooManyResamplingPaths {
                        resampling: cache.resampling_path_count,
                        available,
                    });
                }
                if cache.records_per_point == 0 {
                    return Err(ConfigError::ZeroRecordsPerPoint);
                }
                match cache.placement {
                    RecordPlacement::Uniform { count } if count == 0 => {
                        return Err(ConfigError::ZeroUniformRecords);
                    }
                    RecordPlacement::ScreenGrid { density } if !(density > 0.0 && density <= 1.0) => {
                        return Err(ConfigError::InvalidRecordDensity(density));
                    }
                    _ => {}
                }
                cache.distribution_kinds()?;
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> RenderResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate settings.
    pub fn from_json(json: &str) -> RenderResult<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }
}
