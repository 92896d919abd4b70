use thiserror::Error;
use vcm_core::SceneError;

/// Invalid render settings, detected before any frame runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Framebuffer must not be empty ({width}x{height})")]
    EmptyFramebuffer { width: u32, height: u32 },

    #[error("Maximum path depth must be at least 1")]
    ZeroMaxDepth,

    #[error("Samples per pixel must be at least 1")]
    ZeroSamplesPerPixel,

    #[error("Tile size must be at least 1")]
    ZeroTileSize,

    #[error("Worker count must be at least 1")]
    ZeroWorkers,

    #[error("Light path count must be at least 1")]
    ZeroLightPaths,

    #[error("Vertex merging needs a positive radius factor, got {0}")]
    InvalidMergeRadius(f32),

    #[error("Radius reduction alpha must lie in [0, 1], got {0}")]
    InvalidRadiusAlpha(f32),

    #[error("Resampling path count must be at least 1")]
    ZeroResamplingPaths,

    #[error("Resampling path count {resampling} exceeds the {available} light paths of a frame")]
    TooManyResamplingPaths { resampling: usize, available: usize },

    #[error("Importance records per shading point must be at least 1")]
    ZeroRecordsPerPoint,

    #[error("Importance record density must lie in (0, 1], got {0}")]
    InvalidRecordDensity(f32),

    #[error("Uniform importance record count must be at least 1")]
    ZeroUniformRecords,

    #[error("Distribution selector is empty")]
    EmptyDistributionSelector,

    #[error("Unknown distribution '{0}' in selector (expected F, U, B or C)")]
    UnknownDistribution(char),
}

/// Errors surfaced by the frame controller.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid settings: {0}")]
    Config(#[from] ConfigError),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Settings serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;
