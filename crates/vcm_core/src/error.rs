use thiserror::Error;

/// Errors that can occur while assembling a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Scene has no geometry")]
    NoGeometry,

    #[error("Scene has no light source")]
    NoLights,

    #[error("Degenerate light {index}: zero area or zero radiance")]
    DegenerateLight { index: usize },
}

/// Result type for scene construction.
pub type SceneResult<T> = Result<T, SceneError>;
