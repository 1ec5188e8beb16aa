//! Error types
//!
//! `CompanionError` is what the public API returns. `AssetError` stays
//! inside the resource loader unless a strict load asks for it.

use std::path::PathBuf;

use crate::config::StageId;

pub type CompanionResult<T> = Result<T, CompanionError>;

#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    /// The surface cannot host a 3D view; callers switch to a 2D presentation.
    #[error("3D rendering unavailable: {0}")]
    RenderingUnavailable(String),

    /// A second evolution was requested while one is in flight.
    #[error("evolution already in progress")]
    EvolutionInProgress,

    /// A step of the evolution sequence failed.
    #[error("evolution sequence failed: {0}")]
    SequenceFailure(String),

    #[error("scene has been disposed")]
    SceneDisposed,

    #[error("companion view not initialized")]
    NotInitialized,

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

impl CompanionError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn sequence(msg: impl Into<String>) -> Self {
        Self::SequenceFailure(msg.into())
    }
}

/// Errors that can occur while loading a model asset.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// I/O error reading the asset file.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The asset was read but could not be decoded.
    #[error("parse error for {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unknown stage: {0}")]
    UnknownStage(StageId),

    /// Loader thread went away or the asset produced no geometry.
    #[error("failed to load {stage}: {message}")]
    LoadFailed { stage: StageId, message: String },
}

impl AssetError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn load_failed(stage: &StageId, message: impl Into<String>) -> Self {
        Self::LoadFailed {
            stage: stage.clone(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_are_stable() {
        assert!(CompanionError::RenderingUnavailable("no surface".into())
            .to_string()
            .starts_with("3D rendering unavailable"));
        assert!(CompanionError::sequence("x").to_string().contains("evolution sequence failed"));
        assert!(CompanionError::config("x").to_string().starts_with("config error"));
    }

    #[test]
    fn test_asset_error_wraps_transparently() {
        let err: CompanionError = AssetError::UnknownStage(StageId::from("elder")).into();
        assert_eq!(err.to_string(), "unknown stage: elder");
    }
}
