//! Error types for the merge engine.

use std::path::PathBuf;

/// Errors raised at the engine's configuration boundary.
///
/// Collaborator failures never surface here; they degrade to their
/// documented fallbacks inside the component that called them.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A confidence threshold outside `[0, 1]` (or NaN).
    #[error("confidence threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    /// Two reasoning layers registered under the same name.
    #[error("duplicate reasoning layer name: {0}")]
    DuplicateLayer(String),

    /// The repository root to index does not exist or is not a directory.
    #[error("repository root not found: {}", .0.display())]
    RepositoryNotFound(PathBuf),
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
