//! Boundary to the native inference engine
//!
//! The engine loads a model file and generates text. Everything about
//! tokenization, sampling and the native runtime lives behind this trait;
//! the lifecycle controller only drives it.

use crate::error::ErrorCategory;
use crate::hardware::Backend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Opaque reference to a model instance inside the engine.
///
/// Not `Clone`: the controller is its only owner, and releasing it
/// (`InferenceEngine::unload`) consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ModelHandle {
    id: u64,
}

impl ModelHandle {
    /// Wrap an engine-specific instance identifier.
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Text produced for one prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub text: String,
    pub token_count: u32,
}

/// Errors reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("backend unsupported: {0}")]
    BackendUnsupported(String),

    #[error("artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    #[error("engine error: {0}")]
    Unknown(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::OutOfMemory(_) => ErrorCategory::OutOfMemory,
            EngineError::BackendUnsupported(_) => ErrorCategory::BackendUnsupported,
            EngineError::ArtifactCorrupt(_) => ErrorCategory::ArtifactCorrupt,
            EngineError::Unknown(_) => ErrorCategory::TransientLoadFailure,
            EngineError::InferenceFailed(_) => ErrorCategory::InferenceFailed,
        }
    }
}

/// Native inference engine driven by the lifecycle controller.
///
/// Implementations must be safe to call from any thread; the controller
/// never issues overlapping calls.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Engine name used in logs
    fn name(&self) -> &str;

    /// Load the model at `path` on `backend`.
    ///
    /// # Errors
    /// - `OutOfMemory` / `BackendUnsupported`: retried, falling back to CPU
    /// - `ArtifactCorrupt`: not retried
    /// - `Unknown`: retried on the same backend
    async fn load(&self, path: &Path, backend: Backend) -> Result<ModelHandle, EngineError>;

    /// Release a model instance.
    async fn unload(&self, handle: ModelHandle);

    /// Generate text for `prompt`.
    async fn infer(&self, handle: &ModelHandle, prompt: &str) -> Result<EngineOutput, EngineError>;
}
