//! Error taxonomy for the model lifecycle
//!
//! Every error that can reach the host carries an [`ErrorCategory`]. The host
//! uses the category to decide on the remedial action (prompt for permission,
//! free memory, retry later) rather than showing a generic failure.

use crate::engine::EngineError;
use crate::guard::GuardError;
use crate::state::LifecycleState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a lifecycle failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The model artifact is missing at the expected location
    ArtifactNotFound,
    /// Storage permission was declined or the request timed out
    PermissionDenied,
    /// The artifact exists but is too small or was rejected by the engine
    ArtifactCorrupt,
    /// The engine ran out of memory while loading
    OutOfMemory,
    /// The selected compute backend could not be initialized
    BackendUnsupported,
    /// Any other load failure
    TransientLoadFailure,
    /// The controller is not in the READY state
    NotReady,
    /// Another lifecycle operation is in flight
    Busy,
    /// The engine failed to produce output for a prompt
    InferenceFailed,
    /// The load cycle was abandoned by `unload`
    Cancelled,
    /// A different model or backend is already loaded
    ModelMismatch,
    /// Internal invariant violation or a panicked task
    Internal,
}

impl ErrorCategory {
    /// Whether a load failure of this category is retried under the retry policy.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::OutOfMemory
                | ErrorCategory::BackendUnsupported
                | ErrorCategory::TransientLoadFailure
        )
    }

    /// Whether a retry after this failure must fall back to the CPU backend.
    pub fn degrades_backend(self) -> bool {
        matches!(
            self,
            ErrorCategory::OutOfMemory | ErrorCategory::BackendUnsupported
        )
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::ArtifactNotFound => "artifact_not_found",
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::ArtifactCorrupt => "artifact_corrupt",
            ErrorCategory::OutOfMemory => "out_of_memory",
            ErrorCategory::BackendUnsupported => "backend_unsupported",
            ErrorCategory::TransientLoadFailure => "transient_load_failure",
            ErrorCategory::NotReady => "not_ready",
            ErrorCategory::Busy => "busy",
            ErrorCategory::InferenceFailed => "inference_failed",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::ModelMismatch => "model_mismatch",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Failure to turn a model name into a loadable artifact path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ResolutionError {
    /// The model name cannot name a file (empty, or contains path components)
    #[error("invalid model name: {0:?}")]
    InvalidModelName(String),

    /// No artifact at the resolved location
    #[error("model artifact not found: {0}")]
    ArtifactNotFound(String),

    /// The user declined the storage permission
    #[error("storage permission denied for {0}")]
    PermissionDenied(String),

    /// No permission decision arrived in time
    #[error("permission request for {resource} timed out after {timeout_ms}ms")]
    PermissionTimeout { resource: String, timeout_ms: u64 },

    /// The artifact is implausibly small for a model
    #[error("model artifact {path} is {size} bytes, expected at least {min_size}")]
    ArtifactCorrupt {
        path: String,
        size: u64,
        min_size: u64,
    },
}

impl ResolutionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ResolutionError::InvalidModelName(_) | ResolutionError::ArtifactNotFound(_) => {
                ErrorCategory::ArtifactNotFound
            }
            ResolutionError::PermissionDenied(_) | ResolutionError::PermissionTimeout { .. } => {
                ErrorCategory::PermissionDenied
            }
            ResolutionError::ArtifactCorrupt { .. } => ErrorCategory::ArtifactCorrupt,
        }
    }
}

/// Errors returned by load/unload operations on the controller
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// Path resolution failed; never retried
    #[error("model resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// The engine rejected the load on the final attempt
    #[error("model load failed after {attempts} attempt(s): {source}")]
    LoadFailed {
        attempts: u32,
        #[source]
        source: EngineError,
    },

    /// Another operation holds the controller
    #[error("controller busy: {0}")]
    Busy(String),

    /// A model is already loaded; callers must unload before switching
    #[error("{model} is already loaded on {backend}; unload before switching")]
    AlreadyLoaded {
        model: String,
        backend: crate::hardware::Backend,
    },

    /// `unload` abandoned the load cycle before it settled
    #[error("load of {0} was abandoned by unload")]
    Cancelled(String),

    /// A state change outside the permitted edges
    #[error("invalid lifecycle transition {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("internal lifecycle error: {0}")]
    Internal(String),
}

impl LifecycleError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LifecycleError::Resolution(e) => e.category(),
            LifecycleError::LoadFailed { source, .. } => source.category(),
            LifecycleError::Busy(_) => ErrorCategory::Busy,
            LifecycleError::AlreadyLoaded { .. } => ErrorCategory::ModelMismatch,
            LifecycleError::Cancelled(_) => ErrorCategory::Cancelled,
            LifecycleError::InvalidTransition { .. } | LifecycleError::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

impl From<GuardError> for LifecycleError {
    fn from(err: GuardError) -> Self {
        LifecycleError::Busy(err.to_string())
    }
}

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors returned by `run_inference`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InferenceError {
    /// Rejected without queueing; call `request_ready` first
    #[error("model is not ready (state: {0})")]
    NotReady(LifecycleState),

    /// The engine failed; the lifecycle state is unchanged
    #[error("inference failed: {0}")]
    Failed(String),
}

impl InferenceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            InferenceError::NotReady(_) => ErrorCategory::NotReady,
            InferenceError::Failed(_) => ErrorCategory::InferenceFailed,
        }
    }
}
