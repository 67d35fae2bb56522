//! # mofa-model-lifecycle
//!
//! On-device model lifecycle for MoFA: one model, one owner, guarded
//! transitions and inference telemetry.
//!
//! The [`ModelLifecycleController`] brings a model from UNINITIALIZED to
//! READY through path resolution and an engine load, retrying transient
//! failures with linear backoff and degrading from the accelerated backend
//! to CPU when the device cannot cope. Every load, unload and inference is
//! serialized by a FIFO [`ConcurrencyGuard`]; inference timings feed a
//! bounded [`MetricsAggregator`] that reports percentiles and degradation.
//!
//! ```text
//! UNINITIALIZED -> RESOLVING_PATH -> LOADING -> READY -> UNLOADING -> UNINITIALIZED
//!                        |              |
//!                        +--> ERROR <---+   (ERROR -> RESOLVING_PATH on retry)
//! ```
//!
//! The native engine and platform storage are supplied by the host through
//! the [`InferenceEngine`] and [`StorageAccess`] traits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use mofa_model_lifecycle::{
//!     Backend, DeviceCapabilityProbe, EngineError, EngineOutput, InferenceEngine,
//!     LifecycleConfig, LocalStorage, ModelHandle, ModelLifecycleController, ModelPathResolver,
//!     PlatformPolicy,
//! };
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl InferenceEngine for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!     async fn load(&self, _path: &Path, _backend: Backend) -> Result<ModelHandle, EngineError> {
//!         Ok(ModelHandle::new(1))
//!     }
//!     async fn unload(&self, _handle: ModelHandle) {}
//!     async fn infer(&self, _handle: &ModelHandle, prompt: &str) -> Result<EngineOutput, EngineError> {
//!         Ok(EngineOutput { text: prompt.to_string(), token_count: 1 })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LifecycleConfig::default();
//!     let resolver = ModelPathResolver::new(
//!         Arc::new(LocalStorage::permissive()),
//!         PlatformPolicy::Bundled { bundle_dir: "/opt/app/models".into() },
//!         &config,
//!     );
//!     let controller =
//!         ModelLifecycleController::new(config, Arc::new(Echo), DeviceCapabilityProbe::default(), resolver);
//!
//!     controller.request_ready("gemma-2b", None).await?;
//!     let outcome = controller.run_inference("Hello").await?;
//!     println!("{} on {:?}", outcome.text, controller.current_backend());
//!     println!("{}", controller.export_session().to_json()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod guard;
pub mod hardware;
pub mod metrics;
pub mod resolver;
pub mod retry;
pub mod state;
pub mod storage;

pub use config::{ConfigError, LifecycleConfig};
pub use controller::{InferenceOutcome, MemoryPressure, ModelLifecycleController};
pub use engine::{EngineError, EngineOutput, InferenceEngine, ModelHandle};
pub use error::{ErrorCategory, InferenceError, LifecycleError, LifecycleResult, ResolutionError};
pub use guard::{ConcurrencyGuard, GuardError, GuardToken, OperationKind};
pub use hardware::{
    Backend, DeviceCapabilities, DeviceCapabilityProbe, HardwareSource, StaticHardwareSource,
    SystemHardwareSource,
};
pub use metrics::{
    InferenceRecord, LoadRecord, MetricsAggregator, PerformanceSnapshot, SessionReport,
};
pub use resolver::{ModelPathResolver, PlatformPolicy};
pub use retry::{RetryDecision, RetryPolicy};
pub use state::{LifecycleState, LoadAttempt, StateTransition};
pub use storage::{AccessDecision, LocalStorage, ResourceClass, StorageAccess};
