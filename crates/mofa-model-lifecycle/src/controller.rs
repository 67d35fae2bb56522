//! ModelLifecycleController - the single owner of the loaded model
//!
//! The controller drives the state machine in [`crate::state`], owns the one
//! [`ModelHandle`] the process may hold, and serializes every mutating
//! operation through the [`ConcurrencyGuard`].
//!
//! - `request_ready` coalesces: concurrent callers for the same model share
//!   one physical load and observe the same outcome.
//! - Load cycles run on a spawned task, so callers never block a UI thread
//!   and a dropped caller does not stall the load.
//! - `unload` during a load cycle abandons it: the engine call is allowed to
//!   finish, its result is discarded and the controller settles in
//!   UNINITIALIZED instead of READY.
//! - `run_inference` never waits for READY; it rejects with `NotReady`.
//!
//! # Example
//!
//! ```rust,ignore
//! let controller = ModelLifecycleController::new(config, engine, probe, resolver);
//! controller.request_ready("gemma", None).await?;
//! let outcome = controller.run_inference("Hello").await?;
//! println!("{} ({:.1} tok/s)", outcome.text, outcome.record.tokens_per_second);
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::LifecycleConfig;
use crate::engine::{InferenceEngine, ModelHandle};
use crate::error::{InferenceError, LifecycleError, LifecycleResult};
use crate::guard::{ConcurrencyGuard, GuardToken, OperationKind};
use crate::hardware::{Backend, DeviceCapabilities, DeviceCapabilityProbe};
use crate::metrics::{InferenceRecord, LoadRecord, MetricsAggregator, PerformanceSnapshot, SessionReport};
use crate::resolver::ModelPathResolver;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::state::{LifecycleState, LoadAttempt, StateTransition};

/// Result of one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOutcome {
    pub text: String,
    pub record: InferenceRecord,
}

/// Memory pressure reported by the host OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressure {
    Moderate,
    Critical,
}

type LoadOutcome = Shared<BoxFuture<'static, LifecycleResult<()>>>;

struct InFlightLoad {
    id: u64,
    model: String,
    cancel: CancellationToken,
    outcome: LoadOutcome,
}

#[derive(Debug)]
struct CoreState {
    state: LifecycleState,
    model: Option<String>,
    backend: Option<Backend>,
    last_error: Option<LifecycleError>,
    attempts: Vec<LoadAttempt>,
}

struct ControllerInner {
    config: LifecycleConfig,
    engine: Arc<dyn InferenceEngine>,
    probe: Arc<DeviceCapabilityProbe>,
    resolver: ModelPathResolver,
    retry: RetryPolicy,
    guard: ConcurrencyGuard,
    metrics: Arc<MetricsAggregator>,
    core: RwLock<CoreState>,
    handle: AsyncMutex<Option<ModelHandle>>,
    in_flight: Mutex<Option<InFlightLoad>>,
    next_load_id: AtomicU64,
    transitions: broadcast::Sender<StateTransition>,
}

/// Cheaply cloneable; all clones share the same controller.
#[derive(Clone)]
pub struct ModelLifecycleController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for ModelLifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.core.read();
        f.debug_struct("ModelLifecycleController")
            .field("engine", &self.inner.engine.name())
            .field("state", &core.state)
            .field("model", &core.model)
            .field("backend", &core.backend)
            .finish()
    }
}

impl ModelLifecycleController {
    pub fn new(
        config: LifecycleConfig,
        engine: Arc<dyn InferenceEngine>,
        probe: DeviceCapabilityProbe,
        resolver: ModelPathResolver,
    ) -> Self {
        let metrics = MetricsAggregator::new(config.metrics_capacity)
            .with_degradation(config.degradation_window, config.degradation_threshold);
        if let Err(e) = config.validate() {
            warn!(error = %e, "lifecycle config failed validation, continuing with it as given");
        }
        let (transitions, _) = broadcast::channel(config.state_channel_capacity.max(1));
        let probe = probe.with_min_memory_mb(config.accelerated_min_memory_mb);

        info!(engine = engine.name(), policy = ?resolver.policy(), "model lifecycle controller created");

        Self {
            inner: Arc::new(ControllerInner {
                retry: config.retry_policy(),
                config,
                engine,
                probe: Arc::new(probe),
                resolver,
                guard: ConcurrencyGuard::new(),
                metrics: Arc::new(metrics),
                core: RwLock::new(CoreState {
                    state: LifecycleState::Uninitialized,
                    model: None,
                    backend: None,
                    last_error: None,
                    attempts: Vec::new(),
                }),
                handle: AsyncMutex::new(None),
                in_flight: Mutex::new(None),
                next_load_id: AtomicU64::new(1),
                transitions,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Load / unload
    // ------------------------------------------------------------------

    /// Bring `model` to READY.
    ///
    /// Returns immediately when `model` is already READY on a matching
    /// backend. With `preference = None` the backend comes from the device
    /// probe; `Some` pins it for the first attempt.
    ///
    /// # Errors
    /// - `Resolution`: artifact missing/corrupt or permission denied (not retried)
    /// - `LoadFailed`: retries exhausted or a non-retryable engine failure
    /// - `AlreadyLoaded`: another model or backend is READY; unload first
    /// - `Busy`: an unload or a load of another model is in progress
    /// - `Cancelled`: `unload` abandoned the load cycle
    pub async fn request_ready(
        &self,
        model: &str,
        preference: Option<Backend>,
    ) -> LifecycleResult<()> {
        self.start_or_join(model, preference, None).await
    }

    /// Like [`request_ready`](Self::request_ready), trying a host-cached
    /// artifact path first. The path is re-validated before use and falls
    /// back to normal resolution when it no longer checks out.
    pub async fn request_ready_with_cached_path(
        &self,
        model: &str,
        preference: Option<Backend>,
        cached_path: PathBuf,
    ) -> LifecycleResult<()> {
        self.start_or_join(model, preference, Some(cached_path)).await
    }

    async fn start_or_join(
        &self,
        model: &str,
        preference: Option<Backend>,
        cached_path: Option<PathBuf>,
    ) -> LifecycleResult<()> {
        let outcome = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.as_ref() {
                Some(load) if load.model == model => {
                    debug!(model, "joining in-flight load");
                    load.outcome.clone()
                }
                Some(load) => {
                    return Err(LifecycleError::Busy(format!(
                        "load of {} in progress",
                        load.model
                    )));
                }
                None => {
                    if self.check_ready(model, preference)? {
                        return Ok(());
                    }

                    let token = self.inner.guard.try_acquire(OperationKind::Load)?;
                    let id = self.inner.next_load_id.fetch_add(1, Ordering::SeqCst);
                    let cancel = CancellationToken::new();
                    let task = tokio::spawn(run_load_cycle(
                        self.inner.clone(),
                        LoadRequest {
                            id,
                            model: model.to_string(),
                            preference,
                            cached_path,
                        },
                        cancel.clone(),
                        token,
                    ));
                    let outcome: LoadOutcome = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(LifecycleError::Internal(format!("load task failed: {e}")))
                        })
                    }
                    .boxed()
                    .shared();

                    *in_flight = Some(InFlightLoad {
                        id,
                        model: model.to_string(),
                        cancel,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };
        outcome.await
    }

    /// `Ok(true)` when `model` is already READY on an acceptable backend.
    fn check_ready(&self, model: &str, preference: Option<Backend>) -> LifecycleResult<bool> {
        let core = self.inner.core.read();
        match core.state {
            LifecycleState::Ready => {
                let loaded = core.model.as_deref().unwrap_or_default();
                let backend = core.backend.unwrap_or(Backend::Cpu);
                if loaded == model && preference.is_none_or(|b| b == backend) {
                    Ok(true)
                } else {
                    Err(LifecycleError::AlreadyLoaded {
                        model: loaded.to_string(),
                        backend,
                    })
                }
            }
            LifecycleState::Unloading => Err(LifecycleError::Busy("unload in progress".into())),
            _ => Ok(false),
        }
    }

    /// Release the model.
    ///
    /// A no-op from UNINITIALIZED. While a load cycle is running this
    /// abandons it and returns once the cycle has settled in UNINITIALIZED;
    /// a handle the engine still produces is released, never published.
    pub async fn unload(&self) -> LifecycleResult<()> {
        if let Some(outcome) = self.abandon_in_flight() {
            // Settles in UNINITIALIZED; the cycle's own error is expected
            if let Err(e) = outcome.await {
                debug!(error = %e, "abandoned load cycle finished");
            }
        }
        if self.status() == LifecycleState::Uninitialized {
            debug!("unload requested while uninitialized");
            return Ok(());
        }

        // Preempts queued inference, waits for a running one.
        let _token = self.inner.guard.acquire(OperationKind::Unload).await?;

        let state = self.status();
        if !matches!(state, LifecycleState::Ready | LifecycleState::Error) {
            debug!(%state, "nothing to unload");
            return Ok(());
        }

        self.inner.transition(LifecycleState::Unloading)?;
        let handle = self.inner.handle.lock().await.take();
        if let Some(handle) = handle {
            self.inner.engine.unload(handle).await;
        }
        self.inner.transition_with(LifecycleState::Uninitialized, |core| {
            core.model = None;
            core.backend = None;
            core.last_error = None;
        })?;

        info!("model unloaded");
        Ok(())
    }

    /// Detach the running load cycle and cancel it.
    ///
    /// The slot is emptied under the same lock the cycle publishes READY
    /// under, so later callers start a fresh cycle instead of joining this one.
    fn abandon_in_flight(&self) -> Option<LoadOutcome> {
        let load = {
            let mut in_flight = self.inner.in_flight.lock();
            let load = in_flight.take()?;
            load.cancel.cancel();
            load
        };
        info!(model = %load.model, "abandoning in-flight load");
        Some(load.outcome)
    }

    /// React to an OS memory-pressure notification.
    ///
    /// `Critical` pressure releases a READY model; `Moderate` is only logged.
    pub async fn handle_memory_pressure(&self, pressure: MemoryPressure) -> LifecycleResult<()> {
        match pressure {
            MemoryPressure::Moderate => {
                warn!(state = %self.status(), "moderate memory pressure");
                Ok(())
            }
            MemoryPressure::Critical => {
                warn!(state = %self.status(), "critical memory pressure");
                if self.status() == LifecycleState::Ready {
                    self.unload().await
                } else {
                    Ok(())
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Inference
    // ------------------------------------------------------------------

    /// Run one prompt against the READY model.
    ///
    /// Calls issued while READY are served in arrival order. An unload
    /// accepted while the call is queued turns it into `NotReady`.
    pub async fn run_inference(&self, prompt: &str) -> Result<InferenceOutcome, InferenceError> {
        let state = self.status();
        if state != LifecycleState::Ready {
            return Err(InferenceError::NotReady(state));
        }

        // Only a pending unload preempts queued inference
        let _token = self
            .inner
            .guard
            .acquire(OperationKind::Inference)
            .await
            .map_err(|_| InferenceError::NotReady(LifecycleState::Unloading))?;

        let state = self.status();
        if state != LifecycleState::Ready {
            return Err(InferenceError::NotReady(state));
        }
        let slot = self.inner.handle.lock().await;
        let Some(handle) = slot.as_ref() else {
            return Err(InferenceError::NotReady(state));
        };

        let started = Instant::now();
        let result = self.inner.engine.infer(handle, prompt).await;
        let elapsed = started.elapsed();
        drop(slot);

        match result {
            Ok(output) => {
                let record = InferenceRecord::success(elapsed, output.token_count);
                debug!(
                    duration_ms = record.duration_ms,
                    tokens = output.token_count,
                    tokens_per_second = record.tokens_per_second,
                    "inference complete"
                );
                self.inner.metrics.record(record.clone());
                Ok(InferenceOutcome {
                    text: output.text,
                    record,
                })
            }
            Err(e) => {
                warn!(error = %e, "inference failed");
                self.inner.metrics.record(InferenceRecord::failure(elapsed));
                Err(InferenceError::Failed(e.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn status(&self) -> LifecycleState {
        self.inner.core.read().state
    }

    /// Backend of the live model handle.
    pub fn current_backend(&self) -> Option<Backend> {
        self.inner.core.read().backend
    }

    pub fn current_model(&self) -> Option<String> {
        self.inner.core.read().model.clone()
    }

    /// Error that put the controller into ERROR, if it is still there.
    pub fn last_error(&self) -> Option<LifecycleError> {
        self.inner.core.read().last_error.clone()
    }

    /// Attempts of the most recent load cycle.
    pub fn load_attempts(&self) -> Vec<LoadAttempt> {
        self.inner.core.read().attempts.clone()
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.inner.probe.probe()
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateTransition> {
        self.inner.transitions.subscribe()
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.inner.metrics
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn is_degrading(&self) -> bool {
        self.inner.metrics.is_degrading()
    }

    pub fn export_session(&self) -> SessionReport {
        self.inner.metrics.export_session()
    }

    pub fn clear_metrics(&self) {
        self.inner.metrics.clear()
    }
}

// ============================================================================
// State transitions
// ============================================================================

impl ControllerInner {
    fn transition(&self, to: LifecycleState) -> LifecycleResult<()> {
        self.transition_with(to, |_| {})
    }

    /// Move to `to` along a permitted edge, applying `update` under the same lock.
    fn transition_with(
        &self,
        to: LifecycleState,
        update: impl FnOnce(&mut CoreState),
    ) -> LifecycleResult<()> {
        let from = {
            let mut core = self.core.write();
            let from = core.state;
            if !from.can_transition_to(to) {
                error!(%from, %to, "rejected lifecycle transition");
                return Err(LifecycleError::InvalidTransition { from, to });
            }
            core.state = to;
            update(&mut core);
            from
        };

        debug!(%from, %to, "lifecycle transition");
        // No subscribers is fine
        let _ = self.transitions.send(StateTransition::new(from, to));
        Ok(())
    }
}

// ============================================================================
// Load cycle
// ============================================================================

struct LoadRequest {
    id: u64,
    model: String,
    preference: Option<Backend>,
    cached_path: Option<PathBuf>,
}

async fn run_load_cycle(
    inner: Arc<ControllerInner>,
    request: LoadRequest,
    cancel: CancellationToken,
    token: GuardToken,
) -> LifecycleResult<()> {
    let id = request.id;
    let model = request.model.clone();
    let mut result = drive_load(&inner, request, &cancel).await;

    // unload() landed after the final attempt failed; settle while still
    // holding the guard so no fresh cycle interleaves.
    if cancel.is_cancelled() && inner.core.read().state == LifecycleState::Error {
        result = inner
            .transition_with(LifecycleState::Uninitialized, |core| {
                core.last_error = None;
            })
            .and(Err(LifecycleError::Cancelled(model.clone())));
        info!(model = %model, "abandoned load cycle settled");
    }

    // Guard first, slot second: a caller arriving in between joins this
    // finished outcome instead of seeing Busy.
    drop(token);
    retire(&mut inner.in_flight.lock(), id);
    result
}

fn retire(in_flight: &mut Option<InFlightLoad>, id: u64) {
    if in_flight.as_ref().is_some_and(|load| load.id == id) {
        *in_flight = None;
    }
}

async fn drive_load(
    inner: &ControllerInner,
    request: LoadRequest,
    cancel: &CancellationToken,
) -> LifecycleResult<()> {
    let LoadRequest {
        id,
        model,
        preference,
        mut cached_path,
    } = request;

    let capabilities = {
        let probe = inner.probe.clone();
        tokio::task::spawn_blocking(move || probe.probe())
            .await
            .unwrap_or_else(|_| DeviceCapabilities::conservative("unknown"))
    };
    let mut backend = preference
        .unwrap_or_else(|| capabilities.recommended_backend(inner.config.accelerated_min_memory_mb));

    inner.core.write().attempts.clear();
    let mut attempt: u32 = 1;

    loop {
        if cancel.is_cancelled() {
            return abandon(inner, &model, None).await;
        }
        inner.transition(LifecycleState::ResolvingPath)?;

        let resolution = tokio::select! {
            _ = cancel.cancelled() => return abandon(inner, &model, None).await,
            resolved = resolve(inner, &model, cached_path.take()) => resolved,
        };
        let path = match resolution {
            Ok(path) => path,
            Err(e) => {
                let err = LifecycleError::from(e);
                error!(model = %model, category = %err.category(), error = %err, "model resolution failed");
                inner.transition_with(LifecycleState::Error, |core| {
                    core.last_error = Some(err.clone());
                })?;
                return Err(err);
            }
        };

        inner.transition(LifecycleState::Loading)?;
        inner.core.write().attempts.push(LoadAttempt {
            attempt_number: attempt,
            started_at: Utc::now(),
            backend,
            path: path.clone(),
        });
        info!(model = %model, %backend, attempt, path = %path.display(), "loading model");

        // The engine call itself is not cancellable; its result is checked after.
        let load_started = tokio::time::Instant::now();
        let loaded = inner.engine.load(&path, backend).await;
        let duration_ms = load_started.elapsed().as_secs_f64() * 1000.0;

        if cancel.is_cancelled() {
            let handle = loaded.ok();
            return abandon(inner, &model, handle).await;
        }

        match loaded {
            Ok(handle) => {
                *inner.handle.lock().await = Some(handle);

                // unload() cancels under the in-flight lock, so READY is
                // published under it too.
                let published = {
                    let mut in_flight = inner.in_flight.lock();
                    if cancel.is_cancelled() {
                        false
                    } else {
                        inner.transition_with(LifecycleState::Ready, |core| {
                            core.model = Some(model.clone());
                            core.backend = Some(backend);
                            core.last_error = None;
                        })?;
                        retire(&mut in_flight, id);
                        true
                    }
                };
                if !published {
                    let handle = inner.handle.lock().await.take();
                    return abandon(inner, &model, handle).await;
                }

                inner.metrics.record_load(LoadRecord {
                    timestamp: Utc::now(),
                    model: model.clone(),
                    duration_ms,
                    backend,
                    attempts: attempt,
                });
                info!(model = %model, %backend, attempt, duration_ms, "model ready");
                return Ok(());
            }
            Err(engine_error) => {
                let category = engine_error.category();
                let err = LifecycleError::LoadFailed {
                    attempts: attempt,
                    source: engine_error,
                };
                inner.transition_with(LifecycleState::Error, |core| {
                    core.last_error = Some(err.clone());
                })?;

                if !inner.retry.should_retry(category) {
                    error!(model = %model, %category, error = %err, "model load failed, not retryable");
                    return Err(err);
                }
                let delay = match inner.retry.next_delay(attempt) {
                    RetryDecision::GiveUp => {
                        error!(model = %model, %category, attempts = attempt, "model load failed, giving up");
                        return Err(err);
                    }
                    RetryDecision::RetryAfter(delay) => delay,
                };

                let next_backend = inner.retry.backend_for_retry(backend, category);
                warn!(
                    model = %model,
                    %category,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    from = %backend,
                    to = %next_backend,
                    "model load failed, retrying"
                );
                backend = next_backend;

                tokio::select! {
                    _ = cancel.cancelled() => return abandon(inner, &model, None).await,
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

async fn resolve(
    inner: &ControllerInner,
    model: &str,
    cached_path: Option<PathBuf>,
) -> Result<PathBuf, crate::error::ResolutionError> {
    if let Some(path) = cached_path {
        match inner.resolver.revalidate(&path).await {
            Ok(path) => return Ok(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cached model path rejected, resolving again")
            }
        }
    }
    inner.resolver.resolve(model).await
}

/// Settle an abandoned cycle in UNINITIALIZED, releasing a stray handle.
async fn abandon(
    inner: &ControllerInner,
    model: &str,
    handle: Option<ModelHandle>,
) -> LifecycleResult<()> {
    if let Some(handle) = handle {
        inner.transition(LifecycleState::Unloading)?;
        inner.engine.unload(handle).await;
    }
    if inner.core.read().state != LifecycleState::Uninitialized {
        inner.transition_with(LifecycleState::Uninitialized, |core| {
            core.model = None;
            core.backend = None;
            core.last_error = None;
        })?;
    }
    info!(model = %model, "abandoned load cycle settled");
    Err(LifecycleError::Cancelled(model.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, EngineOutput};
    use crate::resolver::PlatformPolicy;
    use crate::storage::LocalStorage;
    use async_trait::async_trait;
    use std::path::Path;

    struct NoopEngine;

    #[async_trait]
    impl InferenceEngine for NoopEngine {
        fn name(&self) -> &str {
            "noop"
        }
        async fn load(&self, _path: &Path, _backend: Backend) -> Result<ModelHandle, EngineError> {
            Ok(ModelHandle::new(1))
        }
        async fn unload(&self, _handle: ModelHandle) {}
        async fn infer(&self, _handle: &ModelHandle, prompt: &str) -> Result<EngineOutput, EngineError> {
            Ok(EngineOutput {
                text: prompt.to_string(),
                token_count: 1,
            })
        }
    }

    fn controller() -> ModelLifecycleController {
        let config = LifecycleConfig::default();
        let resolver = ModelPathResolver::new(
            Arc::new(LocalStorage::permissive()),
            PlatformPolicy::Bundled {
                bundle_dir: PathBuf::from("/nonexistent"),
            },
            &config,
        );
        ModelLifecycleController::new(
            config,
            Arc::new(NoopEngine),
            DeviceCapabilityProbe::with_capabilities(DeviceCapabilities::conservative("test")),
            resolver,
        )
    }

    #[test]
    fn test_forbidden_transition_leaves_state_untouched() {
        let controller = controller();
        let mut rx = controller.subscribe();

        let err = controller
            .inner
            .transition(LifecycleState::Ready)
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: LifecycleState::Uninitialized,
                to: LifecycleState::Ready,
            }
        ));
        assert_eq!(controller.status(), LifecycleState::Uninitialized);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_transition_applies_update_and_notifies() {
        let controller = controller();
        let mut rx = controller.subscribe();

        controller
            .inner
            .transition_with(LifecycleState::ResolvingPath, |core| {
                core.model = Some("gemma".into());
            })
            .unwrap();

        assert_eq!(controller.current_model().as_deref(), Some("gemma"));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.from, LifecycleState::Uninitialized);
        assert_eq!(event.to, LifecycleState::ResolvingPath);
    }

    #[tokio::test]
    async fn test_missing_artifact_settles_in_error() {
        let controller = controller();
        let err = controller.request_ready("gemma", None).await.unwrap_err();

        assert_eq!(err.category(), crate::error::ErrorCategory::ArtifactNotFound);
        assert_eq!(controller.status(), LifecycleState::Error);
        assert!(controller.load_attempts().is_empty());
        assert!(controller.inner.in_flight.lock().is_none());
        assert!(controller.inner.guard.active().is_none());
    }

    #[test]
    fn test_memory_pressure_serde() {
        let json = serde_json::to_string(&MemoryPressure::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
