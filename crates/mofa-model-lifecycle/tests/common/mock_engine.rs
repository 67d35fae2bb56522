//! Scripted engine and storage doubles for lifecycle integration tests.
//!
//! [`MockEngine`] implements [`InferenceEngine`]. Load and inference outcomes
//! are queued at build time and consumed in FIFO order; when a queue is empty
//! the call succeeds. Every call is recorded so tests can assert on what the
//! controller actually asked the engine to do.
//!
//! [`MockStorage`] implements [`StorageAccess`] over an in-memory file table,
//! so no test touches the real filesystem.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = MockEngine::builder()
//!     .fail_load(EngineError::OutOfMemory("gpu".into()))
//!     .load_delay(Duration::from_millis(500))
//!     .build();
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mofa_model_lifecycle::{
    AccessDecision, Backend, EngineError, EngineOutput, InferenceEngine, ModelHandle,
    ResourceClass, StorageAccess,
};

// ─────────────────────────────────────────────────────────────────────────────
// MockEngine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct EngineState {
    load_outcomes: VecDeque<Result<(), EngineError>>,
    infer_outcomes: VecDeque<Result<String, EngineError>>,
    load_calls: Vec<(PathBuf, Backend)>,
    unload_calls: usize,
    prompts: Vec<String>,
    live: HashSet<u64>,
    max_live: usize,
    next_id: u64,
}

pub struct MockEngine {
    state: Mutex<EngineState>,
    load_delay: Duration,
    infer_delay: Duration,
}

#[derive(Default)]
pub struct MockEngineBuilder {
    load_outcomes: VecDeque<Result<(), EngineError>>,
    infer_outcomes: VecDeque<Result<String, EngineError>>,
    load_delay: Duration,
    infer_delay: Duration,
}

impl MockEngineBuilder {
    /// Queue a failing load.
    pub fn fail_load(mut self, error: EngineError) -> Self {
        self.load_outcomes.push_back(Err(error));
        self
    }

    /// Queue a successful load (useful after failures).
    pub fn succeed_load(mut self) -> Self {
        self.load_outcomes.push_back(Ok(()));
        self
    }

    pub fn respond_with(mut self, text: impl Into<String>) -> Self {
        self.infer_outcomes.push_back(Ok(text.into()));
        self
    }

    pub fn fail_inference(mut self, error: EngineError) -> Self {
        self.infer_outcomes.push_back(Err(error));
        self
    }

    pub fn load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn infer_delay(mut self, delay: Duration) -> Self {
        self.infer_delay = delay;
        self
    }

    pub fn build(self) -> MockEngine {
        MockEngine {
            state: Mutex::new(EngineState {
                load_outcomes: self.load_outcomes,
                infer_outcomes: self.infer_outcomes,
                next_id: 1,
                ..EngineState::default()
            }),
            load_delay: self.load_delay,
            infer_delay: self.infer_delay,
        }
    }
}

impl MockEngine {
    pub fn builder() -> MockEngineBuilder {
        MockEngineBuilder::default()
    }

    pub fn load_calls(&self) -> Vec<(PathBuf, Backend)> {
        self.state.lock().unwrap().load_calls.clone()
    }

    pub fn load_call_count(&self) -> usize {
        self.state.lock().unwrap().load_calls.len()
    }

    pub fn load_backends(&self) -> Vec<Backend> {
        self.load_calls().into_iter().map(|(_, b)| b).collect()
    }

    pub fn unload_call_count(&self) -> usize {
        self.state.lock().unwrap().unload_calls
    }

    /// Prompts in the order the engine received them.
    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().unwrap().prompts.clone()
    }

    /// Handles loaded and not yet released.
    pub fn live_handles(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    /// Highest number of handles ever live at once.
    pub fn max_live_handles(&self) -> usize {
        self.state.lock().unwrap().max_live
    }
}

#[async_trait]
impl InferenceEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&self, path: &Path, backend: Backend) -> Result<ModelHandle, EngineError> {
        self.state
            .lock()
            .unwrap()
            .load_calls
            .push((path.to_path_buf(), backend));

        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.load_outcomes.pop_front().unwrap_or(Ok(()))?;
        let id = state.next_id;
        state.next_id += 1;
        state.live.insert(id);
        state.max_live = state.max_live.max(state.live.len());
        Ok(ModelHandle::new(id))
    }

    async fn unload(&self, handle: ModelHandle) {
        let mut state = self.state.lock().unwrap();
        state.unload_calls += 1;
        state.live.remove(&handle.id());
    }

    async fn infer(&self, handle: &ModelHandle, prompt: &str) -> Result<EngineOutput, EngineError> {
        {
            let mut state = self.state.lock().unwrap();
            assert!(state.live.contains(&handle.id()), "inference on a released handle");
            state.prompts.push(prompt.to_string());
        }

        if !self.infer_delay.is_zero() {
            tokio::time::sleep(self.infer_delay).await;
        }

        let outcome = self.state.lock().unwrap().infer_outcomes.pop_front();
        let text = outcome.unwrap_or_else(|| Ok(format!("echo: {prompt}")))?;
        Ok(EngineOutput {
            token_count: text.split_whitespace().count() as u32,
            text,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MockStorage
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStorage {
    files: Mutex<HashMap<PathBuf, u64>>,
    granted: Mutex<HashSet<ResourceClass>>,
    deny: bool,
    requests: Mutex<usize>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, size: u64) -> Self {
        self.files.lock().unwrap().insert(path.into(), size);
        self
    }

    pub fn with_granted(self, class: ResourceClass) -> Self {
        self.granted.lock().unwrap().insert(class);
        self
    }

    /// Permission prompts are answered with `Denied`.
    pub fn denying(mut self) -> Self {
        self.deny = true;
        self
    }

    pub fn remove_file(&self, path: &Path) {
        self.files.lock().unwrap().remove(path);
    }

    pub fn permission_requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl StorageAccess for MockStorage {
    async fn has_access(&self, class: ResourceClass) -> bool {
        self.granted.lock().unwrap().contains(&class)
    }

    async fn request_access(&self, class: ResourceClass) -> AccessDecision {
        *self.requests.lock().unwrap() += 1;
        if self.deny {
            return AccessDecision::Denied;
        }
        self.granted.lock().unwrap().insert(class);
        AccessDecision::Granted
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    async fn size_of(&self, path: &Path) -> std::io::Result<u64> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
    }
}
