//! Common test utilities shared across `mofa-model-lifecycle` integration tests.
//!
//! This module is **not** a standalone test binary. It is declared with
//! `mod common;` inside each integration test file that needs it.

#![allow(dead_code)]

pub mod mock_engine;

use std::path::PathBuf;
use std::sync::Arc;

use mofa_model_lifecycle::{
    DeviceCapabilities, DeviceCapabilityProbe, LifecycleConfig, LifecycleState,
    ModelLifecycleController, ModelPathResolver, PlatformPolicy, ResourceClass, StateTransition,
};
use tokio::sync::broadcast;

use mock_engine::{MockEngine, MockStorage};

pub const BUNDLE_DIR: &str = "/app/models";
pub const EXTERNAL_DIR: &str = "/sdcard/models";
pub const MIB: u64 = 1024 * 1024;

/// Capabilities of a device that should get the accelerated backend.
pub fn capable_device() -> DeviceCapabilities {
    DeviceCapabilities {
        accelerated_backend_available: true,
        total_memory_mb: 8 * 1024,
        platform_id: "test-phone".to_string(),
    }
}

pub fn device(accelerated: bool, total_memory_mb: u64) -> DeviceCapabilities {
    DeviceCapabilities {
        accelerated_backend_available: accelerated,
        total_memory_mb,
        platform_id: "test-phone".to_string(),
    }
}

pub fn bundled_artifact(model: &str) -> PathBuf {
    PathBuf::from(BUNDLE_DIR).join(format!("{model}.bin"))
}

/// Controller wired to a mock engine and in-memory storage.
pub struct Harness {
    pub controller: ModelLifecycleController,
    pub engine: Arc<MockEngine>,
    pub storage: Arc<MockStorage>,
}

pub struct HarnessBuilder {
    engine: MockEngine,
    storage: MockStorage,
    capabilities: DeviceCapabilities,
    config: LifecycleConfig,
    external: bool,
}

impl Harness {
    /// Bundled policy, capable device, `gemma` artifact present.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            engine: MockEngine::builder().build(),
            storage: MockStorage::new().with_file(bundled_artifact("gemma"), 2 * MIB),
            capabilities: capable_device(),
            config: LifecycleConfig::default(),
            external: false,
        }
    }
}

impl HarnessBuilder {
    pub fn engine(mut self, engine: MockEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn storage(mut self, storage: MockStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve from external storage behind a permission.
    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn build(self) -> Harness {
        let engine = Arc::new(self.engine);
        let storage = Arc::new(self.storage);
        let policy = if self.external {
            PlatformPolicy::ExternalWithPermission {
                external_dir: PathBuf::from(EXTERNAL_DIR),
                resource: ResourceClass::ExternalStorage,
            }
        } else {
            PlatformPolicy::Bundled {
                bundle_dir: PathBuf::from(BUNDLE_DIR),
            }
        };
        let resolver = ModelPathResolver::new(storage.clone(), policy, &self.config);
        let controller = ModelLifecycleController::new(
            self.config,
            engine.clone(),
            DeviceCapabilityProbe::with_capabilities(self.capabilities),
            resolver,
        );
        Harness {
            controller,
            engine,
            storage,
        }
    }
}

/// Route controller logs to the test output; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wait until the controller enters `state`.
pub async fn wait_for(rx: &mut broadcast::Receiver<StateTransition>, state: LifecycleState) {
    loop {
        match rx.recv().await {
            Ok(transition) if transition.to == state => return,
            Ok(_) => continue,
            Err(e) => panic!("transition stream ended before {state}: {e}"),
        }
    }
}

/// Everything already published on `rx`, as `(from, to)` pairs.
pub fn drain(rx: &mut broadcast::Receiver<StateTransition>) -> Vec<(LifecycleState, LifecycleState)> {
    let mut seen = Vec::new();
    while let Ok(transition) = rx.try_recv() {
        seen.push((transition.from, transition.to));
    }
    seen
}
