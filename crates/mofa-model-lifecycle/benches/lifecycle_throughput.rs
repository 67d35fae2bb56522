//! Lifecycle overhead benchmarks
//!
//! Measures load/unload cycles and guarded inference throughput against an
//! in-memory engine, so the numbers reflect controller overhead only.
//! Run with: `cargo bench -p mofa-model-lifecycle`

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use mofa_model_lifecycle::{
    Backend, DeviceCapabilities, DeviceCapabilityProbe, EngineError, EngineOutput,
    InferenceEngine, LifecycleConfig, LocalStorage, ModelHandle, ModelLifecycleController,
    ModelPathResolver, PlatformPolicy,
};

const LOAD_CYCLES: usize = 200;
const INFERENCES: usize = 5_000;
const CONCURRENT_CALLERS: usize = 8;

struct InMemoryEngine {
    next_id: AtomicU64,
}

#[async_trait]
impl InferenceEngine for InMemoryEngine {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn load(&self, _path: &Path, _backend: Backend) -> Result<ModelHandle, EngineError> {
        Ok(ModelHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn unload(&self, _handle: ModelHandle) {}

    async fn infer(&self, _handle: &ModelHandle, prompt: &str) -> Result<EngineOutput, EngineError> {
        Ok(EngineOutput {
            text: prompt.to_uppercase(),
            token_count: prompt.split_whitespace().count() as u32,
        })
    }
}

fn controller(bundle_dir: &Path, backend_gpu: bool) -> ModelLifecycleController {
    let config = LifecycleConfig::default();
    let resolver = ModelPathResolver::new(
        Arc::new(LocalStorage::permissive()),
        PlatformPolicy::Bundled {
            bundle_dir: bundle_dir.to_path_buf(),
        },
        &config,
    );
    let probe = DeviceCapabilityProbe::with_capabilities(DeviceCapabilities {
        accelerated_backend_available: backend_gpu,
        total_memory_mb: 8 * 1024,
        platform_id: "bench".to_string(),
    });
    ModelLifecycleController::new(
        config,
        Arc::new(InMemoryEngine {
            next_id: AtomicU64::new(1),
        }),
        probe,
        resolver,
    )
}

async fn bench_load_cycles(controller: &ModelLifecycleController) -> anyhow::Result<()> {
    let start = Instant::now();
    for _ in 0..LOAD_CYCLES {
        controller.request_ready("bench", None).await?;
        controller.unload().await?;
    }
    let elapsed = start.elapsed();
    println!(
        "load/unload | cycles={LOAD_CYCLES} elapsed={:.2}ms per_cycle={:.1}us",
        elapsed.as_secs_f64() * 1000.0,
        elapsed.as_secs_f64() * 1e6 / LOAD_CYCLES as f64,
    );
    Ok(())
}

async fn bench_inference(controller: &ModelLifecycleController) -> anyhow::Result<()> {
    controller.request_ready("bench", None).await?;
    controller.clear_metrics();

    let start = Instant::now();
    let per_caller = INFERENCES / CONCURRENT_CALLERS;
    let mut callers = Vec::with_capacity(CONCURRENT_CALLERS);
    for caller in 0..CONCURRENT_CALLERS {
        let controller = controller.clone();
        callers.push(tokio::spawn(async move {
            let mut tokens = 0u64;
            for i in 0..per_caller {
                let outcome = controller
                    .run_inference(&format!("caller {caller} prompt {i}"))
                    .await?;
                tokens += outcome.record.token_count as u64;
            }
            anyhow::Ok(tokens)
        }));
    }

    let mut total_tokens = 0u64;
    for caller in callers {
        total_tokens += caller.await.context("inference caller panicked")??;
    }
    let elapsed = start.elapsed();

    let snapshot = controller.snapshot();
    println!(
        "inference   | calls={} tokens={total_tokens} elapsed={:.2}ms throughput={:.0} calls/s",
        per_caller * CONCURRENT_CALLERS,
        elapsed.as_secs_f64() * 1000.0,
        (per_caller * CONCURRENT_CALLERS) as f64 / elapsed.as_secs_f64().max(0.001),
    );
    println!(
        "snapshot    | window={} mean={:.3}ms p50={:.3}ms p99={:.3}ms degrading={}",
        snapshot.count, snapshot.mean_duration_ms, snapshot.p50_ms, snapshot.p99_ms, snapshot.degrading,
    );

    controller.unload().await?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("bench.bin"), vec![0u8; 1024 * 1024])?;

    let rt = tokio::runtime::Runtime::new()?;
    println!("=== mofa-model-lifecycle throughput benchmark ===");
    for gpu in [false, true] {
        let controller = controller(dir.path(), gpu);
        println!("-- recommended backend: {}", controller.capabilities().recommended_backend(8 * 1024));
        rt.block_on(async {
            bench_load_cycles(&controller).await?;
            bench_inference(&controller).await
        })?;
    }
    Ok(())
}
