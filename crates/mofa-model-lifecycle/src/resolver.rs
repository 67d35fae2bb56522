//! Turns a logical model name into an access-checked artifact path
//!
//! The platform policy is picked by the host at construction time:
//!
//! - [`PlatformPolicy::Bundled`]: the artifact ships inside the app package.
//! - [`PlatformPolicy::ExternalWithPermission`]: the artifact lives in
//!   user-writable storage behind a runtime permission. Resolution may
//!   suspend on the permission prompt for at most the configured timeout.
//!
//! Both policies reject artifacts smaller than the configured minimum so
//! placeholder or truncated downloads fail here rather than in the engine.

use crate::config::LifecycleConfig;
use crate::error::ResolutionError;
use crate::storage::{AccessDecision, ResourceClass, StorageAccess};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where model artifacts live on this platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformPolicy {
    /// Packaged with the application
    Bundled { bundle_dir: PathBuf },
    /// External storage guarded by a runtime permission
    ExternalWithPermission {
        external_dir: PathBuf,
        resource: ResourceClass,
    },
}

impl PlatformPolicy {
    pub fn root(&self) -> &Path {
        match self {
            PlatformPolicy::Bundled { bundle_dir } => bundle_dir,
            PlatformPolicy::ExternalWithPermission { external_dir, .. } => external_dir,
        }
    }
}

pub struct ModelPathResolver {
    storage: Arc<dyn StorageAccess>,
    policy: PlatformPolicy,
    artifact_extension: String,
    min_artifact_bytes: u64,
    permission_timeout: Duration,
}

impl std::fmt::Debug for ModelPathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPathResolver")
            .field("policy", &self.policy)
            .field("artifact_extension", &self.artifact_extension)
            .field("min_artifact_bytes", &self.min_artifact_bytes)
            .field("permission_timeout", &self.permission_timeout)
            .finish()
    }
}

impl ModelPathResolver {
    pub fn new(
        storage: Arc<dyn StorageAccess>,
        policy: PlatformPolicy,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            storage,
            policy,
            artifact_extension: config.artifact_extension.clone(),
            min_artifact_bytes: config.min_artifact_bytes,
            permission_timeout: config.permission_timeout(),
        }
    }

    pub fn policy(&self) -> &PlatformPolicy {
        &self.policy
    }

    /// Resolve under the policy chosen at construction.
    pub async fn resolve(&self, model_name: &str) -> Result<PathBuf, ResolutionError> {
        self.resolve_with_policy(model_name, &self.policy).await
    }

    pub async fn resolve_with_policy(
        &self,
        model_name: &str,
        policy: &PlatformPolicy,
    ) -> Result<PathBuf, ResolutionError> {
        let path = artifact_path(policy.root(), model_name, &self.artifact_extension)?;
        debug!(model = %model_name, path = %path.display(), "resolving model artifact");

        if let PlatformPolicy::ExternalWithPermission { resource, .. } = policy {
            self.ensure_access(*resource).await?;
        }
        self.check_artifact(&path).await?;

        info!(model = %model_name, path = %path.display(), "model artifact resolved");
        Ok(path)
    }

    /// Re-check a path cached by the host before trusting it.
    pub async fn revalidate(&self, path: &Path) -> Result<PathBuf, ResolutionError> {
        if let PlatformPolicy::ExternalWithPermission { resource, .. } = &self.policy {
            self.ensure_access(*resource).await?;
        }
        self.check_artifact(path).await?;
        Ok(path.to_path_buf())
    }

    async fn ensure_access(&self, resource: ResourceClass) -> Result<(), ResolutionError> {
        if self.storage.has_access(resource).await {
            return Ok(());
        }

        info!(%resource, "requesting storage permission");
        match tokio::time::timeout(self.permission_timeout, self.storage.request_access(resource))
            .await
        {
            Ok(AccessDecision::Granted) => Ok(()),
            Ok(AccessDecision::Denied) => {
                warn!(%resource, "storage permission denied");
                Err(ResolutionError::PermissionDenied(resource.to_string()))
            }
            Err(_) => {
                warn!(%resource, timeout_ms = self.permission_timeout.as_millis() as u64, "permission request timed out");
                Err(ResolutionError::PermissionTimeout {
                    resource: resource.to_string(),
                    timeout_ms: self.permission_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn check_artifact(&self, path: &Path) -> Result<(), ResolutionError> {
        let shown = path.display().to_string();
        if !self.storage.exists(path).await {
            return Err(ResolutionError::ArtifactNotFound(shown));
        }

        let size = self
            .storage
            .size_of(path)
            .await
            .map_err(|_| ResolutionError::ArtifactNotFound(shown.clone()))?;
        if size < self.min_artifact_bytes {
            warn!(path = %shown, size, min = self.min_artifact_bytes, "artifact too small");
            return Err(ResolutionError::ArtifactCorrupt {
                path: shown,
                size,
                min_size: self.min_artifact_bytes,
            });
        }
        Ok(())
    }
}

/// `<root>/<model_name>[.<extension>]`, refusing names that escape `root`.
fn artifact_path(root: &Path, model_name: &str, extension: &str) -> Result<PathBuf, ResolutionError> {
    let name = Path::new(model_name);
    let mut components = name.components();
    let valid = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if model_name.trim().is_empty() || !valid {
        return Err(ResolutionError::InvalidModelName(model_name.to_string()));
    }

    let mut path = root.join(name);
    if name.extension().is_none() && !extension.is_empty() {
        path.set_extension(extension);
    }
    Ok(path)
}
