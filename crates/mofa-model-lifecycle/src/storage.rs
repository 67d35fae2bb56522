//! Boundary to platform storage and permissions

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Class of storage a permission covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    /// User-writable external storage (Android shared storage, SD card)
    ExternalStorage,
    /// Documents shared with the app by the user (iOS file provider)
    SharedDocuments,
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceClass::ExternalStorage => write!(f, "external_storage"),
            ResourceClass::SharedDocuments => write!(f, "shared_documents"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    Denied,
}

/// Permissioned file access supplied by the host.
#[async_trait]
pub trait StorageAccess: Send + Sync {
    async fn has_access(&self, class: ResourceClass) -> bool;

    /// Ask for access. May suspend until the user answers a prompt.
    async fn request_access(&self, class: ResourceClass) -> AccessDecision;

    async fn exists(&self, path: &Path) -> bool;

    async fn size_of(&self, path: &Path) -> std::io::Result<u64>;
}

/// Local filesystem storage with an in-process permission table.
///
/// Desktop hosts have no permission prompts, so [`LocalStorage::permissive`]
/// grants everything.
#[derive(Debug, Default)]
pub struct LocalStorage {
    granted: RwLock<HashSet<ResourceClass>>,
    deny_requests: bool,
}

impl LocalStorage {
    /// Nothing granted yet; requests are granted when made.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissive() -> Self {
        Self::new()
            .with_granted(ResourceClass::ExternalStorage)
            .with_granted(ResourceClass::SharedDocuments)
    }

    pub fn with_granted(self, class: ResourceClass) -> Self {
        self.granted.write().insert(class);
        self
    }

    /// Every future `request_access` is answered with `Denied`.
    pub fn deny_requests(mut self) -> Self {
        self.deny_requests = true;
        self
    }

    pub fn revoke(&self, class: ResourceClass) {
        self.granted.write().remove(&class);
    }
}

#[async_trait]
impl StorageAccess for LocalStorage {
    async fn has_access(&self, class: ResourceClass) -> bool {
        self.granted.read().contains(&class)
    }

    async fn request_access(&self, class: ResourceClass) -> AccessDecision {
        if self.deny_requests {
            return AccessDecision::Denied;
        }
        self.granted.write().insert(class);
        AccessDecision::Granted
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn size_of(&self, path: &Path) -> std::io::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }
}
