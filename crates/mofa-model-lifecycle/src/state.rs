//! Lifecycle state machine types
//!
//! ```text
//! UNINITIALIZED ──► RESOLVING_PATH ──► LOADING ──► READY ──► UNLOADING ──► UNINITIALIZED
//!                        ▲    │           │                      ▲
//!                        │    ▼           ▼                      │
//!                        └── ERROR ◄──────┘──────────────────────┘
//! ```
//!
//! An abandoned load cycle (unload while loading) settles back to
//! UNINITIALIZED from RESOLVING_PATH, LOADING or ERROR, passing through
//! UNLOADING when the engine produced a handle that must be released.

use crate::hardware::Backend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    ResolvingPath,
    Loading,
    Ready,
    Error,
    Unloading,
}

impl LifecycleState {
    /// Whether `self -> next` is a permitted edge.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Uninitialized, ResolvingPath)
                | (ResolvingPath, Loading)
                | (ResolvingPath, Error)
                | (Loading, Ready)
                | (Loading, Error)
                | (Ready, Unloading)
                | (Unloading, Uninitialized)
                | (Error, ResolvingPath)
                | (Error, Unloading)
                // abandoned load cycles
                | (ResolvingPath, Uninitialized)
                | (Loading, Uninitialized)
                | (Loading, Unloading)
                | (Error, Uninitialized)
        )
    }

    /// True while a load cycle owns the controller.
    pub fn is_loading(self) -> bool {
        matches!(self, LifecycleState::ResolvingPath | LifecycleState::Loading)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "uninitialized"),
            LifecycleState::ResolvingPath => write!(f, "resolving_path"),
            LifecycleState::Loading => write!(f, "loading"),
            LifecycleState::Ready => write!(f, "ready"),
            LifecycleState::Error => write!(f, "error"),
            LifecycleState::Unloading => write!(f, "unloading"),
        }
    }
}

/// State transition event delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub at: DateTime<Utc>,
}

impl StateTransition {
    pub fn new(from: LifecycleState, to: LifecycleState) -> Self {
        Self {
            from,
            to,
            at: Utc::now(),
        }
    }
}

/// Diagnostic record of one physical load attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAttempt {
    /// 1-based attempt number within the load cycle
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub backend: Backend,
    pub path: PathBuf,
}
