//! Process-wide serialization of lifecycle operations
//!
//! At most one of load, unload or inference holds the guard at a time.
//! Waiters are served in arrival order (the underlying `tokio` mutex is
//! fair). Accepting an unload bumps an epoch; inference callers that queued
//! before the bump give up when they reach the front instead of running
//! against a handle that is being torn down.
//!
//! Release happens when the [`GuardToken`] is dropped, so every exit path
//! (including `?` and panics) frees the guard.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Kind of operation holding or requesting the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Load,
    Unload,
    Inference,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Load => write!(f, "load"),
            OperationKind::Unload => write!(f, "unload"),
            OperationKind::Inference => write!(f, "inference"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Another operation holds the guard
    #[error("{}", busy_message(.active))]
    Busy { active: Option<OperationKind> },

    /// An unload was accepted while this caller was queued
    #[error("preempted by unload while queued")]
    Preempted,
}

fn busy_message(active: &Option<OperationKind>) -> String {
    match active {
        Some(kind) => format!("{kind} in progress"),
        None => "another operation in progress".to_string(),
    }
}

pub type GuardResult<T> = Result<T, GuardError>;

#[derive(Debug)]
struct GuardState {
    slot: Arc<AsyncMutex<()>>,
    active: Mutex<Option<OperationKind>>,
    unload_epoch: AtomicU64,
    waiting: AtomicUsize,
}

/// Cheaply cloneable; all clones share the same slot.
#[derive(Debug, Clone)]
pub struct ConcurrencyGuard {
    state: Arc<GuardState>,
}

impl Default for ConcurrencyGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrencyGuard {
    pub fn new() -> Self {
        Self {
            state: Arc::new(GuardState {
                slot: Arc::new(AsyncMutex::new(())),
                active: Mutex::new(None),
                unload_epoch: AtomicU64::new(0),
                waiting: AtomicUsize::new(0),
            }),
        }
    }

    /// Take the guard without waiting.
    pub fn try_acquire(&self, kind: OperationKind) -> GuardResult<GuardToken> {
        match self.state.slot.clone().try_lock_owned() {
            Ok(permit) => Ok(self.issue(kind, permit)),
            Err(_) => Err(GuardError::Busy {
                active: self.active(),
            }),
        }
    }

    /// Wait for the guard in FIFO order.
    ///
    /// `Unload` preempts every inference queued before it; those callers
    /// receive [`GuardError::Preempted`].
    pub async fn acquire(&self, kind: OperationKind) -> GuardResult<GuardToken> {
        let epoch = if kind == OperationKind::Unload {
            self.state.unload_epoch.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.state.unload_epoch.load(Ordering::SeqCst)
        };

        let permit = {
            let _waiting = WaitingCount::enter(&self.state.waiting);
            self.state.slot.clone().lock_owned().await
        };

        if kind == OperationKind::Inference
            && self.state.unload_epoch.load(Ordering::SeqCst) != epoch
        {
            tracing::debug!("queued inference preempted by unload");
            return Err(GuardError::Preempted);
        }

        Ok(self.issue(kind, permit))
    }

    /// Operation currently holding the guard.
    pub fn active(&self) -> Option<OperationKind> {
        *self.state.active.lock()
    }

    /// Number of callers queued in [`acquire`](Self::acquire).
    pub fn waiting(&self) -> usize {
        self.state.waiting.load(Ordering::SeqCst)
    }

    fn issue(&self, kind: OperationKind, permit: OwnedMutexGuard<()>) -> GuardToken {
        *self.state.active.lock() = Some(kind);
        GuardToken {
            kind,
            state: self.state.clone(),
            _permit: permit,
        }
    }
}

/// Keeps `waiting` accurate even when the acquiring future is dropped.
struct WaitingCount<'a>(&'a AtomicUsize);

impl<'a> WaitingCount<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitingCount<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Proof of holding the guard; dropping it releases the guard.
#[derive(Debug)]
pub struct GuardToken {
    kind: OperationKind,
    state: Arc<GuardState>,
    _permit: OwnedMutexGuard<()>,
}

impl GuardToken {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        *self.state.active.lock() = None;
    }
}
