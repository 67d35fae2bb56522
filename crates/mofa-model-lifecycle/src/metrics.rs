//! Inference telemetry
//!
//! Records land in a fixed-capacity ring buffer; when it is full the oldest
//! record is evicted (FIFO, not LRU: recency of measurement is what
//! matters). Every statistic is recomputed from the buffer on demand, so a
//! [`PerformanceSnapshot`] is always a pure function of the retained records.
//!
//! Appends take a short internal lock and are safe from any task without
//! holding the lifecycle guard.

use crate::hardware::Backend;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_DEGRADATION_WINDOW: usize = 5;
pub const DEFAULT_DEGRADATION_THRESHOLD: f64 = 0.2;

/// Timing and token data of one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
    pub token_count: u32,
    pub tokens_per_second: f64,
    pub succeeded: bool,
}

impl InferenceRecord {
    pub fn success(duration: Duration, token_count: u32) -> Self {
        let secs = duration.as_secs_f64();
        Self {
            timestamp: Utc::now(),
            duration_ms: secs * 1000.0,
            token_count,
            tokens_per_second: if secs > 0.0 {
                token_count as f64 / secs
            } else {
                0.0
            },
            succeeded: true,
        }
    }

    pub fn failure(duration: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            token_count: 0,
            tokens_per_second: 0.0,
            succeeded: false,
        }
    }

    /// Record with an explicit duration in milliseconds
    pub fn with_duration_ms(duration_ms: f64, token_count: u32) -> Self {
        let duration_ms = duration_ms.max(0.0);
        Self {
            timestamp: Utc::now(),
            duration_ms,
            token_count,
            tokens_per_second: if duration_ms > 0.0 {
                token_count as f64 * 1000.0 / duration_ms
            } else {
                0.0
            },
            succeeded: true,
        }
    }
}

/// Timing of one successful model load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRecord {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    /// Engine load call of the successful attempt; excludes resolution and backoff
    pub duration_ms: f64,
    pub backend: Backend,
    /// Attempts the load cycle needed, including the successful one
    pub attempts: u32,
}

/// Statistics derived from the retained records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub count: usize,
    pub failure_count: usize,
    pub mean_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub mean_tokens_per_second: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub degrading: bool,
}

/// Exported diagnostics for one metrics session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub session_duration_ms: i64,
    pub snapshot: PerformanceSnapshot,
    pub records: Vec<InferenceRecord>,
    pub loads: Vec<LoadRecord>,
}

impl SessionReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug)]
struct MetricsState {
    records: VecDeque<InferenceRecord>,
    loads: VecDeque<LoadRecord>,
    session_start: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MetricsAggregator {
    capacity: usize,
    window: usize,
    threshold: f64,
    state: Mutex<MetricsState>,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MetricsAggregator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window: DEFAULT_DEGRADATION_WINDOW,
            threshold: DEFAULT_DEGRADATION_THRESHOLD,
            state: Mutex::new(MetricsState {
                records: VecDeque::with_capacity(capacity),
                loads: VecDeque::new(),
                session_start: Utc::now(),
            }),
        }
    }

    /// Degradation detection over windows of `window` records, signalled
    /// when the recent window is slower by more than `threshold` (0.2 = 20%).
    pub fn with_degradation(mut self, window: usize, threshold: f64) -> Self {
        self.window = window.max(1);
        self.threshold = threshold.max(0.0);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record(&self, record: InferenceRecord) {
        let mut state = self.state.lock();
        if state.records.len() == self.capacity {
            state.records.pop_front();
        }
        state.records.push_back(record);
    }

    pub fn record_load(&self, load: LoadRecord) {
        tracing::debug!(
            model = %load.model,
            backend = %load.backend,
            duration_ms = load.duration_ms,
            attempts = load.attempts,
            "model load recorded"
        );
        let mut state = self.state.lock();
        if state.loads.len() == self.capacity {
            state.loads.pop_front();
        }
        state.loads.push_back(load);
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let state = self.state.lock();
        self.compute(&state.records)
    }

    pub fn is_degrading(&self) -> bool {
        let state = self.state.lock();
        degrading(&state.records, self.window, self.threshold)
    }

    pub fn export_session(&self) -> SessionReport {
        let state = self.state.lock();
        let session_end = Utc::now();
        SessionReport {
            session_start: state.session_start,
            session_end,
            session_duration_ms: (session_end - state.session_start).num_milliseconds(),
            snapshot: self.compute(&state.records),
            records: state.records.iter().cloned().collect(),
            loads: state.loads.iter().cloned().collect(),
        }
    }

    /// Drop all records and restart the session clock.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.records.clear();
        state.loads.clear();
        state.session_start = Utc::now();
    }

    fn compute(&self, records: &VecDeque<InferenceRecord>) -> PerformanceSnapshot {
        if records.is_empty() {
            return PerformanceSnapshot::default();
        }

        let count = records.len();
        let mut durations: Vec<f64> = records.iter().map(|r| r.duration_ms).collect();
        durations.sort_by(|a, b| a.total_cmp(b));

        PerformanceSnapshot {
            count,
            failure_count: records.iter().filter(|r| !r.succeeded).count(),
            mean_duration_ms: durations.iter().sum::<f64>() / count as f64,
            min_duration_ms: durations[0],
            max_duration_ms: durations[count - 1],
            mean_tokens_per_second: records.iter().map(|r| r.tokens_per_second).sum::<f64>()
                / count as f64,
            p50_ms: percentile(&durations, 50.0),
            p90_ms: percentile(&durations, 90.0),
            p95_ms: percentile(&durations, 95.0),
            p99_ms: percentile(&durations, 99.0),
            degrading: degrading(records, self.window, self.threshold),
        }
    }
}

/// Linear interpolation between closest ranks of an ascending slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

fn degrading(records: &VecDeque<InferenceRecord>, window: usize, threshold: f64) -> bool {
    let n = records.len();
    if window == 0 || n < 2 * window {
        return false;
    }
    let mean = |range: std::ops::Range<usize>| {
        range.map(|i| records[i].duration_ms).sum::<f64>() / window as f64
    };
    let recent = mean(n - window..n);
    let prior = mean(n - 2 * window..n - window);
    recent > prior * (1.0 + threshold)
}
