//! Operational statistics served on `/_stats`.
//!
//! Lock-free counters for requests and transaction-scope outcomes, plus
//! per-operation request counts.

use crate::domain::operations::Operation;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Per-operation counters
#[derive(Default)]
pub struct OperationCounters {
    pub total: AtomicU64,
    pub errors: AtomicU64,
}

/// Handler statistics
#[derive(Default)]
pub struct HandlerStats {
    // Request counters
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_error: AtomicU64,

    // Requests rejected before a transaction was opened
    pub setup_failures: AtomicU64,

    // Transaction scopes
    pub scopes_open: AtomicU64,
    pub commits: AtomicU64,
    pub rollbacks: AtomicU64,
    pub commit_failures: AtomicU64,
    pub rollback_failures: AtomicU64,
    pub abandoned_scopes: AtomicU64,

    // Latency tracking
    pub total_latency_ms: AtomicU64,
    pub request_count_for_latency: AtomicU64,

    per_operation: DashMap<Operation, OperationCounters>,
}

impl HandlerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished request
    pub fn record_request(&self, operation: Operation, success: bool, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let counters = self.per_operation.entry(operation).or_default();
        counters.total.fetch_add(1, Ordering::Relaxed);

        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
            counters.errors.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        self.request_count_for_latency
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request rejected while building its context or scope
    pub fn record_setup_failure(&self) {
        self.setup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scope_opened(&self) {
        self.scopes_open.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.scopes_open.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        self.scopes_open.fetch_sub(1, Ordering::Relaxed);
    }

    /// A commit failed; the scope still terminates through rollback
    pub fn record_commit_failure(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollback_failure(&self) {
        self.rollback_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A scope was dropped while still open (panic or cancellation)
    pub fn record_abandoned_scope(&self) {
        self.abandoned_scopes.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests seen for one operation
    pub fn operation_total(&self, operation: Operation) -> u64 {
        self.per_operation
            .get(&operation)
            .map(|c| c.total.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Get average latency in ms
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.request_count_for_latency.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export statistics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        let operations: serde_json::Map<String, serde_json::Value> = Operation::ALL
            .iter()
            .map(|op| {
                let (total, errors) = self
                    .per_operation
                    .get(op)
                    .map(|c| {
                        (
                            c.total.load(Ordering::Relaxed),
                            c.errors.load(Ordering::Relaxed),
                        )
                    })
                    .unwrap_or((0, 0));
                (
                    op.name().to_string(),
                    serde_json::json!({ "total": total, "errors": errors }),
                )
            })
            .collect();

        serde_json::json!({
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "success": self.requests_success.load(Ordering::Relaxed),
                "error": self.requests_error.load(Ordering::Relaxed),
                "setup_failures": self.setup_failures.load(Ordering::Relaxed),
            },
            "transactions": {
                "open": self.scopes_open.load(Ordering::Relaxed),
                "commits": self.commits.load(Ordering::Relaxed),
                "rollbacks": self.rollbacks.load(Ordering::Relaxed),
                "commit_failures": self.commit_failures.load(Ordering::Relaxed),
                "rollback_failures": self.rollback_failures.load(Ordering::Relaxed),
                "abandoned": self.abandoned_scopes.load(Ordering::Relaxed),
            },
            "operations": operations,
            "latency": {
                "average_ms": self.average_latency_ms(),
            }
        })
    }
}

/// Request timing helper.
///
/// A timer dropped without [`finish`](Self::finish) (the request future was
/// cancelled) is recorded as a failed request.
pub struct RequestTimer {
    start: Instant,
    stats: Arc<HandlerStats>,
    operation: Operation,
    recorded: bool,
}

impl RequestTimer {
    pub fn new(stats: Arc<HandlerStats>, operation: Operation) -> Self {
        Self {
            start: Instant::now(),
            stats,
            operation,
            recorded: false,
        }
    }

    pub fn finish(mut self, success: bool) {
        self.record(success);
    }

    fn record(&mut self, success: bool) {
        self.recorded = true;
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.stats
            .record_request(self.operation, success, latency_ms);
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        if !self.recorded {
            self.record(false);
        }
    }
}
