//! Diagnostic endpoints: `/_debug`, `/_config`, `/_stats` and `/health`.
//!
//! None of these open a transaction or touch the metadata store.

use crate::router::AppState;
use axum::{extract::State, Json};
use std::backtrace::Backtrace;
use std::io::Write;
use tracing::{info, warn};

/// `/_debug`: dump the serving thread's backtrace and runtime task counts
/// to stdout. Always answers `"success"`.
pub async fn debug_dump() -> Json<&'static str> {
    let dump = render_dump();

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout
        .write_all(dump.as_bytes())
        .and_then(|_| stdout.flush())
    {
        warn!(error = %e, "Failed to write debug dump");
    }
    info!("Debug dump written to stdout");

    Json("success")
}

fn render_dump() -> String {
    let metrics = tokio::runtime::Handle::current().metrics();
    let thread = std::thread::current();

    format!(
        "=== runtime ===\nworkers: {}\nalive tasks: {}\n=== thread {} ===\n{}\n",
        metrics.num_workers(),
        metrics.num_alive_tasks(),
        thread.name().unwrap_or("unnamed"),
        Backtrace::force_capture(),
    )
}

/// `/_config`: the active configuration
pub async fn config_dump(State(state): State<AppState>) -> Json<serde_json::Value> {
    match serde_json::to_value(state.config.as_ref()) {
        Ok(value) => Json(value),
        Err(e) => {
            warn!(error = %e, "Failed to serialize configuration");
            Json(serde_json::Value::Null)
        }
    }
}

/// `/_stats`: operational counters
pub async fn stats_dump(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut stats = state.dispatcher.stats().to_json();
    stats["uptime_secs"] = state.started.elapsed().as_secs().into();
    Json(stats)
}

/// `/health`: liveness
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}
