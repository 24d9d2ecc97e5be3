//! Metrics collection and Prometheus export.
//!
//! Installs the Prometheus recorder and names the chat-specific series.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use crate::services::providers::Usage;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the recorder. Calling it again after a successful install is a no-op.
pub fn init_metrics() -> anyhow::Result<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_completion(model: &str, outcome: &'static str) {
    counter!(
        "chat_completions_total",
        "model" => model.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_tokens(model: &str, usage: &Usage) {
    counter!("chat_tokens_total", "model" => model.to_string(), "kind" => "prompt")
        .increment(u64::from(usage.prompt_tokens));
    counter!("chat_tokens_total", "model" => model.to_string(), "kind" => "completion")
        .increment(u64::from(usage.completion_tokens));
}

pub fn record_session_created() {
    counter!("chat_sessions_created_total").increment(1);
}

pub fn record_evictions(kind: &'static str, count: usize) {
    counter!("session_store_evictions_total", "kind" => kind).increment(count as u64);
}

/// A non-fatal step of a multi-step write failed; state may have drifted.
pub fn consistency_warning(operation: &'static str, key: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(
        target: "consistency",
        operation,
        key,
        error = %error,
        "Session store consistency warning"
    );
    counter!("session_store_consistency_warnings_total", "operation" => operation).increment(1);
}
