//! Observability for selection cycles
//!
//! Provides Prometheus metrics for verdicts, skipped budgets, candidate
//! pool size and removals. The process is short-lived, so the registry
//! is rendered once at the end of a run, typically into a node-exporter
//! textfile.

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

/// Histogram buckets for evaluation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SelectionMetricsInner> = OnceLock::new();

struct SelectionMetricsInner {
    verdicts: IntCounterVec,
    budgets_skipped: IntCounter,
    candidates_admitted: IntGauge,
    candidates_eligible: IntGauge,
    evaluation_seconds: Histogram,
    removals: IntCounterVec,
}

impl SelectionMetricsInner {
    fn new() -> Self {
        Self {
            verdicts: register_int_counter_vec!(
                "pod_killer_verdicts_total",
                "Safety verdicts issued, by outcome and reason class",
                &["outcome", "reason"]
            )
            .expect("Failed to register verdicts_total"),

            budgets_skipped: register_int_counter!(
                "pod_killer_budgets_skipped_total",
                "Disruption budgets skipped because they could not be evaluated"
            )
            .expect("Failed to register budgets_skipped_total"),

            candidates_admitted: register_int_gauge!(
                "pod_killer_candidates_admitted",
                "Instances admitted as safe to disrupt in the last cycle"
            )
            .expect("Failed to register candidates_admitted"),

            candidates_eligible: register_int_gauge!(
                "pod_killer_candidates_eligible",
                "Running, targeted instances judged by the safety engine in the last cycle"
            )
            .expect("Failed to register candidates_eligible"),

            evaluation_seconds: register_histogram!(
                "pod_killer_evaluation_seconds",
                "Time spent evaluating safety for a namespace snapshot",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register evaluation_seconds"),

            removals: register_int_counter_vec!(
                "pod_killer_removals_total",
                "Removal attempts, by mode and result",
                &["mode", "result"]
            )
            .expect("Failed to register removals_total"),
        }
    }
}

/// Handle to the process-wide selection metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct SelectionMetrics {
    _private: (),
}

impl Default for SelectionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SelectionMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SelectionMetricsInner {
        GLOBAL_METRICS.get_or_init(SelectionMetricsInner::new)
    }

    pub fn record_verdict(&self, admitted: bool, reason_class: &str) {
        let outcome = if admitted { "admitted" } else { "denied" };
        self.inner()
            .verdicts
            .with_label_values(&[outcome, reason_class])
            .inc();
    }

    pub fn record_skipped_budgets(&self, count: usize) {
        self.inner().budgets_skipped.inc_by(count as u64);
    }

    /// Record the judged pool size and how much of it was admitted
    pub fn set_pool(&self, eligible: usize, admitted: usize) {
        self.inner().candidates_eligible.set(eligible as i64);
        self.inner().candidates_admitted.set(admitted as i64);
    }

    pub fn observe_evaluation(&self, duration_secs: f64) {
        self.inner().evaluation_seconds.observe(duration_secs);
    }

    pub fn record_removal(&self, mode: &str, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.inner().removals.with_label_values(&[mode, result]).inc();
    }

    /// Current value of one verdict counter
    pub fn verdict_count(&self, admitted: bool, reason_class: &str) -> u64 {
        let outcome = if admitted { "admitted" } else { "denied" };
        self.inner()
            .verdicts
            .with_label_values(&[outcome, reason_class])
            .get()
    }

    /// Render all registered metrics in text exposition format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Write the exposition to `path` via a temporary sibling and rename
    pub fn write_textfile(&self, path: &Path) -> std::io::Result<()> {
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.render())?;
        std::fs::rename(&tmp, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_state() {
        let a = SelectionMetrics::new();
        let b = a.clone();

        let before = a.verdict_count(false, "test-shared");
        b.record_verdict(false, "test-shared");
        assert_eq!(a.verdict_count(false, "test-shared"), before + 1);
    }

    #[test]
    fn test_render_contains_metric_names() {
        let metrics = SelectionMetrics::new();
        metrics.record_verdict(true, "unprotected");
        metrics.set_pool(3, 2);
        metrics.record_removal("delete", true);

        let text = metrics.render();
        assert!(text.contains("pod_killer_verdicts_total"));
        assert!(text.contains("pod_killer_candidates_admitted"));
        assert!(text.contains("pod_killer_candidates_eligible"));
        assert!(!text.contains("pod_killer_candidates_screened"));
        assert!(text.contains("pod_killer_removals_total"));
    }

    #[test]
    fn test_write_textfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pod_killer.prom");
        let metrics = SelectionMetrics::new();
        metrics.record_skipped_budgets(1);

        metrics.write_textfile(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("pod_killer_budgets_skipped_total"));
        assert!(!dir.path().join("pod_killer.prom.tmp").exists());
    }
}
