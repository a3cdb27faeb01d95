//! Per-model metric collection for the inference pipeline.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Individually measured pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitForSlot,
    Preprocess,
    Deserialize,
    Inference,
    Serialize,
    Postprocess,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::WaitForSlot => "wait_for_slot",
            Phase::Preprocess => "preprocess",
            Phase::Deserialize => "deserialize",
            Phase::Inference => "inference",
            Phase::Serialize => "serialize",
            Phase::Postprocess => "postprocess",
        }
    }

    const ALL: [Phase; 6] = [
        Phase::WaitForSlot,
        Phase::Preprocess,
        Phase::Deserialize,
        Phase::Inference,
        Phase::Serialize,
        Phase::Postprocess,
    ];
}

#[derive(Default)]
struct PhaseStats {
    count: AtomicU64,
    total_us: AtomicU64,
}

/// Metric reporter for one loaded model version.
pub struct ModelMetricReporter {
    model_name: String,
    model_version: u64,

    /// Requests currently inside the pipeline
    pub current_requests: AtomicU32,

    /// Requests that completed successfully
    pub requests_success: AtomicU64,

    /// Requests that returned an error
    pub requests_fail: AtomicU64,

    phases: [PhaseStats; 6],
}

impl ModelMetricReporter {
    pub fn new(model_name: impl Into<String>, model_version: u64) -> Self {
        Self {
            model_name: model_name.into(),
            model_version,
            current_requests: AtomicU32::new(0),
            requests_success: AtomicU64::new(0),
            requests_fail: AtomicU64::new(0),
            phases: Default::default(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_version(&self) -> u64 {
        self.model_version
    }

    /// Record one phase duration for the given execution slot.
    pub fn observe(&self, phase: Phase, elapsed: Duration, slot_id: usize) {
        let us = elapsed.as_micros() as u64;
        let stats = &self.phases[phase as usize];
        stats.count.fetch_add(1, Ordering::Relaxed);
        stats.total_us.fetch_add(us, Ordering::Relaxed);
        debug!(
            "{} duration in model {}, version {}, slot {}: {:.3} ms",
            phase.as_str(),
            self.model_name,
            self.model_version,
            slot_id,
            us as f64 / 1000.0
        );
    }

    pub fn record_success(&self) {
        self.requests_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.requests_fail.fetch_add(1, Ordering::Relaxed);
    }

    /// JSON snapshot of all counters and per-phase totals.
    pub fn snapshot(&self) -> serde_json::Value {
        let mut phases = serde_json::Map::new();
        for phase in Phase::ALL {
            let stats = &self.phases[phase as usize];
            phases.insert(
                phase.as_str().to_string(),
                serde_json::json!({
                    "count": stats.count.load(Ordering::Relaxed),
                    "total_us": stats.total_us.load(Ordering::Relaxed),
                }),
            );
        }
        serde_json::json!({
            "model_name": self.model_name,
            "model_version": self.model_version,
            "current_requests": self.current_requests.load(Ordering::Relaxed),
            "requests_success": self.requests_success.load(Ordering::Relaxed),
            "requests_fail": self.requests_fail.load(Ordering::Relaxed),
            "phases": phases,
        })
    }
}

/// RAII guard tracking one in-flight request.
pub struct ActiveRequestGuard<'a> {
    reporter: &'a ModelMetricReporter,
}

impl<'a> ActiveRequestGuard<'a> {
    pub fn new(reporter: &'a ModelMetricReporter) -> Self {
        reporter.current_requests.fetch_add(1, Ordering::Relaxed);
        Self { reporter }
    }
}

impl Drop for ActiveRequestGuard<'_> {
    fn drop(&mut self) {
        self.reporter
            .current_requests
            .fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_request_guard_balances() {
        let reporter = ModelMetricReporter::new("m", 1);
        {
            let _a = ActiveRequestGuard::new(&reporter);
            let _b = ActiveRequestGuard::new(&reporter);
            assert_eq!(reporter.current_requests.load(Ordering::Relaxed), 2);
        }
        assert_eq!(reporter.current_requests.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn snapshot_reports_phase_totals() {
        let reporter = ModelMetricReporter::new("m", 1);
        reporter.observe(Phase::Inference, Duration::from_millis(2), 0);
        reporter.observe(Phase::Inference, Duration::from_millis(3), 1);
        let snap = reporter.snapshot();
        assert_eq!(snap["phases"]["inference"]["count"], 2);
        assert_eq!(snap["phases"]["inference"]["total_us"], 5000);
    }
}
