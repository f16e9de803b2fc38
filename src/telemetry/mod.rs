//! Process-scoped usage accounting.
//!
//! [`Telemetry`] is created once at startup and handed to the gateway and the
//! orchestrator. It is cheap to clone and never global.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ModelStats {
    pub calls: u64,
    pub retries: u64,
    pub failures: u64,
    pub contract_fallbacks: u64,
    pub prompt_units: u64,
    pub completion_units: u64,
    pub total_units: u64,
    pub latency_seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct TelemetrySnapshot {
    pub turns: u64,
    pub errored_turns: u64,
    pub models: BTreeMap<String, ModelStats>,
}

#[derive(Debug, Default)]
struct Inner {
    turns: u64,
    errored_turns: u64,
    models: BTreeMap<String, ModelStats>,
}

#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    inner: Arc<RwLock<Inner>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self, model: &str, prompt: u32, completion: u32, total: u32, latency: f64) {
        let mut inner = self.inner.write();
        let stats = inner.models.entry(model.to_string()).or_default();
        stats.calls += 1;
        stats.prompt_units += u64::from(prompt);
        stats.completion_units += u64::from(completion);
        stats.total_units += u64::from(total);
        stats.latency_seconds += latency;
    }

    pub fn record_retry(&self, model: &str) {
        self.inner
            .write()
            .models
            .entry(model.to_string())
            .or_default()
            .retries += 1;
    }

    pub fn record_failure(&self, model: &str) {
        self.inner
            .write()
            .models
            .entry(model.to_string())
            .or_default()
            .failures += 1;
    }

    pub fn record_contract_fallback(&self, model: &str) {
        self.inner
            .write()
            .models
            .entry(model.to_string())
            .or_default()
            .contract_fallbacks += 1;
    }

    pub fn record_turn(&self, errored: bool) {
        let mut inner = self.inner.write();
        inner.turns += 1;
        if errored {
            inner.errored_turns += 1;
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let inner = self.inner.read();
        TelemetrySnapshot {
            turns: inner.turns,
            errored_turns: inner.errored_turns,
            models: inner.models.clone(),
        }
    }
}
