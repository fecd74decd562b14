//! Cost events — one measured usage-and-cost record per provider call.
//!
//! Adapters build a [`UsageRecord`] the moment a wrapped call settles and
//! hand it to an [`EventSink`]. The tracker behind the sink stamps the
//! project id and capture time, producing the immutable [`CostEvent`] that
//! is eventually shipped to the collector.

use crate::provider::ProviderKind;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Metadata key carrying the failure message on error events.
pub const ERROR_KEY: &str = "error";

/// A measurement produced by a provider adapter, not yet bound to a project.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub provider: ProviderKind,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub duration_ms: u64,
    pub metadata: Map<String, Value>,
}

impl UsageRecord {
    /// A zero-usage, zero-cost record describing a failed call.
    pub fn failure(
        provider: ProviderKind,
        model: impl Into<String>,
        duration_ms: u64,
        error: impl std::fmt::Display,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert(ERROR_KEY.into(), Value::String(error.to_string()));
        Self {
            provider,
            model: model.into(),
            input_tokens: 0,
            output_tokens: 0,
            cost: 0.0,
            duration_ms,
            metadata,
        }
    }

    /// The failure message, if this record describes a failed call.
    pub fn error(&self) -> Option<&str> {
        self.metadata.get(ERROR_KEY).and_then(Value::as_str)
    }
}

/// The wire-level cost event delivered to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEvent {
    pub project_id: String,
    pub provider: ProviderKind,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    /// Milliseconds spent in the wrapped call.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Capture time, epoch milliseconds.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl CostEvent {
    /// Bind a record to a project, stamped with an explicit capture time.
    pub fn from_record(project_id: impl Into<String>, record: UsageRecord, timestamp_ms: i64) -> Self {
        Self {
            project_id: project_id.into(),
            provider: record.provider,
            model: record.model,
            input_tokens: record.input_tokens,
            output_tokens: record.output_tokens,
            cost: record.cost,
            duration_ms: record.duration_ms,
            timestamp_ms,
            metadata: record.metadata,
        }
    }

    /// Bind a record to a project, stamped with the current wall-clock time.
    pub fn capture(project_id: impl Into<String>, record: UsageRecord) -> Self {
        Self::from_record(project_id, record, Utc::now().timestamp_millis())
    }

    /// Total tokens consumed by the call.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// The failure message, if the call failed.
    pub fn error(&self) -> Option<&str> {
        self.metadata.get(ERROR_KEY).and_then(Value::as_str)
    }
}

/// The emission callback shared between a tracker and its adapters.
///
/// Cloning is cheap; every clone forwards to the same target.
#[derive(Clone)]
pub struct EventSink {
    emit: Arc<dyn Fn(UsageRecord) + Send + Sync>,
}

impl EventSink {
    /// Wrap a callback.
    pub fn new(f: impl Fn(UsageRecord) + Send + Sync + 'static) -> Self {
        Self { emit: Arc::new(f) }
    }

    /// A sink that discards everything.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Hand a finished record to the target.
    pub fn emit(&self, record: UsageRecord) {
        (self.emit)(record)
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}
