//! Session report encoding
//!
//! Packages the end-of-session state (derived stats, the full snapshot history
//! and its timeline) into a self-describing report with producer metadata.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::SessionEngine;
use crate::error::ComputeError;
use crate::report::ReportOutcome;
use crate::timeline::Timeline;
use crate::types::{SessionSnapshot, SessionStats, Timestamp};
use crate::{FOCUS_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Identity and wall-clock anchor of one session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl SessionMeta {
    pub fn new_now() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

/// Everything known about a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub session_id: String,
    pub started_at_utc: String,
    pub ended_at_utc: String,
    pub computed_at_utc: String,
    /// Session time at stop, in milliseconds
    pub duration_ms: Timestamp,
    pub stats: SessionStats,
    pub snapshots: Vec<SessionSnapshot>,
    pub timeline: Timeline,
    /// Ticks discarded as stale during the session
    #[serde(default)]
    pub dropped_ticks: u64,
    /// Attached once the summarization request resolves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ReportOutcome>,
}

impl SessionReport {
    pub fn attach_analysis(&mut self, outcome: ReportOutcome) {
        self.analysis = Some(outcome);
    }

    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        serde_json::from_str(json).map_err(ComputeError::JsonError)
    }
}

/// Encoder for session reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Build the report for a session stopped at session time `now`
    pub fn encode(&self, meta: &SessionMeta, engine: &SessionEngine, now: Timestamp) -> SessionReport {
        let snapshots = engine.snapshots().to_vec();
        let timeline = Timeline::from_snapshots(&snapshots);
        let ended_at = i64::try_from(now)
            .ok()
            .and_then(|ms| meta.started_at.checked_add_signed(Duration::milliseconds(ms)))
            .unwrap_or(meta.started_at);

        SessionReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: FOCUS_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            session_id: meta.session_id.to_string(),
            started_at_utc: meta.started_at.to_rfc3339(),
            ended_at_utc: ended_at.to_rfc3339(),
            computed_at_utc: Utc::now().to_rfc3339(),
            duration_ms: now,
            stats: engine.calculate_stats(now),
            snapshots,
            timeline,
            dropped_ticks: engine.dropped_ticks(),
            analysis: None,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        meta: &SessionMeta,
        engine: &SessionEngine,
        now: Timestamp,
    ) -> Result<String, ComputeError> {
        let report = self.encode(meta, engine, now);
        serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
    }
}
