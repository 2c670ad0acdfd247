//! Domain types shared by the scheduler, the prober, the evaluator and the metrics layer.
//!
//! Relationships are plain identifiers; anything navigational is resolved through the
//! store traits in [`crate::db::store`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use crate::db::enums::{AlertKind, ComparisonOperator};

/// Response bodies longer than this many characters are truncated.
pub const MAX_RESPONSE_BODY_CHARS: usize = 10_000;
/// Appended to a truncated response body.
pub const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: i32,
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers: Option<HashMap<String, String>>,
    pub body: Option<String>,
    pub check_interval_seconds: i32,
    pub timeout_seconds: i32,
    pub is_active: bool,
    pub environment: Option<String>,
}

impl Target {
    pub fn check_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.check_interval_seconds.max(1)))
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds.max(1) as u64)
    }

    /// A target is due when it was never probed or its interval has fully elapsed.
    pub fn is_due(&self, last_probe: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_probe {
            None => true,
            Some(last) => now - last >= self.check_interval(),
        }
    }
}

/// Outcome of one probe before it is stamped with the tick time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub is_success: bool,
    /// 0 when no response was obtained.
    pub status_code: u16,
    pub latency_ms: i64,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

impl HealthCheckResult {
    pub fn failure(latency_ms: i64, message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            status_code: 0,
            latency_ms,
            response_body: None,
            error_message: Some(message.into()),
        }
    }

    pub fn into_record(self, target_id: i32, timestamp: DateTime<Utc>) -> ProbeRecord {
        ProbeRecord {
            target_id,
            timestamp,
            is_success: self.is_success,
            status_code: self.status_code,
            latency_ms: self.latency_ms,
            response_body: self.response_body,
            error_message: self.error_message,
        }
    }
}

/// Immutable, append-only result of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRecord {
    pub target_id: i32,
    pub timestamp: DateTime<Utc>,
    pub is_success: bool,
    pub status_code: u16,
    pub latency_ms: i64,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

/// What a rule watches. A rule can never be bound to both a target and a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "id")]
pub enum RuleScope {
    Target(i32),
    Group(i32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub id: i32,
    pub name: String,
    pub kind: AlertKind,
    pub operator: ComparisonOperator,
    pub threshold: f64,
    pub scope: RuleScope,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertFiring {
    /// `None` until the store assigns one.
    pub id: Option<i32>,
    pub rule_id: i32,
    pub fired_at: DateTime<Utc>,
    pub message: String,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AlertFiring {
    pub fn new(rule_id: i32, fired_at: DateTime<Utc>, message: String) -> Self {
        Self {
            id: None,
            rule_id,
            fired_at,
            message,
            is_resolved: false,
            resolved_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i32,
    pub name: String,
}

/// A group together with its current member targets.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMembers {
    pub group: Group,
    pub members: Vec<Target>,
}

impl GroupMembers {
    pub fn member_ids(&self) -> Vec<i32> {
        self.members.iter().map(|t| t.id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetMetrics {
    pub target_id: i32,
    pub target_name: String,
    pub environment: String,
    pub traffic_tps: f64,
    pub error_rate_percent: f64,
    pub latency_p99_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBreakdown {
    pub alert_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_traffic_tps: f64,
    pub error_rate_percent: f64,
    pub latency_p99_ms: i64,
    pub alert_count: usize,
    pub target_breakdown: Vec<TargetMetrics>,
    pub alert_breakdown: Vec<AlertBreakdown>,
}
