use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::db::models::{
    AlertFiring, AlertKind, AlertRule, GroupMembers, ProbeRecord, RuleScope, Target,
};
use crate::db::store::{AlertStore, HealthRecordStore, StoreError};

/// An unresolved firing younger than this suppresses a new one for the same rule.
pub const DEBOUNCE_WINDOW: Duration = Duration::minutes(5);
/// Trailing history read by error-rate and group rules.
pub const EVALUATION_WINDOW: Duration = Duration::hours(1);

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub struct EvaluationService {
    alerts: Arc<dyn AlertStore>,
    records: Arc<dyn HealthRecordStore>,
}

/// The value a rule condition was checked against, kept for the firing message.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Observed {
    StatusCode(u16),
    LatencyMs(i64),
    ErrorRatePercent(f64),
    AverageLatencyMs(f64),
}

impl Observed {
    fn value(self) -> f64 {
        match self {
            Observed::StatusCode(code) => f64::from(code),
            Observed::LatencyMs(ms) => ms as f64,
            Observed::ErrorRatePercent(rate) | Observed::AverageLatencyMs(rate) => rate,
        }
    }

    fn describe(self) -> String {
        match self {
            Observed::StatusCode(code) => format!("status code {code}"),
            Observed::LatencyMs(ms) => format!("latency {ms} ms"),
            Observed::ErrorRatePercent(rate) => format!("error rate {rate:.2}%"),
            Observed::AverageLatencyMs(avg) => format!("average latency {avg:.2} ms"),
        }
    }
}

impl EvaluationService {
    pub fn new(alerts: Arc<dyn AlertStore>, records: Arc<dyn HealthRecordStore>) -> Self {
        Self { alerts, records }
    }

    /// Evaluates every active rule bound to `target` against the probe just persisted
    /// for it. Returns the number of new firings.
    ///
    /// A failing rule is logged and does not stop the remaining rules; the first error
    /// is still returned so the caller can count the target as failed.
    pub async fn evaluate_target(
        &self,
        target: &Target,
        record: &ProbeRecord,
        now: DateTime<Utc>,
    ) -> Result<usize, EvaluationError> {
        let rules = self
            .alerts
            .active_rules_for(RuleScope::Target(target.id))
            .await?;
        if rules.is_empty() {
            return Ok(0);
        }

        let scope = format!("target '{}' (ID: {})", target.name, target.id);
        let mut fired = 0;
        let mut first_error = None;

        for rule in &rules {
            let observed = match rule.kind {
                AlertKind::StatusCode => Some(Observed::StatusCode(record.status_code)),
                AlertKind::Latency => Some(Observed::LatencyMs(record.latency_ms)),
                AlertKind::ErrorRate => {
                    match self
                        .records
                        .in_window(&[target.id], now - EVALUATION_WINDOW, now)
                        .await
                    {
                        Ok(window) => error_rate_percent(&window).map(Observed::ErrorRatePercent),
                        Err(e) => {
                            error!(rule_id = rule.id, target_id = target.id, error = %e, "Error loading history for alert rule.");
                            first_error.get_or_insert(EvaluationError::from(e));
                            continue;
                        }
                    }
                }
                AlertKind::Uptime => {
                    debug!(rule_id = rule.id, "Uptime rules are not evaluated. Skipping.");
                    None
                }
            };

            match self.check_and_fire(rule, &scope, observed, now).await {
                Ok(true) => fired += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(rule_id = rule.id, target_id = target.id, error = %e, "Error evaluating alert rule.");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if fired == 0 => Err(e),
            _ => Ok(fired),
        }
    }

    /// Evaluates the rules bound to a group over its members' trailing hour of records.
    /// Status-code rules have no meaning for a group and are ignored.
    pub async fn evaluate_group(
        &self,
        group: &GroupMembers,
        now: DateTime<Utc>,
    ) -> Result<usize, EvaluationError> {
        let rules = self
            .alerts
            .active_rules_for(RuleScope::Group(group.group.id))
            .await?;
        if rules.is_empty() {
            return Ok(0);
        }

        let window = self
            .records
            .in_window(&group.member_ids(), now - EVALUATION_WINDOW, now)
            .await?;
        if window.is_empty() {
            debug!(group_id = group.group.id, "No recent records for group. Skipping evaluation.");
            return Ok(0);
        }

        let scope = format!("group '{}' (ID: {})", group.group.name, group.group.id);
        let mut fired = 0;
        let mut first_error = None;

        for rule in &rules {
            let observed = match rule.kind {
                AlertKind::ErrorRate => error_rate_percent(&window).map(Observed::ErrorRatePercent),
                AlertKind::Latency => Some(Observed::AverageLatencyMs(
                    average_successful_latency(&window),
                )),
                AlertKind::StatusCode | AlertKind::Uptime => None,
            };

            match self.check_and_fire(rule, &scope, observed, now).await {
                Ok(true) => fired += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(rule_id = rule.id, group_id = group.group.id, error = %e, "Error evaluating group alert rule.");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if fired == 0 => Err(e),
            _ => Ok(fired),
        }
    }

    async fn check_and_fire(
        &self,
        rule: &AlertRule,
        scope: &str,
        observed: Option<Observed>,
        now: DateTime<Utc>,
    ) -> Result<bool, EvaluationError> {
        let Some(observed) = observed else {
            return Ok(false);
        };
        if !rule.operator.evaluate(observed.value(), rule.threshold) {
            return Ok(false);
        }

        if let Some(existing) = self
            .alerts
            .unresolved_firing(rule.id, now - DEBOUNCE_WINDOW)
            .await?
        {
            debug!(
                rule_id = rule.id,
                firing_id = ?existing.id,
                fired_at = %existing.fired_at,
                "Alert condition still true, suppressed by unresolved firing."
            );
            return Ok(false);
        }

        let message = format!(
            "Alert '{}' triggered for {}: {} {} threshold {}",
            rule.name,
            scope,
            observed.describe(),
            rule.operator.symbol(),
            rule.threshold
        );
        let stored = self
            .alerts
            .append_firing(&AlertFiring::new(rule.id, now, message))
            .await?;
        warn!(rule_id = rule.id, firing_id = ?stored.id, message = %stored.message, "Alert fired.");
        Ok(true)
    }
}

/// `failed / total * 100`, or `None` for an empty window.
pub fn error_rate_percent(records: &[ProbeRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let failed = records.iter().filter(|r| !r.is_success).count();
    Some(failed as f64 / records.len() as f64 * 100.0)
}

/// Mean latency of successful records; 0 when there are none.
pub fn average_successful_latency(records: &[ProbeRecord]) -> f64 {
    let (sum, count) = records
        .iter()
        .filter(|r| r.is_success)
        .fold((0i64, 0usize), |(sum, count), r| (sum + r.latency_ms, count + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}
