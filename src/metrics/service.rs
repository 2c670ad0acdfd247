use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use super::aggregator;
use crate::db::models::{
    AlertFiring, AlertRule, Metrics, ProbeRecord, RuleScope, Target, TargetMetrics,
};
use crate::db::store::{AlertStore, GroupStore, HealthRecordStore, StoreError, TargetStore};

/// Window used when a query leaves the start open.
pub const DEFAULT_WINDOW: Duration = Duration::hours(1);

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Invalid time window: start {start} is after end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
    pub environment: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl MetricsQuery {
    /// An empty environment string means "all environments".
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref().filter(|e| !e.is_empty())
    }

    pub fn window(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), MetricsError> {
        let end = self.end_time.unwrap_or(now);
        let start = self.start_time.unwrap_or(end - DEFAULT_WINDOW);
        if start > end {
            return Err(MetricsError::InvalidWindow { start, end });
        }
        Ok((start, end))
    }
}

/// Read-only dashboard queries over the stores.
pub struct MetricsService {
    targets: Arc<dyn TargetStore>,
    records: Arc<dyn HealthRecordStore>,
    alerts: Arc<dyn AlertStore>,
    groups: Arc<dyn GroupStore>,
}

impl MetricsService {
    pub fn new(
        targets: Arc<dyn TargetStore>,
        records: Arc<dyn HealthRecordStore>,
        alerts: Arc<dyn AlertStore>,
        groups: Arc<dyn GroupStore>,
    ) -> Self {
        Self {
            targets,
            records,
            alerts,
            groups,
        }
    }

    pub async fn get_metrics(&self, query: &MetricsQuery) -> Result<Metrics, MetricsError> {
        self.get_metrics_at(query, Utc::now()).await
    }

    pub async fn get_per_target_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<Vec<TargetMetrics>, MetricsError> {
        self.get_per_target_metrics_at(query, Utc::now()).await
    }

    pub async fn get_metrics_at(
        &self,
        query: &MetricsQuery,
        now: DateTime<Utc>,
    ) -> Result<Metrics, MetricsError> {
        let (start, end) = query.window(now)?;
        let (targets, records) = self.load_window(query.environment(), start, end).await?;

        let totals = aggregator::aggregate(&records, start, end);
        let firings = self.unresolved_firings_in(query.environment()).await?;

        Ok(Metrics {
            total_traffic_tps: totals.traffic_tps,
            error_rate_percent: totals.error_rate_percent,
            latency_p99_ms: totals.latency_p99_ms,
            alert_count: firings.len(),
            target_breakdown: aggregator::breakdown_by_target(&records, &targets, start, end),
            alert_breakdown: aggregator::alert_breakdown(&firings),
        })
    }

    pub async fn get_per_target_metrics_at(
        &self,
        query: &MetricsQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<TargetMetrics>, MetricsError> {
        let (start, end) = query.window(now)?;
        let (targets, records) = self.load_window(query.environment(), start, end).await?;
        Ok(aggregator::breakdown_by_target(&records, &targets, start, end))
    }

    async fn load_window(
        &self,
        environment: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(Vec<Target>, Vec<ProbeRecord>), StoreError> {
        let targets = self.targets.list(environment).await?;
        let ids: Vec<i32> = targets.iter().map(|t| t.id).collect();
        let records = self.records.in_window(&ids, start, end).await?;
        Ok((targets, records))
    }

    /// Unresolved firings whose rule watches the environment: a target tagged with it,
    /// or a group with at least one member tagged with it.
    async fn unresolved_firings_in(
        &self,
        environment: Option<&str>,
    ) -> Result<Vec<(AlertFiring, AlertRule)>, StoreError> {
        let firings = self.alerts.unresolved_firings().await?;
        let Some(environment) = environment else {
            return Ok(firings);
        };

        let target_ids: HashSet<i32> = self
            .targets
            .list(Some(environment))
            .await?
            .iter()
            .map(|t| t.id)
            .collect();
        let group_ids: HashSet<i32> = self
            .groups
            .groups_with_members()
            .await?
            .iter()
            .filter(|g| g.members.iter().any(|m| target_ids.contains(&m.id)))
            .map(|g| g.group.id)
            .collect();

        Ok(firings
            .into_iter()
            .filter(|(_, rule)| match rule.scope {
                RuleScope::Target(id) => target_ids.contains(&id),
                RuleScope::Group(id) => group_ids.contains(&id),
            })
            .collect())
    }
}
