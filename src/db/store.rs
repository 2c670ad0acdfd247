//! Collaborator contracts consumed by the scheduler, the evaluator and the metrics service.
//!
//! Every write is an independent append; implementations must offer read-your-writes
//! consistency to a single scheduler instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::models::{AlertFiring, AlertRule, GroupMembers, ProbeRecord, RuleScope, Target};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Targets with `is_active = true`.
    async fn list_active(&self) -> Result<Vec<Target>, StoreError>;

    /// All targets, optionally restricted to one environment tag.
    async fn list(&self, environment: Option<&str>) -> Result<Vec<Target>, StoreError>;
}

#[async_trait]
pub trait HealthRecordStore: Send + Sync {
    async fn latest_for(&self, target_id: i32) -> Result<Option<ProbeRecord>, StoreError>;

    /// Records of the given targets with `start <= timestamp <= end`, oldest first.
    async fn in_window(
        &self,
        target_ids: &[i32],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProbeRecord>, StoreError>;

    async fn append_record(&self, record: &ProbeRecord) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn active_rules_for(&self, scope: RuleScope) -> Result<Vec<AlertRule>, StoreError>;

    /// An unresolved firing of `rule_id` with `fired_at >= since`, if any.
    async fn unresolved_firing(
        &self,
        rule_id: i32,
        since: DateTime<Utc>,
    ) -> Result<Option<AlertFiring>, StoreError>;

    /// Persists the firing and returns it with its assigned id.
    async fn append_firing(&self, firing: &AlertFiring) -> Result<AlertFiring, StoreError>;

    /// Every unresolved firing together with the rule that raised it.
    async fn unresolved_firings(&self) -> Result<Vec<(AlertFiring, AlertRule)>, StoreError>;

    /// Manual resolution; nothing in the pipeline resolves firings on its own.
    async fn resolve_firing(
        &self,
        firing_id: i32,
        resolved_at: DateTime<Utc>,
    ) -> Result<AlertFiring, StoreError>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Groups that currently have at least one member.
    async fn groups_with_members(&self) -> Result<Vec<GroupMembers>, StoreError>;
}
