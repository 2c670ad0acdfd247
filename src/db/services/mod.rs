//! SeaORM-backed implementation of the store traits.
//!
//! Query helpers live in one module per table family; [`DatabaseStore`] adapts them to
//! the domain types the pipeline works with.

pub mod alert_service;
pub mod group_service;
pub mod probe_record_service;
pub mod target_service;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::db::models::{
    AlertFiring, AlertRule, Group, GroupMembers, ProbeRecord, RuleScope, Target,
};
use crate::db::store::{AlertStore, GroupStore, HealthRecordStore, StoreError, TargetStore};

pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl TargetStore for DatabaseStore {
    async fn list_active(&self) -> Result<Vec<Target>, StoreError> {
        let targets = target_service::list_active_targets(&self.db).await?;
        Ok(targets.into_iter().map(Target::from).collect())
    }

    async fn list(&self, environment: Option<&str>) -> Result<Vec<Target>, StoreError> {
        let targets = target_service::list_targets(&self.db, environment).await?;
        Ok(targets.into_iter().map(Target::from).collect())
    }
}

#[async_trait]
impl HealthRecordStore for DatabaseStore {
    async fn latest_for(&self, target_id: i32) -> Result<Option<ProbeRecord>, StoreError> {
        probe_record_service::get_latest_record_for_target(&self.db, target_id)
            .await?
            .map(ProbeRecord::try_from)
            .transpose()
    }

    async fn in_window(
        &self,
        target_ids: &[i32],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProbeRecord>, StoreError> {
        probe_record_service::get_records_in_window(&self.db, target_ids, start, end)
            .await?
            .into_iter()
            .map(ProbeRecord::try_from)
            .collect()
    }

    async fn append_record(&self, record: &ProbeRecord) -> Result<(), StoreError> {
        probe_record_service::insert_record(&self.db, record).await?;
        Ok(())
    }
}

#[async_trait]
impl AlertStore for DatabaseStore {
    async fn active_rules_for(&self, scope: RuleScope) -> Result<Vec<AlertRule>, StoreError> {
        let rules = alert_service::get_active_rules_for_scope(&self.db, scope).await?;
        Ok(rules
            .into_iter()
            .filter_map(|rule| match AlertRule::try_from(rule) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed alert rule.");
                    None
                }
            })
            .collect())
    }

    async fn unresolved_firing(
        &self,
        rule_id: i32,
        since: DateTime<Utc>,
    ) -> Result<Option<AlertFiring>, StoreError> {
        Ok(alert_service::find_unresolved_firing_since(&self.db, rule_id, since)
            .await?
            .map(AlertFiring::from))
    }

    async fn append_firing(&self, firing: &AlertFiring) -> Result<AlertFiring, StoreError> {
        let stored = alert_service::insert_firing(&self.db, firing).await?;
        Ok(stored.into())
    }

    async fn unresolved_firings(&self) -> Result<Vec<(AlertFiring, AlertRule)>, StoreError> {
        let rows = alert_service::get_unresolved_firings_with_rules(&self.db).await?;
        Ok(rows
            .into_iter()
            .filter_map(|(firing, rule)| {
                let Some(rule) = rule else {
                    warn!(
                        firing_id = firing.id,
                        rule_id = firing.rule_id,
                        "Skipping alert firing whose rule is missing."
                    );
                    return None;
                };
                match AlertRule::try_from(rule) {
                    Ok(rule) => Some((AlertFiring::from(firing), rule)),
                    Err(e) => {
                        warn!(firing_id = firing.id, error = %e, "Skipping alert firing with a malformed rule.");
                        None
                    }
                }
            })
            .collect())
    }

    async fn resolve_firing(
        &self,
        firing_id: i32,
        resolved_at: DateTime<Utc>,
    ) -> Result<AlertFiring, StoreError> {
        match alert_service::mark_firing_resolved(&self.db, firing_id, resolved_at).await {
            Ok(model) => Ok(model.into()),
            Err(sea_orm::DbErr::RecordNotFound(msg)) => Err(StoreError::NotFound(msg)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl GroupStore for DatabaseStore {
    async fn groups_with_members(&self) -> Result<Vec<GroupMembers>, StoreError> {
        let groups = group_service::get_groups_with_members(&self.db).await?;
        Ok(groups
            .into_iter()
            .map(|(group, members)| GroupMembers {
                group: Group {
                    id: group.id,
                    name: group.name,
                },
                members: members.into_iter().map(Target::from).collect(),
            })
            .collect())
    }
}
