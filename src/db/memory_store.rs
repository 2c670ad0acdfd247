//! In-process store with the same semantics as the database store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::models::{AlertFiring, AlertRule, Group, GroupMembers, ProbeRecord, RuleScope, Target};
use super::store::{AlertStore, GroupStore, HealthRecordStore, StoreError, TargetStore};

#[derive(Default)]
struct MemoryState {
    targets: Vec<Target>,
    records: Vec<ProbeRecord>,
    rules: Vec<AlertRule>,
    firings: Vec<AlertFiring>,
    groups: Vec<Group>,
    // (group_id, target_id)
    memberships: Vec<(i32, i32)>,
    next_firing_id: i32,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a target by id.
    pub async fn upsert_target(&self, target: Target) {
        let mut state = self.state.write().await;
        state.targets.retain(|t| t.id != target.id);
        state.targets.push(target);
        state.targets.sort_by_key(|t| t.id);
    }

    pub async fn add_rule(&self, rule: AlertRule) {
        let mut state = self.state.write().await;
        state.rules.retain(|r| r.id != rule.id);
        state.rules.push(rule);
    }

    pub async fn add_group(&self, group: Group, member_ids: &[i32]) {
        let mut state = self.state.write().await;
        let group_id = group.id;
        state.groups.retain(|g| g.id != group_id);
        state.groups.push(group);
        state.groups.sort_by_key(|g| g.id);
        state.memberships.retain(|(g, _)| *g != group_id);
        state
            .memberships
            .extend(member_ids.iter().map(|target_id| (group_id, *target_id)));
    }

    pub async fn records(&self) -> Vec<ProbeRecord> {
        self.state.read().await.records.clone()
    }

    pub async fn firings(&self) -> Vec<AlertFiring> {
        self.state.read().await.firings.clone()
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn list_active(&self) -> Result<Vec<Target>, StoreError> {
        let state = self.state.read().await;
        Ok(state.targets.iter().filter(|t| t.is_active).cloned().collect())
    }

    async fn list(&self, environment: Option<&str>) -> Result<Vec<Target>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .targets
            .iter()
            .filter(|t| environment.is_none() || t.environment.as_deref() == environment)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HealthRecordStore for MemoryStore {
    async fn latest_for(&self, target_id: i32) -> Result<Option<ProbeRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|r| r.target_id == target_id)
            .max_by_key(|r| r.timestamp)
            .cloned())
    }

    async fn in_window(
        &self,
        target_ids: &[i32],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProbeRecord>, StoreError> {
        if target_ids.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.state.read().await;
        let mut records: Vec<ProbeRecord> = state
            .records
            .iter()
            .filter(|r| {
                target_ids.contains(&r.target_id) && r.timestamp >= start && r.timestamp <= end
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    async fn append_record(&self, record: &ProbeRecord) -> Result<(), StoreError> {
        self.state.write().await.records.push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn active_rules_for(&self, scope: RuleScope) -> Result<Vec<AlertRule>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .rules
            .iter()
            .filter(|r| r.is_active && r.scope == scope)
            .cloned()
            .collect())
    }

    async fn unresolved_firing(
        &self,
        rule_id: i32,
        since: DateTime<Utc>,
    ) -> Result<Option<AlertFiring>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .firings
            .iter()
            .find(|f| f.rule_id == rule_id && !f.is_resolved && f.fired_at >= since)
            .cloned())
    }

    async fn append_firing(&self, firing: &AlertFiring) -> Result<AlertFiring, StoreError> {
        let mut state = self.state.write().await;
        state.next_firing_id += 1;
        let stored = AlertFiring {
            id: Some(state.next_firing_id),
            ..firing.clone()
        };
        state.firings.push(stored.clone());
        Ok(stored)
    }

    async fn unresolved_firings(&self) -> Result<Vec<(AlertFiring, AlertRule)>, StoreError> {
        let state = self.state.read().await;
        state
            .firings
            .iter()
            .filter(|f| !f.is_resolved)
            .map(|f| {
                state
                    .rules
                    .iter()
                    .find(|r| r.id == f.rule_id)
                    .map(|r| (f.clone(), r.clone()))
                    .ok_or_else(|| {
                        StoreError::InvalidRecord(format!(
                            "firing references unknown rule {}",
                            f.rule_id
                        ))
                    })
            })
            .collect()
    }

    async fn resolve_firing(
        &self,
        firing_id: i32,
        resolved_at: DateTime<Utc>,
    ) -> Result<AlertFiring, StoreError> {
        let mut state = self.state.write().await;
        let firing = state
            .firings
            .iter_mut()
            .find(|f| f.id == Some(firing_id))
            .ok_or_else(|| StoreError::NotFound(format!("alert firing {firing_id}")))?;
        firing.is_resolved = true;
        firing.resolved_at = Some(resolved_at);
        Ok(firing.clone())
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn groups_with_members(&self) -> Result<Vec<GroupMembers>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .iter()
            .filter_map(|group| {
                let members: Vec<Target> = state
                    .targets
                    .iter()
                    .filter(|t| state.memberships.contains(&(group.id, t.id)))
                    .cloned()
                    .collect();
                (!members.is_empty()).then(|| GroupMembers {
                    group: group.clone(),
                    members,
                })
            })
            .collect())
    }
}
