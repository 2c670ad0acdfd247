//! Alert rules and their firings.

use crate::db::entities::{alert_firing, alert_rule, prelude::*};
use crate::db::models::{AlertFiring as AlertFiringDto, AlertRule as AlertRuleDto, RuleScope};
use crate::db::store::StoreError;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

pub async fn get_active_rules_for_scope(
    db: &DatabaseConnection,
    scope: RuleScope,
) -> Result<Vec<alert_rule::Model>, DbErr> {
    let query = AlertRule::find().filter(alert_rule::Column::IsActive.eq(true));
    let query = match scope {
        RuleScope::Target(target_id) => query.filter(alert_rule::Column::TargetId.eq(target_id)),
        RuleScope::Group(group_id) => query.filter(alert_rule::Column::GroupId.eq(group_id)),
    };
    query.order_by_asc(alert_rule::Column::Id).all(db).await
}

pub async fn find_unresolved_firing_since(
    db: &DatabaseConnection,
    rule_id: i32,
    since: DateTime<Utc>,
) -> Result<Option<alert_firing::Model>, DbErr> {
    AlertFiring::find()
        .filter(alert_firing::Column::RuleId.eq(rule_id))
        .filter(alert_firing::Column::IsResolved.eq(false))
        .filter(alert_firing::Column::FiredAt.gte(since))
        .order_by_desc(alert_firing::Column::FiredAt)
        .one(db)
        .await
}

pub async fn insert_firing(
    db: &DatabaseConnection,
    firing: &AlertFiringDto,
) -> Result<alert_firing::Model, DbErr> {
    let new_firing = alert_firing::ActiveModel {
        rule_id: Set(firing.rule_id),
        fired_at: Set(firing.fired_at),
        message: Set(firing.message.clone()),
        is_resolved: Set(firing.is_resolved),
        resolved_at: Set(firing.resolved_at),
        ..Default::default()
    };

    new_firing.insert(db).await
}

pub async fn get_unresolved_firings_with_rules(
    db: &DatabaseConnection,
) -> Result<Vec<(alert_firing::Model, Option<alert_rule::Model>)>, DbErr> {
    AlertFiring::find()
        .filter(alert_firing::Column::IsResolved.eq(false))
        .find_also_related(AlertRule)
        .all(db)
        .await
}

pub async fn mark_firing_resolved(
    db: &DatabaseConnection,
    firing_id: i32,
    resolved_at: DateTime<Utc>,
) -> Result<alert_firing::Model, DbErr> {
    let firing = AlertFiring::find_by_id(firing_id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("Alert firing {firing_id} not found")))?;

    let mut active: alert_firing::ActiveModel = firing.into();
    active.is_resolved = Set(true);
    active.resolved_at = Set(Some(resolved_at));
    active.update(db).await
}

impl TryFrom<alert_rule::Model> for AlertRuleDto {
    type Error = StoreError;

    fn try_from(model: alert_rule::Model) -> Result<Self, Self::Error> {
        let scope = match (model.target_id, model.group_id) {
            (Some(target_id), None) => RuleScope::Target(target_id),
            (None, Some(group_id)) => RuleScope::Group(group_id),
            (Some(_), Some(_)) => {
                return Err(StoreError::InvalidRecord(format!(
                    "alert rule {} is bound to both a target and a group",
                    model.id
                )))
            }
            (None, None) => {
                return Err(StoreError::InvalidRecord(format!(
                    "alert rule {} is bound to neither a target nor a group",
                    model.id
                )))
            }
        };

        Ok(AlertRuleDto {
            id: model.id,
            name: model.name,
            kind: model.kind,
            operator: model.operator,
            threshold: model.threshold,
            scope,
            is_active: model.is_active,
        })
    }
}

impl From<alert_firing::Model> for AlertFiringDto {
    fn from(model: alert_firing::Model) -> Self {
        AlertFiringDto {
            id: Some(model.id),
            rule_id: model.rule_id,
            fired_at: model.fired_at,
            message: model.message,
            is_resolved: model.is_resolved,
            resolved_at: model.resolved_at,
        }
    }
}
