use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::{AlertKind, ComparisonOperator};

/// Exactly one of `target_id` / `group_id` is set; rows violating that are rejected on load.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub kind: AlertKind,
    pub operator: ComparisonOperator,
    pub threshold: f64,
    pub target_id: Option<i32>,
    pub group_id: Option<i32>,
    pub is_active: bool,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::target::Entity",
        from = "Column::TargetId",
        to = "super::target::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Target,
    #[sea_orm(
        belongs_to = "super::target_group::Entity",
        from = "Column::GroupId",
        to = "super::target_group::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    TargetGroup,
    #[sea_orm(has_many = "super::alert_firing::Entity")]
    AlertFiring,
}

impl Related<super::target::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Target.def()
    }
}

impl Related<super::target_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TargetGroup.def()
    }
}

impl Related<super::alert_firing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertFiring.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
