use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "target_groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::target_group_member::Entity")]
    TargetGroupMember,
    #[sea_orm(has_many = "super::alert_rule::Entity")]
    AlertRule,
}

impl Related<super::target_group_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TargetGroupMember.def()
    }
}

impl Related<super::alert_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertRule.def()
    }
}

impl Related<super::target::Entity> for Entity {
    fn to() -> RelationDef {
        super::target_group_member::Relation::Target.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::target_group_member::Relation::TargetGroup.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
