use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "targets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub url: String,
    pub method: String,
    /// Header map serialized as a JSON object of string values.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub headers: Option<Json>,
    #[sea_orm(column_type = "Text", nullable)]
    pub body: Option<String>,
    pub check_interval_seconds: i32,
    pub timeout_seconds: i32,
    pub is_active: bool,
    pub environment: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::probe_record::Entity")]
    ProbeRecord,
    #[sea_orm(has_many = "super::alert_rule::Entity")]
    AlertRule,
}

impl Related<super::probe_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProbeRecord.def()
    }
}

impl Related<super::alert_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertRule.def()
    }
}

// Many-to-many membership in groups
impl Related<super::target_group::Entity> for Entity {
    fn to() -> RelationDef {
        super::target_group_member::Relation::TargetGroup.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::target_group_member::Relation::Target.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
