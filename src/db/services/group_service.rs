use crate::db::entities::{prelude::*, target, target_group};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, QueryOrder};

/// Every group with its member targets; groups without members are dropped.
pub async fn get_groups_with_members(
    db: &DatabaseConnection,
) -> Result<Vec<(target_group::Model, Vec<target::Model>)>, DbErr> {
    let groups = TargetGroup::find()
        .find_with_related(Target)
        .order_by_asc(target_group::Column::Id)
        .all(db)
        .await?;

    Ok(groups
        .into_iter()
        .filter(|(_, members)| !members.is_empty())
        .collect())
}
