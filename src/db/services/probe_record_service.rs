//! Append-only probe history.

use crate::db::entities::{prelude::*, probe_record};
use crate::db::models::ProbeRecord as ProbeRecordDto;
use crate::db::store::StoreError;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

pub async fn get_latest_record_for_target(
    db: &DatabaseConnection,
    target_id: i32,
) -> Result<Option<probe_record::Model>, DbErr> {
    ProbeRecord::find()
        .filter(probe_record::Column::TargetId.eq(target_id))
        .order_by_desc(probe_record::Column::CheckedAt)
        .one(db)
        .await
}

pub async fn get_records_in_window(
    db: &DatabaseConnection,
    target_ids: &[i32],
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<Vec<probe_record::Model>, DbErr> {
    if target_ids.is_empty() {
        return Ok(Vec::new());
    }

    ProbeRecord::find()
        .filter(probe_record::Column::TargetId.is_in(target_ids.to_vec()))
        .filter(probe_record::Column::CheckedAt.gte(start_time))
        .filter(probe_record::Column::CheckedAt.lte(end_time))
        .order_by_asc(probe_record::Column::CheckedAt)
        .all(db)
        .await
}

pub async fn insert_record(
    db: &DatabaseConnection,
    record: &ProbeRecordDto,
) -> Result<probe_record::Model, DbErr> {
    let new_record = probe_record::ActiveModel {
        target_id: Set(record.target_id),
        checked_at: Set(record.timestamp),
        is_success: Set(record.is_success),
        status_code: Set(i32::from(record.status_code)),
        latency_ms: Set(record.latency_ms),
        response_body: Set(record.response_body.clone()),
        error_message: Set(record.error_message.clone()),
        ..Default::default()
    };

    new_record.insert(db).await
}

impl TryFrom<probe_record::Model> for ProbeRecordDto {
    type Error = StoreError;

    fn try_from(model: probe_record::Model) -> Result<Self, Self::Error> {
        let status_code = u16::try_from(model.status_code).map_err(|_| {
            StoreError::InvalidRecord(format!(
                "probe record {} has status code {} out of range",
                model.id, model.status_code
            ))
        })?;

        Ok(ProbeRecordDto {
            target_id: model.target_id,
            timestamp: model.checked_at,
            is_success: model.is_success,
            status_code,
            latency_ms: model.latency_ms,
            response_body: model.response_body,
            error_message: model.error_message,
        })
    }
}
