//! Queries over monitored targets.

use crate::db::entities::{prelude::*, target};
use crate::db::models;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashMap;
use tracing::warn;

pub async fn list_active_targets(db: &DatabaseConnection) -> Result<Vec<target::Model>, DbErr> {
    Target::find()
        .filter(target::Column::IsActive.eq(true))
        .order_by_asc(target::Column::Id)
        .all(db)
        .await
}

pub async fn list_targets(
    db: &DatabaseConnection,
    environment: Option<&str>,
) -> Result<Vec<target::Model>, DbErr> {
    let mut query = Target::find();
    if let Some(environment) = environment {
        query = query.filter(target::Column::Environment.eq(environment));
    }
    query.order_by_asc(target::Column::Id).all(db).await
}

/// Header maps are stored as a JSON object. Rows written by older tooling hold the
/// object serialized inside a JSON string, so both shapes are accepted.
fn parse_headers(target_id: i32, raw: Option<serde_json::Value>) -> Option<HashMap<String, String>> {
    let value = match raw? {
        serde_json::Value::Null => return None,
        serde_json::Value::String(text) if text.trim().is_empty() => return None,
        serde_json::Value::String(text) => match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!(target_id = target_id, error = %e, "Failed to parse headers JSON. Probing without custom headers.");
                return None;
            }
        },
        value => value,
    };

    match serde_json::from_value::<HashMap<String, String>>(value) {
        Ok(headers) => Some(headers),
        Err(e) => {
            warn!(target_id = target_id, error = %e, "Headers JSON is not a string map. Probing without custom headers.");
            None
        }
    }
}

impl From<target::Model> for models::Target {
    fn from(model: target::Model) -> Self {
        let headers = parse_headers(model.id, model.headers);
        models::Target {
            id: model.id,
            name: model.name,
            url: model.url,
            method: model.method,
            headers,
            body: model.body,
            check_interval_seconds: model.check_interval_seconds,
            timeout_seconds: model.timeout_seconds,
            is_active: model.is_active,
            environment: model.environment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn headers_accept_object_and_embedded_string() {
        let from_object = parse_headers(1, Some(json!({ "X-Api-Key": "abc" }))).unwrap();
        assert_eq!(from_object.get("X-Api-Key").map(String::as_str), Some("abc"));

        let from_string = parse_headers(1, Some(json!("{\"Accept\":\"text/plain\"}"))).unwrap();
        assert_eq!(from_string.get("Accept").map(String::as_str), Some("text/plain"));
    }

    #[test]
    fn malformed_headers_are_dropped() {
        assert!(parse_headers(1, Some(json!("not json"))).is_none());
        assert!(parse_headers(1, Some(json!({ "X-Retry": 3 }))).is_none());
        assert!(parse_headers(1, Some(json!(null))).is_none());
        assert!(parse_headers(1, None).is_none());
    }
}
