use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used by `Equals` / `NotEquals` so that rates like 10.005 still match 10.0.
pub const EQUALITY_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "alert_kind_enum")]
pub enum AlertKind {
    #[sea_orm(string_value = "ERROR_RATE")]
    ErrorRate,
    #[sea_orm(string_value = "LATENCY")]
    Latency,
    /// Declared in the rule vocabulary but never evaluated.
    #[sea_orm(string_value = "UPTIME")]
    Uptime,
    #[sea_orm(string_value = "STATUS_CODE")]
    StatusCode,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "comparison_operator_enum")]
pub enum ComparisonOperator {
    #[sea_orm(string_value = "GREATER_THAN")]
    GreaterThan,
    #[sea_orm(string_value = "LESS_THAN")]
    LessThan,
    #[sea_orm(string_value = "EQUALS")]
    Equals,
    #[sea_orm(string_value = "NOT_EQUALS")]
    NotEquals,
}

impl ComparisonOperator {
    pub fn evaluate(self, value: f64, threshold: f64) -> bool {
        match self {
            ComparisonOperator::GreaterThan => value > threshold,
            ComparisonOperator::LessThan => value < threshold,
            ComparisonOperator::Equals => (value - threshold).abs() < EQUALITY_EPSILON,
            ComparisonOperator::NotEquals => (value - threshold).abs() >= EQUALITY_EPSILON,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::Equals => "==",
            ComparisonOperator::NotEquals => "!=",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
