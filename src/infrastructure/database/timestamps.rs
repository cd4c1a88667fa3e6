use crate::shared::error::AppError;
use chrono::{DateTime, Utc};

pub fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub fn from_millis(value: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_millis(value).ok_or_else(|| {
        AppError::DeserializationError(format!("Timestamp out of range: {value}"))
    })
}

pub fn from_optional_millis(value: Option<i64>) -> Result<Option<DateTime<Utc>>, AppError> {
    value.map(from_millis).transpose()
}
