use super::rows::SyncQueueRow;
use crate::domain::entities::SyncQueueItem;
use crate::domain::value_objects::{EntityId, SyncOperationType, SyncQueueId, SyncQueueStatus};
use crate::infrastructure::database::timestamps::{from_millis, from_optional_millis};
use crate::shared::error::AppError;

pub(crate) fn sync_queue_item_from_row(row: SyncQueueRow) -> Result<SyncQueueItem, AppError> {
    let id = SyncQueueId::new(row.id).map_err(AppError::DeserializationError)?;
    let entity_id = EntityId::new(row.entity_id).map_err(AppError::DeserializationError)?;
    let operation_type = row
        .operation_type
        .parse::<SyncOperationType>()
        .map_err(AppError::DeserializationError)?;
    let status = SyncQueueStatus::parse(&row.status).map_err(AppError::DeserializationError)?;
    let retry_count = u32::try_from(row.retry_count.max(0)).unwrap_or(u32::MAX);

    Ok(SyncQueueItem {
        id,
        entity_id,
        operation_type,
        status,
        retry_count,
        last_attempt: from_optional_millis(row.last_attempt)?,
        error_message: row.error_message,
        created_at: from_millis(row.created_at)?,
    })
}
