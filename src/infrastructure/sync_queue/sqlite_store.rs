use super::mappers::sync_queue_item_from_row;
use super::rows::SyncQueueRow;
use crate::application::ports::sync_queue_store::SyncQueueStore;
use crate::domain::entities::SyncQueueItem;
use crate::domain::value_objects::{EntityId, SyncOperationType, SyncQueueId, SyncQueueStatus};
use crate::infrastructure::database::connection_pool::ConnectionPool;
use crate::infrastructure::database::timestamps::to_millis;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const SELECT_COLUMNS: &str = r#"
    SELECT id, entity_id, operation_type, status, retry_count,
           last_attempt, error_message, created_at, updated_at
    FROM sync_queue
"#;

/// SQLite による同期キュー。
#[derive(Clone)]
pub struct SqliteSyncQueueStore {
    pool: ConnectionPool,
}

impl SqliteSyncQueueStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &SqlitePool {
        self.pool.get_pool()
    }

    fn map_rows(rows: Vec<SyncQueueRow>) -> Result<Vec<SyncQueueItem>, AppError> {
        rows.into_iter().map(sync_queue_item_from_row).collect()
    }
}

#[async_trait]
impl SyncQueueStore for SqliteSyncQueueStore {
    async fn enqueue(
        &self,
        operation_type: SyncOperationType,
        entity_id: &EntityId,
    ) -> Result<SyncQueueItem, AppError> {
        let id = SyncQueueId::generate();
        let now_ms = Utc::now().timestamp_millis();

        // 未完了行があれば failed のみ pending に戻し、pending/uploading はそのまま
        let row = sqlx::query_as::<_, SyncQueueRow>(
            r#"
            INSERT INTO sync_queue (
                id, entity_id, operation_type, status, retry_count,
                last_attempt, error_message, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 'pending', 0, NULL, NULL, ?4, ?4)
            ON CONFLICT(entity_id, operation_type) WHERE status != 'completed' DO UPDATE SET
                status = CASE WHEN sync_queue.status = 'failed'
                    THEN 'pending' ELSE sync_queue.status END,
                retry_count = CASE WHEN sync_queue.status = 'failed'
                    THEN 0 ELSE sync_queue.retry_count END,
                error_message = CASE WHEN sync_queue.status = 'failed'
                    THEN NULL ELSE sync_queue.error_message END,
                updated_at = excluded.updated_at
            RETURNING id, entity_id, operation_type, status, retry_count,
                      last_attempt, error_message, created_at, updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(entity_id.as_str())
        .bind(operation_type.as_str())
        .bind(now_ms)
        .fetch_one(self.pool())
        .await?;

        let item = sync_queue_item_from_row(row)?;
        tracing::debug!(
            target: "sync::queue",
            queue_id = %item.id,
            entity_id = %item.entity_id,
            operation = %item.operation_type,
            status = %item.status,
            "sync item enqueued"
        );
        Ok(item)
    }

    async fn pending_items(&self) -> Result<Vec<SyncQueueItem>, AppError> {
        let rows = sqlx::query_as::<_, SyncQueueRow>(&format!(
            "{SELECT_COLUMNS} WHERE status IN ('pending', 'failed') ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(self.pool())
        .await?;

        Self::map_rows(rows)
    }

    async fn failed_items(&self) -> Result<Vec<SyncQueueItem>, AppError> {
        let rows = sqlx::query_as::<_, SyncQueueRow>(&format!(
            "{SELECT_COLUMNS} WHERE status = 'failed' ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(self.pool())
        .await?;

        Self::map_rows(rows)
    }

    async fn pending_count(&self) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sync_queue WHERE status IN ('pending', 'uploading')",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn failed_count(&self) -> Result<u64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sync_queue WHERE status = 'failed'")
                .fetch_one(self.pool())
                .await?;

        Ok(count.max(0) as u64)
    }

    async fn get(&self, id: &SyncQueueId) -> Result<Option<SyncQueueItem>, AppError> {
        let row = sqlx::query_as::<_, SyncQueueRow>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;

        row.map(sync_queue_item_from_row).transpose()
    }

    async fn update(&self, item: &SyncQueueItem) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = ?1,
                retry_count = ?2,
                last_attempt = ?3,
                error_message = ?4,
                updated_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(item.status.as_str())
        .bind(i64::from(item.retry_count))
        .bind(item.last_attempt.map(to_millis))
        .bind(item.error_message.as_deref())
        .bind(Utc::now().timestamp_millis())
        .bind(item.id.as_str())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(
                target: "sync::queue",
                queue_id = %item.id,
                "sync item vanished before update; ignoring"
            );
        }
        Ok(())
    }

    async fn delete(&self, id: &SyncQueueId) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn status_for_entity(
        &self,
        entity_id: &EntityId,
    ) -> Result<Option<SyncQueueStatus>, AppError> {
        // 複数の操作がある場合は利用者に伝えるべき状態を優先する
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT status FROM sync_queue
            WHERE entity_id = ?1
            ORDER BY CASE status
                WHEN 'failed' THEN 0
                WHEN 'uploading' THEN 1
                WHEN 'pending' THEN 2
                ELSE 3
            END, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(entity_id.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(|(status,)| SyncQueueStatus::parse(&status).map_err(AppError::DeserializationError))
            .transpose()
    }

    async fn cancel(
        &self,
        entity_id: &EntityId,
        operation_type: SyncOperationType,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sync_queue
            WHERE entity_id = ?1 AND operation_type = ?2 AND status != 'completed'
            "#,
        )
        .bind(entity_id.as_str())
        .bind(operation_type.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn reset_failed(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = 'pending', retry_count = 0, error_message = NULL, updated_at = ?1
            WHERE status = 'failed'
            "#,
        )
        .bind(Utc::now().timestamp_millis())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn demote_stale_uploading(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = 'pending', updated_at = ?1
            WHERE status = 'uploading'
              AND (last_attempt IS NULL OR last_attempt < ?2)
            "#,
        )
        .bind(Utc::now().timestamp_millis())
        .bind(to_millis(older_than))
        .execute(self.pool())
        .await?;

        if result.rows_affected() > 0 {
            tracing::warn!(
                target: "sync::queue",
                demoted = result.rows_affected(),
                "stale uploading items returned to pending"
            );
        }
        Ok(result.rows_affected())
    }

    async fn prune_completed(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM sync_queue WHERE status = 'completed' AND updated_at < ?1",
        )
        .bind(to_millis(older_than))
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }
}
