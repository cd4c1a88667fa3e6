use crate::domain::entities::SyncQueueItem;
use crate::domain::value_objects::{EntityId, SyncOperationType, SyncQueueId, SyncQueueStatus};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 送信待ち操作を保持する永続キュー。
///
/// `(entity_id, operation_type)` ごとに未完了の行は高々 1 つ。行が見つからない
/// ケース（孤児掃除との競合など）はエラーとして扱わない。
#[async_trait]
pub trait SyncQueueStore: Send + Sync {
    /// 新規に pending を作成するか、既存の未完了行を正規化して返す
    async fn enqueue(
        &self,
        operation_type: SyncOperationType,
        entity_id: &EntityId,
    ) -> Result<SyncQueueItem, AppError>;

    /// pending / failed を作成順（古い順）で返す
    async fn pending_items(&self) -> Result<Vec<SyncQueueItem>, AppError>;

    /// failed を新しい順で返す
    async fn failed_items(&self) -> Result<Vec<SyncQueueItem>, AppError>;

    /// pending と uploading の件数
    async fn pending_count(&self) -> Result<u64, AppError>;

    async fn failed_count(&self) -> Result<u64, AppError>;

    async fn get(&self, id: &SyncQueueId) -> Result<Option<SyncQueueItem>, AppError>;

    async fn update(&self, item: &SyncQueueItem) -> Result<(), AppError>;

    async fn delete(&self, id: &SyncQueueId) -> Result<(), AppError>;

    async fn status_for_entity(
        &self,
        entity_id: &EntityId,
    ) -> Result<Option<SyncQueueStatus>, AppError>;

    /// 明示的なキャンセル。削除した件数を返す
    async fn cancel(
        &self,
        entity_id: &EntityId,
        operation_type: SyncOperationType,
    ) -> Result<u64, AppError>;

    /// 手動リトライ用に failed をすべて pending に戻す
    async fn reset_failed(&self) -> Result<u64, AppError>;

    /// 指定時刻より前から uploading のままの行を pending に戻す
    async fn demote_stale_uploading(&self, older_than: DateTime<Utc>) -> Result<u64, AppError>;

    async fn prune_completed(&self, older_than: DateTime<Utc>) -> Result<u64, AppError>;
}
