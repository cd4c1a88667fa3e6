use crate::domain::entities::SyncEntity;
use crate::domain::value_objects::EntityId;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// 端末内の永続ストア。読み取りの唯一の情報源。
///
/// サーバ ID を持つエンティティを削除すると、その ID を墓標として残す。
/// リモート削除はローカル行が消えた後に実行されるため、宛先はこの墓標から引く。
#[async_trait]
pub trait LocalStore<T>: Send + Sync
where
    T: SyncEntity,
{
    async fn get(&self, id: &EntityId) -> Result<Option<T>, AppError>;
    async fn list(&self) -> Result<Vec<T>, AppError>;
    async fn upsert(&self, entity: &T) -> Result<(), AppError>;
    /// 行が存在した場合は true を返す
    async fn delete(&self, id: &EntityId) -> Result<bool, AppError>;
    async fn count(&self) -> Result<u64, AppError>;

    /// 削除済みエンティティのサーバ ID
    async fn tombstone(&self, id: &EntityId) -> Result<Option<String>, AppError>;
    async fn record_tombstone(&self, id: &EntityId, remote_id: &str) -> Result<(), AppError>;
    async fn clear_tombstone(&self, id: &EntityId) -> Result<(), AppError>;
}
