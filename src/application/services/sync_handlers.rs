use super::retry_policy::SyncFailure;
use super::sync_service::{HandlerOutcome, SyncOperationHandler};
use crate::application::ports::{ActivityRemote, LocalStore, RemoteSource};
use crate::domain::entities::{Run, SyncEntity, SyncQueueItem};
use crate::domain::value_objects::SyncOperationType;
use crate::infrastructure::http::ApiError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// エンティティの作成・更新・削除をリモートへ送るハンドラ。
///
/// キュー項目の ID を冪等キーとして渡すため、同じ項目の再送は同じキーになる。
pub struct EntitySyncHandler<T>
where
    T: SyncEntity,
{
    local: Arc<dyn LocalStore<T>>,
    remote: Arc<dyn RemoteSource<T>>,
}

impl<T> EntitySyncHandler<T>
where
    T: SyncEntity,
{
    pub fn new(local: Arc<dyn LocalStore<T>>, remote: Arc<dyn RemoteSource<T>>) -> Self {
        Self { local, remote }
    }

    async fn push_delete(&self, item: &SyncQueueItem) -> Result<HandlerOutcome, SyncFailure> {
        let Some(remote_id) = self.local.tombstone(&item.entity_id).await? else {
            debug!(
                target: "sync::service",
                entity_id = %item.entity_id,
                "Entity never reached the server, nothing to delete remotely"
            );
            return Ok(HandlerOutcome::Completed { requeue: false });
        };

        match self.remote.delete(&remote_id).await {
            Ok(()) => {}
            Err(ApiError::NotFound(_)) => {
                debug!(
                    target: "sync::service",
                    entity_id = %item.entity_id,
                    remote_id = %remote_id,
                    "Remote entity already absent"
                );
            }
            Err(err) => return Err(err.into()),
        }

        self.local.clear_tombstone(&item.entity_id).await?;
        Ok(HandlerOutcome::Completed { requeue: false })
    }

    async fn push_upsert(&self, item: &SyncQueueItem) -> Result<HandlerOutcome, SyncFailure> {
        let Some(snapshot) = self.local.get(&item.entity_id).await? else {
            return Ok(HandlerOutcome::Orphaned);
        };

        let key = Some(item.id.as_str());
        let remote = match snapshot.remote_id() {
            Some(remote_id) => self.remote.update(&snapshot, remote_id, key).await?,
            None => self.remote.upload(&snapshot, key).await?,
        };

        // 送信中に削除された場合は、後続の削除操作が宛先を引けるよう墓標を残す
        let Some(mut current) = self.local.get(&item.entity_id).await? else {
            if let Some(remote_id) = remote.remote_id() {
                self.local
                    .record_tombstone(&item.entity_id, remote_id)
                    .await?;
            }
            return Ok(HandlerOutcome::Completed { requeue: false });
        };
        let requeue = current.updated_at() > snapshot.updated_at();
        current.apply_remote(&remote, Utc::now());
        self.local.upsert(&current).await?;

        Ok(HandlerOutcome::Completed { requeue })
    }
}

#[async_trait]
impl<T> SyncOperationHandler for EntitySyncHandler<T>
where
    T: SyncEntity,
{
    fn operations(&self) -> Vec<SyncOperationType> {
        let mut operations = vec![T::KIND.upsert_operation()];
        operations.extend(T::KIND.delete_operation());
        operations
    }

    async fn handle(&self, item: &SyncQueueItem) -> Result<HandlerOutcome, SyncFailure> {
        if item.operation_type.targets_removed_entity() {
            self.push_delete(item).await
        } else {
            self.push_upsert(item).await
        }
    }
}

/// ラン記録のフィード公開と共有解除。
pub struct ActivityShareHandler {
    runs: Arc<dyn LocalStore<Run>>,
    remote: Arc<dyn ActivityRemote>,
}

impl ActivityShareHandler {
    pub fn new(runs: Arc<dyn LocalStore<Run>>, remote: Arc<dyn ActivityRemote>) -> Self {
        Self { runs, remote }
    }
}

#[async_trait]
impl SyncOperationHandler for ActivityShareHandler {
    fn operations(&self) -> Vec<SyncOperationType> {
        vec![
            SyncOperationType::ActivityPublish,
            SyncOperationType::ShareRevoke,
        ]
    }

    async fn handle(&self, item: &SyncQueueItem) -> Result<HandlerOutcome, SyncFailure> {
        if item.operation_type == SyncOperationType::ShareRevoke {
            return match self.remote.revoke_share(&item.entity_id).await {
                Ok(()) | Err(ApiError::NotFound(_)) => {
                    Ok(HandlerOutcome::Completed { requeue: false })
                }
                Err(err) => Err(err.into()),
            };
        }

        let Some(run) = self.runs.get(&item.entity_id).await? else {
            return Ok(HandlerOutcome::Orphaned);
        };
        self.remote
            .publish_activity(&run, Some(item.id.as_str()))
            .await?;
        Ok(HandlerOutcome::Completed { requeue: false })
    }
}
