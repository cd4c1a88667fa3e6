use crate::application::ports::remote_source::FetchRequest;
use crate::application::ports::{AuthProvider, LocalStore, RemoteSource, SyncQueueStore};
use crate::domain::entities::{Run, SyncEntity};
use crate::domain::value_objects::{
    EntityId, MissingOnDelete, SaveSemantics, SyncOperationType, SyncQueueStatus,
};
use crate::infrastructure::http::ApiError;
use crate::shared::error::AppError;
use chrono::Utc;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// ローカル書き込み後の伝播方法。
#[derive(Clone)]
pub enum SyncMode {
    /// 同期キューに積む。再起動をまたいで再送される
    Durable(Arc<dyn SyncQueueStore>),
    /// 切り離したタスクで直接送信する。失敗やクラッシュ時は失われる
    BestEffort,
    LocalOnly,
}

impl std::fmt::Debug for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Durable(_) => f.write_str("Durable"),
            SyncMode::BestEffort => f.write_str("BestEffort"),
            SyncMode::LocalOnly => f.write_str("LocalOnly"),
        }
    }
}

/// リポジトリ生存期間中に 1 度だけ行うリモート復元の状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    NotAttempted,
    Restored { count: usize },
    Failed,
}

/// ローカルストアを唯一の読み取り元とし、書き込みをリモートへ伝播するリポジトリ。
pub struct SyncedRepository<T>
where
    T: SyncEntity,
{
    local: Arc<dyn LocalStore<T>>,
    remote: Option<Arc<dyn RemoteSource<T>>>,
    auth: Arc<dyn AuthProvider>,
    mode: SyncMode,
    restore_page_size: u32,
    restore: Mutex<RestoreState>,
    background: StdMutex<Vec<JoinHandle<()>>>,
}

impl<T> SyncedRepository<T>
where
    T: SyncEntity,
{
    pub fn new(local: Arc<dyn LocalStore<T>>, auth: Arc<dyn AuthProvider>, mode: SyncMode) -> Self {
        Self {
            local,
            remote: None,
            auth,
            mode,
            restore_page_size: 100,
            restore: Mutex::new(RestoreState::NotAttempted),
            background: StdMutex::new(Vec::new()),
        }
    }

    /// 復元とベストエフォート送信に使うリモート
    pub fn with_remote(mut self, remote: Arc<dyn RemoteSource<T>>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_restore_page_size(mut self, page_size: u32) -> Self {
        self.restore_page_size = page_size.max(1);
        self
    }

    pub fn mode(&self) -> &SyncMode {
        &self.mode
    }

    pub async fn list(&self) -> Result<Vec<T>, AppError> {
        let entities = self.local.list().await?;
        if !entities.is_empty() {
            return Ok(entities);
        }
        if self.restore_once().await > 0 {
            return self.local.list().await;
        }
        Ok(entities)
    }

    pub async fn get(&self, id: &EntityId) -> Result<Option<T>, AppError> {
        if let Some(entity) = self.local.get(id).await? {
            return Ok(Some(entity));
        }
        if self.restore_once().await > 0 {
            return self.local.get(id).await;
        }
        Ok(None)
    }

    /// ローカルに保存して返す。リモートへの伝播はこの呼び出しの結果に影響しない
    pub async fn save(&self, mut entity: T) -> Result<T, AppError> {
        entity.validate().map_err(AppError::ValidationError)?;
        entity.touch(Utc::now());

        self.local.upsert(&entity).await?;
        if T::KIND.save_semantics() == SaveSemantics::ReplaceAll {
            self.remove_others(entity.id()).await?;
        }

        self.propagate_upsert(&entity).await;
        Ok(entity)
    }

    /// 既存エンティティの更新。存在しない ID は `NotFound`
    pub async fn update(&self, mut entity: T) -> Result<T, AppError> {
        let Some(existing) = self.local.get(entity.id()).await? else {
            return Err(AppError::not_found(T::KIND, entity.id()));
        };
        entity.validate().map_err(AppError::ValidationError)?;
        if entity.remote_id().is_none() {
            *entity.sync_metadata_mut() = existing.sync_metadata().clone();
        }
        entity.touch(Utc::now());

        self.local.upsert(&entity).await?;
        self.propagate_upsert(&entity).await;
        Ok(entity)
    }

    pub async fn delete(&self, id: &EntityId) -> Result<(), AppError> {
        if !self.local.delete(id).await? {
            return match T::KIND.missing_on_delete() {
                MissingOnDelete::Ignore => Ok(()),
                MissingOnDelete::NotFound => Err(AppError::not_found(T::KIND, id)),
            };
        }

        if let Some(operation) = T::KIND.delete_operation() {
            self.propagate_delete(operation, id).await;
        }
        Ok(())
    }

    /// 同期キュー上の状態。キューを使わないモードでは常に None
    pub async fn sync_status(&self, id: &EntityId) -> Result<Option<SyncQueueStatus>, AppError> {
        match &self.mode {
            SyncMode::Durable(queue) => queue.status_for_entity(id).await,
            SyncMode::BestEffort | SyncMode::LocalOnly => Ok(None),
        }
    }

    pub async fn restore_state(&self) -> RestoreState {
        *self.restore.lock().await
    }

    pub async fn reset_restore_state(&self) {
        *self.restore.lock().await = RestoreState::NotAttempted;
    }

    /// ベストエフォートで切り離したタスクの完了を待つ
    pub async fn flush_background(&self) {
        let handles = {
            let mut background = self
                .background
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *background)
        };
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(target: "sync::repository", error = %err, "Background sync task aborted");
            }
        }
    }

    async fn remove_others(&self, keep: &EntityId) -> Result<(), AppError> {
        for other in self.local.list().await? {
            if other.id() != keep {
                debug!(
                    target: "sync::repository",
                    kind = %T::KIND,
                    entity_id = %other.id(),
                    "Replacing previous entity"
                );
                self.local.delete(other.id()).await?;
                // サーバ側は次の保存で上書きされるので宛先は不要
                self.local.clear_tombstone(other.id()).await?;
            }
        }
        Ok(())
    }

    /// 復元を試み、取り込んだ件数を返す。失敗してもローカルの結果で続行する
    async fn restore_once(&self) -> usize {
        let Some(remote) = self.remote.clone() else {
            return 0;
        };
        if !self.auth.is_authenticated() {
            return 0;
        }

        let mut state = self.restore.lock().await;
        if *state != RestoreState::NotAttempted {
            return 0;
        }

        // 復元は空のストアだけが対象。ローカルに何かあれば未試行のまま残す
        match self.local.count().await {
            Ok(0) => {}
            Ok(_) => return 0,
            Err(err) => {
                warn!(
                    target: "sync::repository",
                    kind = %T::KIND,
                    error = %err,
                    "Failed to count local entities, skipping restore"
                );
                return 0;
            }
        }

        match self.restore_from(remote.as_ref()).await {
            Ok(count) => {
                info!(target: "sync::repository", kind = %T::KIND, count, "Restored from remote");
                *state = RestoreState::Restored { count };
                count
            }
            Err(err) => {
                warn!(
                    target: "sync::repository",
                    kind = %T::KIND,
                    error = %err,
                    "Remote restore failed, serving local data"
                );
                *state = RestoreState::Failed;
                0
            }
        }
    }

    async fn restore_from(&self, remote: &dyn RemoteSource<T>) -> Result<usize, AppError> {
        let mut cursor: Option<String> = None;
        let mut count = 0usize;

        loop {
            let page = remote
                .fetch(FetchRequest {
                    cursor: cursor.clone(),
                    since: None,
                    limit: self.restore_page_size,
                })
                .await?;

            for entity in &page.items {
                // ローカルの版が常に優先
                if self.local.get(entity.id()).await?.is_some() {
                    continue;
                }
                self.local.upsert(entity).await?;
                count += 1;
            }

            match page.next_cursor {
                Some(next) if page.has_more && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        Ok(count)
    }

    async fn propagate_upsert(&self, entity: &T) {
        match &self.mode {
            SyncMode::Durable(queue) => {
                self.enqueue(queue.as_ref(), T::KIND.upsert_operation(), entity.id())
                    .await;
            }
            SyncMode::BestEffort => {
                let Some(remote) = self.remote_for_background() else {
                    return;
                };
                let local = Arc::clone(&self.local);
                let entity = entity.clone();
                self.detach(async move {
                    let result = match entity.remote_id() {
                        Some(remote_id) => remote.update(&entity, remote_id, None).await,
                        None => remote.upload(&entity, None).await,
                    };
                    match result {
                        Ok(uploaded) => {
                            if let Err(err) = apply_remote_metadata(local.as_ref(), &entity, &uploaded).await {
                                warn!(
                                    target: "sync::repository",
                                    entity_id = %entity.id(),
                                    error = %err,
                                    "Failed to store server metadata"
                                );
                            }
                        }
                        Err(err) => warn!(
                            target: "sync::repository",
                            kind = %T::KIND,
                            entity_id = %entity.id(),
                            error = %err,
                            "Best-effort upload failed"
                        ),
                    }
                });
            }
            SyncMode::LocalOnly => {}
        }
    }

    async fn propagate_delete(&self, operation: SyncOperationType, id: &EntityId) {
        match &self.mode {
            SyncMode::Durable(queue) => self.enqueue(queue.as_ref(), operation, id).await,
            SyncMode::BestEffort => {
                let Some(remote) = self.remote_for_background() else {
                    return;
                };
                let remote_id = match self.local.tombstone(id).await {
                    Ok(Some(remote_id)) => remote_id,
                    Ok(None) => {
                        debug!(
                            target: "sync::repository",
                            entity_id = %id,
                            "Entity never reached the server, skipping remote delete"
                        );
                        return;
                    }
                    Err(err) => {
                        warn!(
                            target: "sync::repository",
                            entity_id = %id,
                            error = %err,
                            "Failed to read tombstone"
                        );
                        return;
                    }
                };
                let local = Arc::clone(&self.local);
                let id = id.clone();
                self.detach(async move {
                    let result = match remote.delete(&remote_id).await {
                        Ok(()) | Err(ApiError::NotFound(_)) => {
                            local.clear_tombstone(&id).await.map_err(|err| err.to_string())
                        }
                        Err(err) => Err(err.to_string()),
                    };
                    if let Err(err) = result {
                        warn!(
                            target: "sync::repository",
                            kind = %T::KIND,
                            entity_id = %id,
                            remote_id = %remote_id,
                            error = %err,
                            "Best-effort delete failed"
                        );
                    }
                });
            }
            SyncMode::LocalOnly => {}
        }
    }

    async fn enqueue(&self, queue: &dyn SyncQueueStore, operation: SyncOperationType, id: &EntityId) {
        // ローカル書き込みは完了済みなので、キュー側の失敗は呼び出し元へ返さない
        match queue.enqueue(operation, id).await {
            Ok(item) => debug!(
                target: "sync::repository",
                operation = %operation,
                entity_id = %id,
                item_id = %item.id,
                "Queued sync operation"
            ),
            Err(err) => error!(
                target: "sync::repository",
                operation = %operation,
                entity_id = %id,
                error = %err,
                "Failed to queue sync operation"
            ),
        }
    }

    fn remote_for_background(&self) -> Option<Arc<dyn RemoteSource<T>>> {
        if !self.auth.is_authenticated() {
            debug!(target: "sync::repository", "Not authenticated, skipping best-effort sync");
            return None;
        }
        if self.remote.is_none() {
            warn!(target: "sync::repository", kind = %T::KIND, "Best-effort mode without a remote");
        }
        self.remote.clone()
    }

    fn detach<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut background = self
            .background
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        background.retain(|handle| !handle.is_finished());
        background.push(handle);
    }
}

impl SyncedRepository<Run> {
    /// ラン記録をフィードに公開する。キュー経由でのみ送信する
    pub async fn publish_activity(&self, id: &EntityId) -> Result<(), AppError> {
        self.queue_social(SyncOperationType::ActivityPublish, id, true)
            .await
    }

    pub async fn revoke_share(&self, id: &EntityId) -> Result<(), AppError> {
        self.queue_social(SyncOperationType::ShareRevoke, id, false)
            .await
    }

    async fn queue_social(
        &self,
        operation: SyncOperationType,
        id: &EntityId,
        requires_local: bool,
    ) -> Result<(), AppError> {
        let SyncMode::Durable(queue) = &self.mode else {
            return Err(AppError::ConfigurationError(
                "Activity sharing requires a sync queue".to_string(),
            ));
        };
        if requires_local && self.local.get(id).await?.is_none() {
            return Err(AppError::not_found(Run::KIND, id));
        }
        if operation == SyncOperationType::ShareRevoke {
            queue
                .cancel(id, SyncOperationType::ActivityPublish)
                .await?;
        }
        self.enqueue(queue.as_ref(), operation, id).await;
        Ok(())
    }
}

async fn apply_remote_metadata<T: SyncEntity>(
    local: &dyn LocalStore<T>,
    uploaded_from: &T,
    remote: &T,
) -> Result<(), AppError> {
    let Some(mut current) = local.get(uploaded_from.id()).await? else {
        if let Some(remote_id) = remote.remote_id() {
            local.record_tombstone(uploaded_from.id(), remote_id).await?;
        }
        return Ok(());
    };
    current.apply_remote(remote, Utc::now());
    local.upsert(&current).await
}
