use super::retry_policy::{FailureDisposition, RetryPolicy, SyncFailure};
use crate::application::ports::{AuthProvider, SyncQueueStore};
use crate::domain::entities::SyncQueueItem;
use crate::domain::value_objects::{EntityId, SyncOperationType, SyncQueueStatus};
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// キュー項目 1 件を処理した結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// 送信に成功。送信中にローカルが更新されていれば `requeue` が立つ
    Completed { requeue: bool },
    /// 参照先のローカルエンティティが既に存在しない
    Orphaned,
}

/// 操作種別ごとにリモート呼び出しを実行するハンドラ。
#[async_trait]
pub trait SyncOperationHandler: Send + Sync {
    fn operations(&self) -> Vec<SyncOperationType>;

    async fn handle(&self, item: &SyncQueueItem) -> Result<HandlerOutcome, SyncFailure>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub already_running: bool,
    pub skipped_unauthenticated: bool,
    pub paused_for_auth: bool,
    pub reset: u64,
    pub demoted: u64,
    pub attempted: u32,
    pub completed: u32,
    pub requeued: u32,
    pub orphaned: u32,
    pub failed: u32,
    pub permanently_failed: u32,
    pub deferred: u32,
    pub exhausted: u32,
    pub pruned: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatusSnapshot {
    pub is_syncing: bool,
    pub pending: u64,
    pub failed: u64,
    pub last_sync: Option<i64>,
    pub sync_errors: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct DrainOptions {
    pub stale_uploading_after: Duration,
    pub retain_completed: bool,
    pub completed_ttl: Duration,
}

impl Default for DrainOptions {
    fn default() -> Self {
        Self {
            stale_uploading_after: Duration::minutes(5),
            retain_completed: false,
            completed_ttl: Duration::hours(24),
        }
    }
}

impl From<&SyncConfig> for DrainOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            stale_uploading_after: Duration::seconds(
                config.stale_uploading_secs.min(i32::MAX as u64) as i64,
            ),
            retain_completed: config.retain_completed,
            completed_ttl: Duration::hours(config.completed_ttl_hours.min(i32::MAX as u64) as i64),
        }
    }
}

#[derive(Debug, Default)]
struct SyncHistory {
    last_sync: Option<DateTime<Utc>>,
    sync_errors: u32,
}

enum ItemFlow {
    Continue,
    Stop,
}

/// 同期キューを FIFO で排出するキュープロセッサ。
///
/// `process_queue` は同時に 1 回だけ走る。実行中に呼ばれた場合は何もせず
/// `already_running` を立てたレポートを返す。
pub struct SyncService {
    queue: Arc<dyn SyncQueueStore>,
    auth: Arc<dyn AuthProvider>,
    handlers: HashMap<SyncOperationType, Arc<dyn SyncOperationHandler>>,
    policy: RetryPolicy,
    options: DrainOptions,
    drain_gate: Mutex<()>,
    history: RwLock<SyncHistory>,
}

impl SyncService {
    pub fn new(queue: Arc<dyn SyncQueueStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            queue,
            auth,
            handlers: HashMap::new(),
            policy: RetryPolicy::default(),
            options: DrainOptions::default(),
            drain_gate: Mutex::new(()),
            history: RwLock::new(SyncHistory::default()),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: DrainOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn SyncOperationHandler>) -> Self {
        for operation in handler.operations() {
            self.handlers.insert(operation, Arc::clone(&handler));
        }
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn process_queue(&self) -> Result<DrainReport, AppError> {
        let Ok(_guard) = self.drain_gate.try_lock() else {
            debug!(target: "sync::service", "Drain already running");
            return Ok(DrainReport {
                already_running: true,
                ..DrainReport::default()
            });
        };

        self.drain().await
    }

    /// failed の項目をすべて pending に戻してから排出する
    pub async fn retry_failed(&self) -> Result<DrainReport, AppError> {
        let Ok(_guard) = self.drain_gate.try_lock() else {
            return Ok(DrainReport {
                already_running: true,
                ..DrainReport::default()
            });
        };

        let reset = self.queue.reset_failed().await?;
        info!(target: "sync::service", reset, "Manual retry requested");
        let mut report = self.drain().await?;
        report.reset = reset;
        Ok(report)
    }

    async fn drain(&self) -> Result<DrainReport, AppError> {
        let mut report = DrainReport::default();

        if !self.auth.is_authenticated() {
            debug!(target: "sync::service", "Not authenticated, skipping drain");
            report.skipped_unauthenticated = true;
            return Ok(report);
        }

        let now = Utc::now();
        report.demoted = self
            .queue
            .demote_stale_uploading(now - self.options.stale_uploading_after)
            .await?;

        let items = self.queue.pending_items().await?;
        debug!(target: "sync::service", count = items.len(), "Draining sync queue");

        for item in items {
            if self.policy.is_exhausted(&item) {
                report.exhausted += 1;
                continue;
            }
            if self.policy.should_defer(&item, now) {
                report.deferred += 1;
                continue;
            }

            report.attempted += 1;
            if let ItemFlow::Stop = self.process_item(item, &mut report).await? {
                break;
            }
        }

        if self.options.retain_completed && !report.paused_for_auth {
            report.pruned = self
                .queue
                .prune_completed(now - self.options.completed_ttl)
                .await?;
        }

        {
            let mut history = self.history.write().await;
            history.last_sync = Some(Utc::now());
            history.sync_errors = history
                .sync_errors
                .saturating_add(report.failed + report.permanently_failed);
        }

        info!(
            target: "sync::service",
            attempted = report.attempted,
            completed = report.completed,
            failed = report.failed,
            permanently_failed = report.permanently_failed,
            orphaned = report.orphaned,
            deferred = report.deferred,
            "Drain finished"
        );
        Ok(report)
    }

    async fn process_item(
        &self,
        mut item: SyncQueueItem,
        report: &mut DrainReport,
    ) -> Result<ItemFlow, AppError> {
        let Some(handler) = self.handlers.get(&item.operation_type).cloned() else {
            error!(
                target: "sync::service",
                operation = %item.operation_type,
                item_id = %item.id,
                "No handler registered for operation"
            );
            item.record_permanent_failure(
                format!("No handler registered for {}", item.operation_type),
                self.policy.max_retries,
                Utc::now(),
            );
            self.queue.update(&item).await?;
            report.permanently_failed += 1;
            return Ok(ItemFlow::Continue);
        };

        item.mark_uploading(Utc::now());
        self.queue.update(&item).await?;

        match handler.handle(&item).await {
            Ok(HandlerOutcome::Orphaned) => {
                info!(
                    target: "sync::service",
                    operation = %item.operation_type,
                    entity_id = %item.entity_id,
                    "Removing orphaned queue item"
                );
                self.queue.delete(&item.id).await?;
                report.orphaned += 1;
            }
            Ok(HandlerOutcome::Completed { requeue }) => {
                self.complete(&mut item).await?;
                report.completed += 1;
                if requeue {
                    debug!(
                        target: "sync::service",
                        entity_id = %item.entity_id,
                        "Entity changed during upload, queueing again"
                    );
                    self.queue
                        .enqueue(item.operation_type, &item.entity_id)
                        .await?;
                    report.requeued += 1;
                }
            }
            Err(failure) => {
                let message = failure.to_string();
                match failure.disposition() {
                    FailureDisposition::Retry => {
                        item.record_failure(message, Utc::now());
                        warn!(
                            target: "sync::service",
                            operation = %item.operation_type,
                            entity_id = %item.entity_id,
                            retry_count = item.retry_count,
                            error = %failure,
                            "Sync attempt failed"
                        );
                        self.queue.update(&item).await?;
                        report.failed += 1;
                    }
                    FailureDisposition::Permanent => {
                        item.record_permanent_failure(
                            message,
                            self.policy.max_retries,
                            Utc::now(),
                        );
                        error!(
                            target: "sync::service",
                            operation = %item.operation_type,
                            entity_id = %item.entity_id,
                            error = %failure,
                            "Sync failed permanently"
                        );
                        self.queue.update(&item).await?;
                        report.permanently_failed += 1;
                    }
                    FailureDisposition::PauseForAuth => {
                        item.release(message);
                        warn!(
                            target: "sync::service",
                            "Remote rejected credentials, pausing sync until re-authentication"
                        );
                        self.queue.update(&item).await?;
                        report.paused_for_auth = true;
                        return Ok(ItemFlow::Stop);
                    }
                }
            }
        }

        Ok(ItemFlow::Continue)
    }

    async fn complete(&self, item: &mut SyncQueueItem) -> Result<(), AppError> {
        if self.options.retain_completed {
            item.mark_completed();
            self.queue.update(item).await
        } else {
            self.queue.delete(&item.id).await
        }
    }

    pub async fn pending_count(&self) -> Result<u64, AppError> {
        self.queue.pending_count().await
    }

    pub async fn failed_count(&self) -> Result<u64, AppError> {
        self.queue.failed_count().await
    }

    pub async fn failed_items(&self) -> Result<Vec<SyncQueueItem>, AppError> {
        self.queue.failed_items().await
    }

    pub async fn status_for_entity(
        &self,
        entity_id: &EntityId,
    ) -> Result<Option<SyncQueueStatus>, AppError> {
        self.queue.status_for_entity(entity_id).await
    }

    pub async fn cancel(
        &self,
        entity_id: &EntityId,
        operation_type: SyncOperationType,
    ) -> Result<u64, AppError> {
        let removed = self.queue.cancel(entity_id, operation_type).await?;
        if removed > 0 {
            info!(
                target: "sync::service",
                entity_id = %entity_id,
                operation = %operation_type,
                "Cancelled queued operation"
            );
        }
        Ok(removed)
    }

    pub fn is_syncing(&self) -> bool {
        self.drain_gate.try_lock().is_err()
    }

    pub async fn status(&self) -> Result<SyncStatusSnapshot, AppError> {
        let pending = self.queue.pending_count().await?;
        let failed = self.queue.failed_count().await?;
        let history = self.history.read().await;
        Ok(SyncStatusSnapshot {
            is_syncing: self.is_syncing(),
            pending,
            failed,
            last_sync: history.last_sync.map(|at| at.timestamp()),
            sync_errors: history.sync_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http::ApiError;
    use mockall::mock;
    use std::sync::atomic::{AtomicBool, Ordering};

    mock! {
        pub Handler {}

        #[async_trait]
        impl SyncOperationHandler for Handler {
            fn operations(&self) -> Vec<SyncOperationType>;
            async fn handle(&self, item: &SyncQueueItem) -> Result<HandlerOutcome, SyncFailure>;
        }
    }

    mock! {
        pub Queue {}

        #[async_trait]
        impl SyncQueueStore for Queue {
            async fn enqueue(&self, operation_type: SyncOperationType, entity_id: &EntityId) -> Result<SyncQueueItem, AppError>;
            async fn pending_items(&self) -> Result<Vec<SyncQueueItem>, AppError>;
            async fn failed_items(&self) -> Result<Vec<SyncQueueItem>, AppError>;
            async fn pending_count(&self) -> Result<u64, AppError>;
            async fn failed_count(&self) -> Result<u64, AppError>;
            async fn get(&self, id: &crate::domain::value_objects::SyncQueueId) -> Result<Option<SyncQueueItem>, AppError>;
            async fn update(&self, item: &SyncQueueItem) -> Result<(), AppError>;
            async fn delete(&self, id: &crate::domain::value_objects::SyncQueueId) -> Result<(), AppError>;
            async fn status_for_entity(&self, entity_id: &EntityId) -> Result<Option<SyncQueueStatus>, AppError>;
            async fn cancel(&self, entity_id: &EntityId, operation_type: SyncOperationType) -> Result<u64, AppError>;
            async fn reset_failed(&self) -> Result<u64, AppError>;
            async fn demote_stale_uploading(&self, older_than: DateTime<Utc>) -> Result<u64, AppError>;
            async fn prune_completed(&self, older_than: DateTime<Utc>) -> Result<u64, AppError>;
        }
    }

    struct StaticAuth(AtomicBool);

    impl AuthProvider for StaticAuth {
        fn is_authenticated(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn auth(authenticated: bool) -> Arc<dyn AuthProvider> {
        Arc::new(StaticAuth(AtomicBool::new(authenticated)))
    }

    fn pending(op: SyncOperationType, id: &str) -> SyncQueueItem {
        SyncQueueItem::new(op, EntityId::new(id.into()).unwrap())
    }

    fn handler_for(
        op: SyncOperationType,
        outcome: fn() -> Result<HandlerOutcome, SyncFailure>,
    ) -> Arc<dyn SyncOperationHandler> {
        let mut handler = MockHandler::new();
        handler.expect_operations().return_const(vec![op]);
        handler.expect_handle().returning(move |_| outcome());
        Arc::new(handler)
    }

    #[tokio::test]
    async fn unauthenticated_drain_touches_nothing() {
        let queue = MockQueue::new();
        let mut handler = MockHandler::new();
        handler
            .expect_operations()
            .return_const(vec![SyncOperationType::RunUpload]);
        handler.expect_handle().never();

        let service = SyncService::new(Arc::new(queue), auth(false)).with_handler(Arc::new(handler));
        let report = service.process_queue().await.unwrap();
        assert!(report.skipped_unauthenticated);
        assert_eq!(report.attempted, 0);
    }

    #[tokio::test]
    async fn conflict_is_recorded_as_permanent_failure() {
        let mut queue = MockQueue::new();
        queue.expect_demote_stale_uploading().returning(|_| Ok(0));
        queue
            .expect_pending_items()
            .returning(|| Ok(vec![pending(SyncOperationType::RaceSync, "race-1")]));
        queue
            .expect_update()
            .withf(|item| item.status == SyncQueueStatus::Uploading)
            .times(1)
            .returning(|_| Ok(()));
        queue
            .expect_update()
            .withf(|item| item.status == SyncQueueStatus::Failed && item.retry_count == 5)
            .times(1)
            .returning(|_| Ok(()));

        let service = SyncService::new(Arc::new(queue), auth(true)).with_handler(handler_for(
            SyncOperationType::RaceSync,
            || Err(SyncFailure::Remote(ApiError::Conflict("diverged".into()))),
        ));

        let report = service.process_queue().await.unwrap();
        assert_eq!(report.permanently_failed, 1);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn unauthorized_response_pauses_the_pass() {
        let mut queue = MockQueue::new();
        queue.expect_demote_stale_uploading().returning(|_| Ok(0));
        queue.expect_pending_items().returning(|| {
            Ok(vec![
                pending(SyncOperationType::RunUpload, "run-1"),
                pending(SyncOperationType::RunUpload, "run-2"),
            ])
        });
        queue
            .expect_update()
            .withf(|item| item.status == SyncQueueStatus::Uploading)
            .times(1)
            .returning(|_| Ok(()));
        queue
            .expect_update()
            .withf(|item| item.status == SyncQueueStatus::Pending && item.retry_count == 0)
            .times(1)
            .returning(|_| Ok(()));

        let service = SyncService::new(Arc::new(queue), auth(true)).with_handler(handler_for(
            SyncOperationType::RunUpload,
            || Err(SyncFailure::Remote(ApiError::Unauthorized)),
        ));

        let report = service.process_queue().await.unwrap();
        assert!(report.paused_for_auth);
        assert_eq!(report.attempted, 1);
    }

    #[tokio::test]
    async fn missing_handler_is_a_permanent_failure() {
        let mut queue = MockQueue::new();
        queue.expect_demote_stale_uploading().returning(|_| Ok(0));
        queue
            .expect_pending_items()
            .returning(|| Ok(vec![pending(SyncOperationType::ShareRevoke, "run-1")]));
        queue
            .expect_update()
            .withf(|item| item.status == SyncQueueStatus::Failed)
            .times(1)
            .returning(|_| Ok(()));

        let service = SyncService::new(Arc::new(queue), auth(true));
        let report = service.process_queue().await.unwrap();
        assert_eq!(report.permanently_failed, 1);
    }

    #[tokio::test]
    async fn requeues_when_entity_changed_during_upload() {
        let mut queue = MockQueue::new();
        queue.expect_demote_stale_uploading().returning(|_| Ok(0));
        queue
            .expect_pending_items()
            .returning(|| Ok(vec![pending(SyncOperationType::RunUpload, "run-1")]));
        queue.expect_update().returning(|_| Ok(()));
        queue.expect_delete().times(1).returning(|_| Ok(()));
        queue
            .expect_enqueue()
            .withf(|op, id| *op == SyncOperationType::RunUpload && id.as_str() == "run-1")
            .times(1)
            .returning(|op, id| Ok(SyncQueueItem::new(op, id.clone())));

        let service = SyncService::new(Arc::new(queue), auth(true)).with_handler(handler_for(
            SyncOperationType::RunUpload,
            || Ok(HandlerOutcome::Completed { requeue: true }),
        ));

        let report = service.process_queue().await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.requeued, 1);
    }

    #[tokio::test]
    async fn status_reports_counts() {
        let mut queue = MockQueue::new();
        queue.expect_pending_count().returning(|| Ok(3));
        queue.expect_failed_count().returning(|| Ok(1));

        let service = SyncService::new(Arc::new(queue), auth(true));
        let status = service.status().await.unwrap();
        assert_eq!(status.pending, 3);
        assert_eq!(status.failed, 1);
        assert!(!status.is_syncing);
        assert!(status.last_sync.is_none());
    }
}
