use crate::domain::value_objects::{EntityId, SyncOperationType, SyncQueueId, SyncQueueStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 永続化される送信待ち作業の 1 単位。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncQueueItem {
    pub id: SyncQueueId,
    pub entity_id: EntityId,
    pub operation_type: SyncOperationType,
    pub status: SyncQueueStatus,
    pub retry_count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SyncQueueItem {
    pub fn new(operation_type: SyncOperationType, entity_id: EntityId) -> Self {
        Self {
            id: SyncQueueId::generate(),
            entity_id,
            operation_type,
            status: SyncQueueStatus::Pending,
            retry_count: 0,
            last_attempt: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn mark_uploading(&mut self, at: DateTime<Utc>) {
        self.status = SyncQueueStatus::Uploading;
        self.last_attempt = Some(at);
    }

    pub fn mark_completed(&mut self) {
        self.status = SyncQueueStatus::Completed;
        self.error_message = None;
    }

    /// 失敗を記録し、リトライ回数を 1 増やす
    pub fn record_failure(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        self.status = SyncQueueStatus::Failed;
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_attempt = Some(at);
        self.error_message = Some(message.into());
    }

    /// 自動リトライでは回復できない失敗。上限まで回数を進めて手動対応に回す
    pub fn record_permanent_failure(
        &mut self,
        message: impl Into<String>,
        max_retries: u32,
        at: DateTime<Utc>,
    ) {
        self.status = SyncQueueStatus::Failed;
        self.retry_count = self.retry_count.max(max_retries);
        self.last_attempt = Some(at);
        self.error_message = Some(message.into());
    }

    /// 認証待ちで中断した試行。リトライ回数は消費しない
    pub fn release(&mut self, message: impl Into<String>) {
        self.status = if self.retry_count > 0 {
            SyncQueueStatus::Failed
        } else {
            SyncQueueStatus::Pending
        };
        self.error_message = Some(message.into());
    }
}
