use crate::domain::entities::{Run, SyncEntity};
use crate::domain::value_objects::EntityId;
use crate::infrastructure::http::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub cursor: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: u32,
}

#[derive(Debug, Clone)]
pub struct RemotePage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> RemotePage<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
            has_more: false,
        }
    }
}

/// エンティティ単位のリモート API。
///
/// `idempotency_key` を渡した場合は同じ操作のリトライで同じキーが送られる。
#[async_trait]
pub trait RemoteSource<T>: Send + Sync
where
    T: SyncEntity,
{
    async fn upload(&self, entity: &T, idempotency_key: Option<&str>) -> Result<T, ApiError>;
    async fn update(
        &self,
        entity: &T,
        remote_id: &str,
        idempotency_key: Option<&str>,
    ) -> Result<T, ApiError>;
    /// 宛先は `update` と同じくサーバ ID
    async fn delete(&self, remote_id: &str) -> Result<(), ApiError>;
    async fn fetch(&self, request: FetchRequest) -> Result<RemotePage<T>, ApiError>;
}

/// ラン記録をソーシャルフィードへ公開・共有解除する API。
#[async_trait]
pub trait ActivityRemote: Send + Sync {
    async fn publish_activity(
        &self,
        run: &Run,
        idempotency_key: Option<&str>,
    ) -> Result<(), ApiError>;
    async fn revoke_share(&self, run_id: &EntityId) -> Result<(), ApiError>;
}
