use crate::domain::value_objects::DedupScope;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaRow {
    pub row_id: i64,
    pub natural_key: String,
    pub updated_at: DateTime<Utc>,
}

/// クラウド複製レイヤーが行を書き込むローカルテーブル。
#[async_trait]
pub trait ReplicatedTable: Send + Sync {
    fn name(&self) -> &str;
    fn scope(&self) -> DedupScope;
    async fn replica_rows(&self) -> Result<Vec<ReplicaRow>, AppError>;
    async fn delete_rows(&self, row_ids: &[i64]) -> Result<u64, AppError>;
}
