use crate::application::ports::local_store::LocalStore;
use crate::application::ports::replicated_table::{ReplicaRow, ReplicatedTable};
use crate::domain::entities::SyncEntity;
use crate::domain::value_objects::{DedupScope, EntityId, EntityKind};
use crate::infrastructure::database::connection_pool::ConnectionPool;
use crate::infrastructure::database::timestamps::{from_millis, to_millis};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::marker::PhantomData;

/// `local_records` テーブルをエンティティ種別ごとに区切って扱うローカルストア。
///
/// 複製レイヤーが同じ業務 ID の行を複数書き込むことがあるため、読み取りは
/// 常に最新の `updated_at` を持つ行を採用する。
pub struct SqliteLocalStore<T> {
    pool: ConnectionPool,
    kind: EntityKind,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SqliteLocalStore<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            kind: self.kind,
            _marker: PhantomData,
        }
    }
}

impl<T> SqliteLocalStore<T>
where
    T: SyncEntity,
{
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            kind: T::KIND,
            _marker: PhantomData,
        }
    }

    fn pool(&self) -> &SqlitePool {
        self.pool.get_pool()
    }

    /// 他端末からの複製行を取り込む。既存行は上書きせず常に新しい行を追加する
    pub async fn ingest_replica(&self, entity: &T) -> Result<i64, AppError> {
        let payload = serde_json::to_string(entity)?;
        let result = sqlx::query(
            r#"
            INSERT INTO local_records (entity_kind, entity_id, payload, updated_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(self.kind.as_str())
        .bind(entity.id().as_str())
        .bind(payload)
        .bind(to_millis(entity.updated_at()))
        .bind(Utc::now().timestamp_millis())
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn write_tombstone(
        conn: &mut SqliteConnection,
        kind: EntityKind,
        id: &EntityId,
        remote_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO local_tombstones (entity_kind, entity_id, remote_id, deleted_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(entity_kind, entity_id)
            DO UPDATE SET remote_id = excluded.remote_id, deleted_at = excluded.deleted_at
            "#,
        )
        .bind(kind.as_str())
        .bind(id.as_str())
        .bind(remote_id)
        .bind(Utc::now().timestamp_millis())
        .execute(conn)
        .await?;
        Ok(())
    }

    fn decode(payload: &str) -> Result<T, AppError> {
        serde_json::from_str(payload).map_err(|err| {
            AppError::DeserializationError(format!(
                "Corrupted {} record: {err}",
                T::KIND.as_str()
            ))
        })
    }
}

#[async_trait]
impl<T> LocalStore<T> for SqliteLocalStore<T>
where
    T: SyncEntity,
{
    async fn get(&self, id: &EntityId) -> Result<Option<T>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT payload FROM local_records
            WHERE entity_kind = ?1 AND entity_id = ?2
            ORDER BY updated_at DESC, row_id DESC
            LIMIT 1
            "#,
        )
        .bind(self.kind.as_str())
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                Ok(Some(Self::decode(&payload)?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<T>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT entity_id, payload FROM local_records
            WHERE entity_kind = ?1
            ORDER BY updated_at DESC, row_id DESC
            "#,
        )
        .bind(self.kind.as_str())
        .fetch_all(self.pool())
        .await?;

        let mut seen = HashSet::new();
        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            let entity_id: String = row.try_get("entity_id")?;
            if !seen.insert(entity_id) {
                continue;
            }
            let payload: String = row.try_get("payload")?;
            entities.push(Self::decode(&payload)?);
        }

        Ok(entities)
    }

    async fn upsert(&self, entity: &T) -> Result<(), AppError> {
        let payload = serde_json::to_string(entity)?;
        let updated_at = to_millis(entity.updated_at());
        let mut tx = self.pool().begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE local_records
            SET payload = ?1, updated_at = ?2
            WHERE row_id = (
                SELECT row_id FROM local_records
                WHERE entity_kind = ?3 AND entity_id = ?4
                ORDER BY updated_at DESC, row_id DESC
                LIMIT 1
            )
            "#,
        )
        .bind(&payload)
        .bind(updated_at)
        .bind(self.kind.as_str())
        .bind(entity.id().as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                r#"
                INSERT INTO local_records (entity_kind, entity_id, payload, updated_at, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(self.kind.as_str())
            .bind(entity.id().as_str())
            .bind(&payload)
            .bind(updated_at)
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &EntityId) -> Result<bool, AppError> {
        let mut tx = self.pool().begin().await?;

        let latest = sqlx::query(
            r#"
            SELECT payload FROM local_records
            WHERE entity_kind = ?1 AND entity_id = ?2
            ORDER BY updated_at DESC, row_id DESC
            LIMIT 1
            "#,
        )
        .bind(self.kind.as_str())
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(latest) = latest else {
            return Ok(false);
        };

        let payload: String = latest.try_get("payload")?;
        let remote_id = Self::decode(&payload)?.remote_id().map(str::to_string);

        sqlx::query("DELETE FROM local_records WHERE entity_kind = ?1 AND entity_id = ?2")
            .bind(self.kind.as_str())
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        if let Some(remote_id) = remote_id {
            Self::write_tombstone(&mut *tx, self.kind, id, &remote_id).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn count(&self) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT entity_id) FROM local_records WHERE entity_kind = ?1",
        )
        .bind(self.kind.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn tombstone(&self, id: &EntityId) -> Result<Option<String>, AppError> {
        let remote_id: Option<(String,)> = sqlx::query_as(
            "SELECT remote_id FROM local_tombstones WHERE entity_kind = ?1 AND entity_id = ?2",
        )
        .bind(self.kind.as_str())
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(remote_id.map(|(remote_id,)| remote_id))
    }

    async fn record_tombstone(&self, id: &EntityId, remote_id: &str) -> Result<(), AppError> {
        let mut conn = self.pool().acquire().await?;
        Self::write_tombstone(&mut *conn, self.kind, id, remote_id).await
    }

    async fn clear_tombstone(&self, id: &EntityId) -> Result<(), AppError> {
        sqlx::query("DELETE FROM local_tombstones WHERE entity_kind = ?1 AND entity_id = ?2")
            .bind(self.kind.as_str())
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<T> ReplicatedTable for SqliteLocalStore<T>
where
    T: SyncEntity,
{
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn scope(&self) -> DedupScope {
        self.kind.dedup_scope()
    }

    async fn replica_rows(&self) -> Result<Vec<ReplicaRow>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT row_id, entity_id, updated_at FROM local_records
            WHERE entity_kind = ?1
            ORDER BY row_id ASC
            "#,
        )
        .bind(self.kind.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ReplicaRow {
                    row_id: row.try_get("row_id")?,
                    natural_key: row.try_get("entity_id")?,
                    updated_at: from_millis(row.try_get("updated_at")?)?,
                })
            })
            .collect()
    }

    async fn delete_rows(&self, row_ids: &[i64]) -> Result<u64, AppError> {
        if row_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool().begin().await?;
        let mut removed = 0u64;
        for row_id in row_ids {
            let result =
                sqlx::query("DELETE FROM local_records WHERE row_id = ?1 AND entity_kind = ?2")
                    .bind(row_id)
                    .bind(self.kind.as_str())
                    .execute(&mut *tx)
                    .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;

        Ok(removed)
    }
}
