use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct SyncQueueRow {
    pub id: String,
    pub entity_id: String,
    pub operation_type: String,
    pub status: String,
    pub retry_count: i64,
    pub last_attempt: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
