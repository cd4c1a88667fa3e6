use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 同期キュー行の主キー。リトライ時の Idempotency-Key としても再利用する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncQueueId(String);

impl SyncQueueId {
    pub fn new(value: String) -> Result<Self, String> {
        if value.trim().is_empty() {
            return Err("Sync queue id cannot be empty".to_string());
        }
        Ok(Self(value))
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncQueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SyncQueueId> for String {
    fn from(id: SyncQueueId) -> Self {
        id.0
    }
}
