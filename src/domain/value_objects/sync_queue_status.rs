use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncQueueStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl SyncQueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncQueueStatus::Pending => "pending",
            SyncQueueStatus::Uploading => "uploading",
            SyncQueueStatus::Completed => "completed",
            SyncQueueStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "pending" => Ok(SyncQueueStatus::Pending),
            "uploading" => Ok(SyncQueueStatus::Uploading),
            "completed" => Ok(SyncQueueStatus::Completed),
            "failed" => Ok(SyncQueueStatus::Failed),
            other => Err(format!("Unknown sync queue status: {other}")),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncQueueStatus::Completed)
    }
}

impl fmt::Display for SyncQueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
