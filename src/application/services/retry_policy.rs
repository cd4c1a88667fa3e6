use crate::domain::entities::SyncQueueItem;
use crate::domain::value_objects::SyncQueueStatus;
use crate::infrastructure::http::ApiError;
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use chrono::{DateTime, Duration, Utc};

/// 失敗した同期操作をどう扱うか。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// バックオフ後に再試行
    Retry,
    /// 再試行では回復しない。手動対応に回す
    Permanent,
    /// 再認証まで同期を止める
    PauseForAuth,
}

impl FailureDisposition {
    pub fn for_api_error(error: &ApiError) -> Self {
        match error {
            ApiError::Unauthorized => FailureDisposition::PauseForAuth,
            ApiError::NotFound(_) | ApiError::Conflict(_) | ApiError::InvalidRequest(_) => {
                FailureDisposition::Permanent
            }
            ApiError::Client { status, .. } if matches!(status, 408 | 429) => {
                FailureDisposition::Retry
            }
            ApiError::Client { .. } => FailureDisposition::Permanent,
            ApiError::Server { .. } | ApiError::Transport(_) | ApiError::Decode(_) => {
                FailureDisposition::Retry
            }
        }
    }
}

/// 同期処理中に起きた失敗。リモート由来かローカル由来かで分類方法が変わる。
#[derive(Debug)]
pub enum SyncFailure {
    Remote(ApiError),
    Local(AppError),
}

impl SyncFailure {
    pub fn disposition(&self) -> FailureDisposition {
        match self {
            SyncFailure::Remote(err) => FailureDisposition::for_api_error(err),
            SyncFailure::Local(_) => FailureDisposition::Retry,
        }
    }
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncFailure::Remote(err) => write!(f, "{err}"),
            SyncFailure::Local(err) => write!(f, "{err}"),
        }
    }
}

impl From<ApiError> for SyncFailure {
    fn from(err: ApiError) -> Self {
        SyncFailure::Remote(err)
    }
}

impl From<AppError> for SyncFailure {
    fn from(err: AppError) -> Self {
        SyncFailure::Local(err)
    }
}

/// 指数バックオフ（上限付き）。すべてのキュー操作に同じ方針を適用する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::seconds(30),
            max_delay: Duration::minutes(30),
        }
    }
}

const BACKOFF_CEILING_SECS: u64 = 7 * 24 * 60 * 60;

fn clamp_secs(secs: u64) -> Duration {
    Duration::seconds(secs.min(BACKOFF_CEILING_SECS) as i64)
}

impl From<&SyncConfig> for RetryPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: clamp_secs(config.base_backoff_secs),
            max_delay: clamp_secs(config.max_backoff_secs),
        }
    }
}

impl RetryPolicy {
    /// `retry_count` 回失敗した後、次の試行までに空ける時間
    pub fn backoff(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::zero();
        }
        let exponent = (retry_count - 1).min(20);
        let factor = 1i32 << exponent;
        let delay = self.base_delay.checked_mul(factor).unwrap_or(self.max_delay);
        delay.min(self.max_delay)
    }

    pub fn is_exhausted(&self, item: &SyncQueueItem) -> bool {
        item.retry_count >= self.max_retries
    }

    /// failed の項目がバックオフ期間中で、今回は見送るべきか
    pub fn should_defer(&self, item: &SyncQueueItem, now: DateTime<Utc>) -> bool {
        if item.status != SyncQueueStatus::Failed || item.retry_count == 0 {
            return false;
        }
        match item.last_attempt {
            Some(last_attempt) => now - last_attempt < self.backoff(item.retry_count),
            None => false,
        }
    }
}
