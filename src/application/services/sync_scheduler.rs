use super::dedup_service::CrossDeviceDeduplicationService;
use super::network_monitor::NetworkMonitor;
use super::sync_service::{DrainReport, SyncService};
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 同期キューの排出を起動するトリガー群（接続復帰・定期実行・フォアグラウンド復帰）。
pub struct SyncScheduler {
    sync: Arc<SyncService>,
    monitor: Arc<NetworkMonitor>,
    dedup: Option<Arc<CrossDeviceDeduplicationService>>,
    interval: Option<Duration>,
    foreground: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncScheduler {
    pub fn new(sync: Arc<SyncService>, monitor: Arc<NetworkMonitor>) -> Self {
        Self {
            sync,
            monitor,
            dedup: None,
            interval: None,
            foreground: Arc::new(Notify::new()),
            tasks: Vec::new(),
        }
    }

    pub fn with_dedup(mut self, dedup: Arc<CrossDeviceDeduplicationService>) -> Self {
        self.dedup = Some(dedup);
        self
    }

    /// 定期実行の間隔。未設定なら定期実行しない
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let mut restored = self.monitor.subscribe_restored();
        let sync = Arc::clone(&self.sync);
        let dedup = self.dedup.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                match restored.recv().await {
                    Ok(event) => {
                        info!(target: "sync::service", at = %event.at, "Connectivity restored");
                        run_pass(&sync, dedup.as_deref(), "connectivity_restored").await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(target: "sync::service", skipped, "Restored events lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));

        let foreground = Arc::clone(&self.foreground);
        let sync = Arc::clone(&self.sync);
        let dedup = self.dedup.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                foreground.notified().await;
                run_pass(&sync, dedup.as_deref(), "foreground").await;
            }
        }));

        if let Some(period) = self.interval {
            let sync = Arc::clone(&self.sync);
            let dedup = self.dedup.clone();
            let monitor = Arc::clone(&self.monitor);
            self.tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    if monitor.is_offline() {
                        debug!(target: "sync::service", "Offline, skipping periodic drain");
                        continue;
                    }
                    run_pass(&sync, dedup.as_deref(), "interval").await;
                }
            }));
        }

        info!(target: "sync::service", tasks = self.tasks.len(), "Sync scheduler started");
    }

    /// アプリがフォアグラウンドに戻ったことを通知する
    pub fn notify_foreground(&self) {
        self.foreground.notify_one();
    }

    /// 保留中の項目を即時に 1 回排出する。上限に達した失敗項目は対象外
    pub async fn trigger_now(&self) {
        run_pass(&self.sync, self.dedup.as_deref(), "manual").await;
    }

    /// ユーザー操作による「今すぐ再試行」。失敗項目の再試行回数を戻してから排出する
    pub async fn retry_failed_now(&self) {
        finish_pass(self.sync.retry_failed().await, self.dedup.as_deref(), "manual_retry").await;
    }

    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!(target: "sync::service", "Sync scheduler stopped");
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn run_pass(
    sync: &SyncService,
    dedup: Option<&CrossDeviceDeduplicationService>,
    trigger: &'static str,
) {
    finish_pass(sync.process_queue().await, dedup, trigger).await;
}

async fn finish_pass(
    drained: Result<DrainReport, AppError>,
    dedup: Option<&CrossDeviceDeduplicationService>,
    trigger: &'static str,
) {
    match drained {
        Ok(report) if report.already_running => {
            debug!(target: "sync::service", trigger, "Drain already in progress");
            return;
        }
        Ok(report) => debug!(target: "sync::service", trigger, ?report, "Drain triggered"),
        Err(err) => {
            error!(target: "sync::service", trigger, error = %err, "Drain failed");
            return;
        }
    }

    if let Some(dedup) = dedup {
        if let Err(err) = dedup.deduplicate_if_needed().await {
            warn!(target: "sync::dedup", trigger, error = %err, "Deduplication pass failed");
        }
    }
}
