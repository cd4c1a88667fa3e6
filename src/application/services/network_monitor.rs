use crate::application::ports::ConnectivityProbe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Unknown,
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityRestored {
    pub at: DateTime<Utc>,
}

/// 接続状態を保持し、オフラインからの復帰を通知する。
pub struct NetworkMonitor {
    state: watch::Sender<ConnectivityState>,
    restored: broadcast::Sender<ConnectivityRestored>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectivityState::Unknown);
        let (restored, _) = broadcast::channel(16);
        Self { state, restored }
    }

    pub fn current(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn is_offline(&self) -> bool {
        self.current() == ConnectivityState::Offline
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    pub fn subscribe_restored(&self) -> broadcast::Receiver<ConnectivityRestored> {
        self.restored.subscribe()
    }

    /// 観測結果を反映する。Offline から Online への遷移でのみ復帰イベントを送る
    pub fn report(&self, reachable: bool) {
        let next = if reachable {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        };
        let previous = self.state.send_replace(next);
        if previous == next {
            return;
        }

        info!(target: "sync::network", ?previous, current = ?next, "Connectivity changed");
        if previous == ConnectivityState::Offline && next == ConnectivityState::Online {
            // 購読者がいない場合の送信失敗は無視してよい
            let _ = self.restored.send(ConnectivityRestored { at: Utc::now() });
        }
    }

    /// プローブで定期的に到達性を確認するタスクを起動する
    pub fn spawn_probe(
        self: &Arc<Self>,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let reachable = probe.is_reachable().await;
                debug!(target: "sync::network", reachable, "Connectivity probe");
                monitor.report(reachable);
            }
        })
    }
}
