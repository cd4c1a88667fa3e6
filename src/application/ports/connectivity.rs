use async_trait::async_trait;

/// 到達性の能動的な確認手段。
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}
