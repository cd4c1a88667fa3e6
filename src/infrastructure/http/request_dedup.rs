use super::error::ApiError;
use super::request::{ApiRequest, ApiResponse};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Method;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// 重複判定に使うリクエストの同一性。クエリは順序に依存しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Bytes,
}

impl RequestIdentity {
    pub fn of(request: &ApiRequest) -> Self {
        let mut query = request.query.clone();
        query.sort();
        Self {
            method: request.method.clone(),
            path: request.path.clone(),
            query,
            body: request.body.clone().unwrap_or_default(),
        }
    }
}

type SharedCall = Shared<BoxFuture<'static, Result<ApiResponse, ApiError>>>;

/// 同一リクエストの同時実行を 1 回の物理呼び出しにまとめる。
#[derive(Default)]
pub struct InFlightDeduplicator {
    in_flight: Mutex<HashMap<RequestIdentity, SharedCall>>,
}

impl InFlightDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn calls(&self) -> MutexGuard<'_, HashMap<RequestIdentity, SharedCall>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn in_flight_count(&self) -> usize {
        self.calls().len()
    }

    /// 同じ identity の呼び出しが進行中ならその結果を待ち、なければ `call` を起動する
    pub async fn run<F, Fut>(
        &self,
        identity: RequestIdentity,
        call: F,
    ) -> Result<ApiResponse, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ApiResponse, ApiError>> + Send + 'static,
    {
        let (shared, _leader) = {
            let mut calls = self.calls();
            if let Some(existing) = calls.get(&identity) {
                debug!(
                    target: "api::client",
                    method = %identity.method,
                    path = %identity.path,
                    "Joining in-flight request"
                );
                (existing.clone(), None)
            } else {
                let shared = call().boxed().shared();
                calls.insert(identity.clone(), shared.clone());
                (
                    shared,
                    Some(LeaderGuard {
                        owner: self,
                        identity,
                    }),
                )
            }
        };

        shared.await
    }
}

/// 起動した呼び出しが終了（またはキャンセル）した時点でエントリを外す
struct LeaderGuard<'a> {
    owner: &'a InFlightDeduplicator,
    identity: RequestIdentity,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        self.owner.calls().remove(&self.identity);
    }
}
