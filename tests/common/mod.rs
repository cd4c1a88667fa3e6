#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stride_lib::application::ports::remote_source::{FetchRequest, RemotePage, RemoteSource};
use stride_lib::application::ports::{AuthProvider, LocalStore, SyncQueueStore};
use stride_lib::domain::entities::{Race, Run, SyncEntity};
use stride_lib::domain::value_objects::EntityId;
use stride_lib::infrastructure::http::ApiError;
use stride_lib::infrastructure::{ConnectionPool, SessionAuth, SqliteLocalStore, SqliteSyncQueueStore};

pub async fn memory_pool() -> ConnectionPool {
    let pool = ConnectionPool::from_memory().await.expect("in-memory sqlite");
    pool.migrate().await.expect("migrations");
    pool
}

pub struct TestContext {
    pub pool: ConnectionPool,
    pub queue: Arc<SqliteSyncQueueStore>,
    pub auth: Arc<SessionAuth>,
}

impl TestContext {
    pub async fn new() -> Self {
        let pool = memory_pool().await;
        Self {
            queue: Arc::new(SqliteSyncQueueStore::new(pool.clone())),
            auth: Arc::new(SessionAuth::new(true)),
            pool,
        }
    }

    pub fn queue_port(&self) -> Arc<dyn SyncQueueStore> {
        self.queue.clone()
    }

    pub fn auth_port(&self) -> Arc<dyn AuthProvider> {
        self.auth.clone()
    }

    pub fn store<T: SyncEntity>(&self) -> Arc<SqliteLocalStore<T>> {
        Arc::new(SqliteLocalStore::new(self.pool.clone()))
    }
}

pub fn sample_run() -> Run {
    Run::new(Utc::now() - Duration::hours(2), 10_000.0, 3_000).with_notes("tempo")
}

pub fn sample_race(name: &str) -> Race {
    Race::new(name, Utc::now() + Duration::days(30), 21_097.5)
}

pub fn entity_id(value: &str) -> EntityId {
    EntityId::new(value.to_string()).expect("entity id")
}

/// 呼び出しを記録するリモートのスタブ。
///
/// `script` に積んだ結果を先頭から順に返し、空なら `srv-<id>` を採番したエコーを返す。
pub struct RecordingRemote<T> {
    script: Mutex<VecDeque<Result<(), ApiError>>>,
    pages: Mutex<VecDeque<Result<RemotePage<T>, ApiError>>>,
    calls: Mutex<Vec<String>>,
    keys: Mutex<Vec<Option<String>>>,
    fetches: AtomicUsize,
}

impl<T> Default for RecordingRemote<T> {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            pages: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }
}

impl<T: SyncEntity> RecordingRemote<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_result(&self, result: Result<(), ApiError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn push_page(&self, page: Result<RemotePage<T>, ApiError>) {
        self.pages.lock().unwrap().push_back(page);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<Option<String>> {
        self.keys.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn record(&self, call: String, key: Option<&str>) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        self.keys.lock().unwrap().push(key.map(str::to_string));
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn echo(entity: &T) -> T {
        let mut echoed = entity.clone();
        if echoed.remote_id().is_none() {
            echoed.sync_metadata_mut().server_id = Some(format!("srv-{}", entity.id()));
        }
        echoed
    }
}

#[async_trait]
impl<T: SyncEntity> RemoteSource<T> for RecordingRemote<T> {
    async fn upload(&self, entity: &T, idempotency_key: Option<&str>) -> Result<T, ApiError> {
        self.record(format!("upload:{}", entity.id()), idempotency_key)?;
        Ok(Self::echo(entity))
    }

    async fn update(
        &self,
        entity: &T,
        remote_id: &str,
        idempotency_key: Option<&str>,
    ) -> Result<T, ApiError> {
        self.record(format!("update:{remote_id}"), idempotency_key)?;
        Ok(Self::echo(entity))
    }

    async fn delete(&self, remote_id: &str) -> Result<(), ApiError> {
        self.record(format!("delete:{remote_id}"), None)
    }

    async fn fetch(&self, _request: FetchRequest) -> Result<RemotePage<T>, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RemotePage::last(Vec::new())))
    }
}

pub async fn stored<T: SyncEntity>(store: &SqliteLocalStore<T>, id: &EntityId) -> Option<T> {
    store.get(id).await.expect("local read")
}
