use crate::application::ports::{AuthProvider, ReplicatedTable, SyncQueueStore};
use crate::application::services::{
    ActivityShareHandler, CrossDeviceDeduplicationService, DrainOptions, EntitySyncHandler,
    NetworkMonitor, RetryPolicy, SyncMode, SyncScheduler, SyncService, SyncedRepository,
};
use crate::domain::entities::{
    AthleteProfile, Race, Run, SocialProfile, SyncEntity, TrainingPlan,
};
use crate::infrastructure::remote::RemoteResource;
use crate::infrastructure::{
    ApiClient, ConnectionPool, HttpActivityRemote, HttpConnectivityProbe, HttpRemoteSource,
    SessionAuth, SqliteLocalStore, SqliteSyncQueueStore,
};
use crate::shared::config::AppConfig;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// エンティティ 1 種類分のローカルストアとリポジトリ
pub struct EntityStack<T>
where
    T: SyncEntity,
{
    pub store: Arc<SqliteLocalStore<T>>,
    pub repository: Arc<SyncedRepository<T>>,
}

/// 同期エンジン全体の配線
pub struct AppState {
    pub config: AppConfig,
    pub pool: ConnectionPool,
    pub auth: Arc<SessionAuth>,
    pub api: Arc<ApiClient>,
    pub queue: Arc<SqliteSyncQueueStore>,
    pub runs: EntityStack<Run>,
    pub athlete_profile: EntityStack<AthleteProfile>,
    pub races: EntityStack<Race>,
    pub training_plans: EntityStack<TrainingPlan>,
    pub social_profile: EntityStack<SocialProfile>,
    pub sync: Arc<SyncService>,
    pub dedup: Arc<CrossDeviceDeduplicationService>,
    pub monitor: Arc<NetworkMonitor>,
}

impl AppState {
    pub async fn initialize(config: AppConfig) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid configuration")?;

        let pool = ConnectionPool::new(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.url))?;
        pool.migrate().await.context("Failed to run migrations")?;

        let api = Arc::new(ApiClient::from_config(&config.api).context("Failed to build API client")?);
        // 資格情報があるときだけ認証済みで起動する
        let auth = Arc::new(SessionAuth::new(config.api.has_credentials()));
        Ok(Self::assemble(config, pool, api, auth))
    }

    /// 既存のプールとクライアントから組み立てる（テストでの差し替え用）
    pub fn assemble(
        config: AppConfig,
        pool: ConnectionPool,
        api: Arc<ApiClient>,
        auth: Arc<SessionAuth>,
    ) -> Self {
        let queue = Arc::new(SqliteSyncQueueStore::new(pool.clone()));
        let queue_port: Arc<dyn SyncQueueStore> = queue.clone();
        let auth_port: Arc<dyn AuthProvider> = auth.clone();
        let mode = SyncMode::Durable(queue_port.clone());
        let page_size = config.sync.restore_page_size;

        let runs = entity_stack::<Run>(&pool, &api, &auth_port, &mode, page_size);
        let athlete_profile = entity_stack::<AthleteProfile>(&pool, &api, &auth_port, &mode, page_size);
        let races = entity_stack::<Race>(&pool, &api, &auth_port, &mode, page_size);
        let training_plans = entity_stack::<TrainingPlan>(&pool, &api, &auth_port, &mode, page_size);
        let social_profile = entity_stack::<SocialProfile>(&pool, &api, &auth_port, &mode, page_size);

        let sync = SyncService::new(queue_port, auth_port)
            .with_policy(RetryPolicy::from(&config.sync))
            .with_options(DrainOptions::from(&config.sync))
            .with_handler(entity_handler(&runs, &api))
            .with_handler(entity_handler(&athlete_profile, &api))
            .with_handler(entity_handler(&races, &api))
            .with_handler(entity_handler(&training_plans, &api))
            .with_handler(entity_handler(&social_profile, &api))
            .with_handler(Arc::new(ActivityShareHandler::new(
                runs.store.clone(),
                Arc::new(HttpActivityRemote::new(api.clone())),
            )));

        let tables: Vec<Arc<dyn ReplicatedTable>> = vec![
            runs.store.clone() as Arc<dyn ReplicatedTable>,
            athlete_profile.store.clone() as Arc<dyn ReplicatedTable>,
            races.store.clone() as Arc<dyn ReplicatedTable>,
            training_plans.store.clone() as Arc<dyn ReplicatedTable>,
            social_profile.store.clone() as Arc<dyn ReplicatedTable>,
        ];

        Self {
            config,
            pool,
            auth,
            api,
            queue,
            runs,
            athlete_profile,
            races,
            training_plans,
            social_profile,
            sync: Arc::new(sync),
            dedup: Arc::new(CrossDeviceDeduplicationService::new(tables)),
            monitor: Arc::new(NetworkMonitor::new()),
        }
    }

    /// 接続監視と各トリガーを起動したスケジューラを返す
    pub fn start_scheduler(&self) -> (SyncScheduler, tokio::task::JoinHandle<()>) {
        let probe = Arc::new(HttpConnectivityProbe::new(
            self.api.clone(),
            self.config.network.probe_path.clone(),
        ));
        let probe_task = self.monitor.spawn_probe(
            probe,
            Duration::from_secs(self.config.network.probe_interval.max(1)),
        );

        let mut scheduler = SyncScheduler::new(self.sync.clone(), self.monitor.clone())
            .with_dedup(self.dedup.clone());
        if self.config.sync.auto_sync {
            scheduler = scheduler.with_interval(Duration::from_secs(self.config.sync.sync_interval));
        }
        scheduler.start();
        info!(target: "sync::service", "Sync engine started");

        (scheduler, probe_task)
    }
}

fn entity_stack<T>(
    pool: &ConnectionPool,
    api: &Arc<ApiClient>,
    auth: &Arc<dyn AuthProvider>,
    mode: &SyncMode,
    page_size: u32,
) -> EntityStack<T>
where
    T: SyncEntity + RemoteResource,
{
    let store = Arc::new(SqliteLocalStore::<T>::new(pool.clone()));
    let repository = SyncedRepository::new(store.clone(), auth.clone(), mode.clone())
        .with_remote(Arc::new(HttpRemoteSource::<T>::new(api.clone())))
        .with_restore_page_size(page_size);

    EntityStack {
        store,
        repository: Arc::new(repository),
    }
}

fn entity_handler<T>(stack: &EntityStack<T>, api: &Arc<ApiClient>) -> Arc<EntitySyncHandler<T>>
where
    T: SyncEntity + RemoteResource,
{
    Arc::new(EntitySyncHandler::new(
        stack.store.clone(),
        Arc::new(HttpRemoteSource::<T>::new(api.clone())),
    ))
}
