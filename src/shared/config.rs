use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// 空文字の場合はリクエスト署名を無効化する
    #[serde(default)]
    pub signing_secret: String,
    /// ワーカーのサービス資格情報。空なら未認証で起動し、キューは排出しない
    #[serde(default)]
    pub auth_token: String,
    pub request_timeout: u64,
}

impl ApiConfig {
    pub fn has_credentials(&self) -> bool {
        !self.auth_token.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval: u64,
    pub max_retries: u32,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub stale_uploading_secs: u64,
    #[serde(default)]
    pub retain_completed: bool,
    pub completed_ttl_hours: u64,
    pub restore_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub probe_interval: u64,
    pub probe_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/stride.db".to_string(),
                max_connections: 5,
                connection_timeout: 30,
            },
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                signing_secret: String::new(),
                auth_token: String::new(),
                request_timeout: 30,
            },
            sync: SyncConfig::default(),
            network: NetworkConfig {
                probe_interval: 30,
                probe_path: "/health".to_string(),
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval: 300, // 5 minutes
            max_retries: 5,
            base_backoff_secs: 30,
            max_backoff_secs: 30 * 60,
            stale_uploading_secs: 5 * 60,
            retain_completed: false,
            completed_ttl_hours: 24,
            restore_page_size: 100,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        // 既定値
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("STRIDE_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        }
        if let Some(value) = env_u64("STRIDE_DATABASE_MAX_CONNECTIONS") {
            cfg.database.max_connections = value.min(u64::from(u32::MAX)) as u32;
        }

        // API 設定
        if let Ok(v) = std::env::var("STRIDE_API_BASE_URL") {
            if !v.trim().is_empty() {
                cfg.api.base_url = v.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(v) = std::env::var("STRIDE_API_SIGNING_SECRET") {
            cfg.api.signing_secret = v;
        }
        if let Ok(v) = std::env::var("STRIDE_API_TOKEN") {
            cfg.api.auth_token = v.trim().to_string();
        }
        if let Some(value) = env_u64("STRIDE_API_REQUEST_TIMEOUT") {
            cfg.api.request_timeout = value.max(1);
        }

        // 同期設定
        if let Ok(v) = std::env::var("STRIDE_SYNC_AUTO") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = env_u64("STRIDE_SYNC_INTERVAL") {
            cfg.sync.sync_interval = value.max(1);
        }
        if let Some(value) = env_u64("STRIDE_SYNC_MAX_RETRIES") {
            cfg.sync.max_retries = value.min(u64::from(u32::MAX)) as u32;
        }
        if let Some(value) = env_u64("STRIDE_SYNC_BASE_BACKOFF_SECS") {
            cfg.sync.base_backoff_secs = value;
        }
        if let Some(value) = env_u64("STRIDE_SYNC_MAX_BACKOFF_SECS") {
            cfg.sync.max_backoff_secs = value;
        }
        if let Some(value) = env_u64("STRIDE_SYNC_STALE_UPLOADING_SECS") {
            cfg.sync.stale_uploading_secs = value;
        }
        if let Ok(v) = std::env::var("STRIDE_SYNC_RETAIN_COMPLETED") {
            cfg.sync.retain_completed = parse_bool(&v, cfg.sync.retain_completed);
        }
        if let Some(value) = env_u64("STRIDE_SYNC_COMPLETED_TTL_HOURS") {
            cfg.sync.completed_ttl_hours = value.max(1);
        }

        if let Some(value) = env_u64("STRIDE_NETWORK_PROBE_INTERVAL") {
            cfg.network.probe_interval = value;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(format!(
                "API base_url must be an http(s) URL: {}",
                self.api.base_url
            ));
        }
        if self.sync.max_retries == 0 {
            return Err("Sync max_retries must be greater than 0".to_string());
        }
        if self.sync.base_backoff_secs == 0 {
            return Err("Sync base_backoff_secs must be greater than 0".to_string());
        }
        if self.sync.max_backoff_secs < self.sync.base_backoff_secs {
            return Err("Sync max_backoff_secs must not be below base_backoff_secs".to_string());
        }
        if self.sync.auto_sync && self.sync.sync_interval == 0 {
            return Err("Sync sync_interval must be greater than 0".to_string());
        }
        if self.sync.restore_page_size == 0 {
            return Err("Sync restore_page_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| parse_u64(&v))
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
