pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::services::{
    CrossDeviceDeduplicationService, DrainReport, NetworkMonitor, SyncMode, SyncService,
    SyncedRepository,
};
pub use domain::entities::{AthleteProfile, Race, Run, SocialProfile, TrainingPlan};
pub use infrastructure::{ApiClient, ConnectionPool, SqliteLocalStore, SqliteSyncQueueStore};
pub use shared::{AppConfig, AppError, Result};
pub use state::AppState;
