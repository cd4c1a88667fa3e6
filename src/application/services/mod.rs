pub mod dedup_service;
pub mod network_monitor;
pub mod retry_policy;
pub mod sync_handlers;
pub mod sync_scheduler;
pub mod sync_service;
pub mod synced_repository;

pub use dedup_service::{CrossDeviceDeduplicationService, DedupReport};
pub use network_monitor::{ConnectivityRestored, ConnectivityState, NetworkMonitor};
pub use retry_policy::{FailureDisposition, RetryPolicy, SyncFailure};
pub use sync_handlers::{ActivityShareHandler, EntitySyncHandler};
pub use sync_scheduler::SyncScheduler;
pub use sync_service::{
    DrainOptions, DrainReport, HandlerOutcome, SyncOperationHandler, SyncService,
    SyncStatusSnapshot,
};
pub use synced_repository::{RestoreState, SyncMode, SyncedRepository};
