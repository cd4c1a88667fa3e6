pub mod auth;
pub mod database;
pub mod http;
pub mod local_store;
pub mod remote;
pub mod sync_queue;

pub use auth::SessionAuth;
pub use database::ConnectionPool;
pub use http::{ApiClient, ApiError};
pub use local_store::SqliteLocalStore;
pub use remote::{HttpActivityRemote, HttpConnectivityProbe, HttpRemoteSource};
pub use sync_queue::SqliteSyncQueueStore;
