pub mod auth;
pub mod connectivity;
pub mod local_store;
pub mod remote_source;
pub mod replicated_table;
pub mod sync_queue_store;

pub use auth::AuthProvider;
pub use connectivity::ConnectivityProbe;
pub use local_store::LocalStore;
pub use remote_source::{ActivityRemote, FetchRequest, RemotePage, RemoteSource};
pub use replicated_table::{ReplicaRow, ReplicatedTable};
pub use sync_queue_store::SyncQueueStore;
