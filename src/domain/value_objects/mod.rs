pub mod entity_id;
pub mod entity_kind;
pub mod sync_operation_type;
pub mod sync_queue_id;
pub mod sync_queue_status;

pub use entity_id::EntityId;
pub use entity_kind::{DedupScope, EntityKind, MissingOnDelete, SaveSemantics};
pub use sync_operation_type::SyncOperationType;
pub use sync_queue_id::SyncQueueId;
pub use sync_queue_status::SyncQueueStatus;
