pub mod entities;
pub mod value_objects;

pub use entities::{
    AthleteProfile, Race, Run, SocialProfile, SyncEntity, SyncMetadata, SyncQueueItem,
    TrainingPlan,
};
pub use value_objects::{EntityId, EntityKind, SyncOperationType, SyncQueueId, SyncQueueStatus};
