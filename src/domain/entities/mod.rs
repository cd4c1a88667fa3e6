pub mod athlete_profile;
pub mod race;
pub mod run;
pub mod social_profile;
pub mod sync_entity;
pub mod sync_queue_item;
pub mod training_plan;

pub use athlete_profile::AthleteProfile;
pub use race::Race;
pub use run::Run;
pub use social_profile::SocialProfile;
pub use sync_entity::{SyncEntity, SyncMetadata};
pub use sync_queue_item::SyncQueueItem;
pub use training_plan::TrainingPlan;
