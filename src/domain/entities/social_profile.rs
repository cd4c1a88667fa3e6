use super::sync_entity::{SyncEntity, SyncMetadata};
use crate::domain::value_objects::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialProfile {
    pub id: EntityId,
    pub handle: String,
    pub bio: Option<String>,
    pub is_public: bool,
    #[serde(default)]
    pub sync: SyncMetadata,
    pub updated_at: DateTime<Utc>,
}

impl SocialProfile {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            id: EntityId::generate(),
            handle: handle.into(),
            bio: None,
            is_public: false,
            sync: SyncMetadata::default(),
            updated_at: Utc::now(),
        }
    }
}

impl SyncEntity for SocialProfile {
    const KIND: EntityKind = EntityKind::SocialProfile;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn sync_metadata(&self) -> &SyncMetadata {
        &self.sync
    }

    fn sync_metadata_mut(&mut self) -> &mut SyncMetadata {
        &mut self.sync
    }

    fn validate(&self) -> Result<(), String> {
        let handle = self.handle.trim();
        if handle.is_empty() {
            return Err("Social handle cannot be empty".to_string());
        }
        if handle.chars().any(char::is_whitespace) {
            return Err("Social handle cannot contain whitespace".to_string());
        }
        Ok(())
    }
}
