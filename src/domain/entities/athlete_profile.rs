use super::sync_entity::{SyncEntity, SyncMetadata};
use crate::domain::value_objects::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ローカルストア全体で 1 行だけ存在するアスリートプロフィール。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfile {
    pub id: EntityId,
    pub display_name: String,
    pub birth_year: Option<u16>,
    pub weekly_goal_km: Option<f64>,
    #[serde(default)]
    pub sync: SyncMetadata,
    pub updated_at: DateTime<Utc>,
}

impl AthleteProfile {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: EntityId::generate(),
            display_name: display_name.into(),
            birth_year: None,
            weekly_goal_km: None,
            sync: SyncMetadata::default(),
            updated_at: Utc::now(),
        }
    }
}

impl SyncEntity for AthleteProfile {
    const KIND: EntityKind = EntityKind::AthleteProfile;

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
        if self.display_name.trim().is_empty() {
            return Err("Athlete display name cannot be empty".to_string());
        }
        Ok(())
    }
}
