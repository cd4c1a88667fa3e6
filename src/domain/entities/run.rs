use super::sync_entity::{SyncEntity, SyncMetadata};
use crate::domain::value_objects::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: EntityId,
    pub started_at: DateTime<Utc>,
    pub distance_meters: f64,
    pub duration_secs: u32,
    pub notes: Option<String>,
    #[serde(default)]
    pub sync: SyncMetadata,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn new(started_at: DateTime<Utc>, distance_meters: f64, duration_secs: u32) -> Self {
        Self {
            id: EntityId::generate(),
            started_at,
            distance_meters,
            duration_secs,
            notes: None,
            sync: SyncMetadata::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn is_synced(&self) -> bool {
        self.sync.server_id.is_some()
    }
}

impl SyncEntity for Run {
    const KIND: EntityKind = EntityKind::Run;

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
        if !self.distance_meters.is_finite() || self.distance_meters < 0.0 {
            return Err("Run distance must be a non-negative number".to_string());
        }
        if self.duration_secs == 0 {
            return Err("Run duration must be greater than 0".to_string());
        }
        Ok(())
    }
}
