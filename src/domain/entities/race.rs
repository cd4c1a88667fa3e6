use super::sync_entity::{SyncEntity, SyncMetadata};
use crate::domain::value_objects::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: EntityId,
    pub name: String,
    pub race_date: DateTime<Utc>,
    pub distance_meters: f64,
    pub goal_time_secs: Option<u32>,
    #[serde(default)]
    pub sync: SyncMetadata,
    pub updated_at: DateTime<Utc>,
}

impl Race {
    pub fn new(name: impl Into<String>, race_date: DateTime<Utc>, distance_meters: f64) -> Self {
        Self {
            id: EntityId::generate(),
            name: name.into(),
            race_date,
            distance_meters,
            goal_time_secs: None,
            sync: SyncMetadata::default(),
            updated_at: Utc::now(),
        }
    }
}

impl SyncEntity for Race {
    const KIND: EntityKind = EntityKind::Race;

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
        if self.name.trim().is_empty() {
            return Err("Race name cannot be empty".to_string());
        }
        if !self.distance_meters.is_finite() || self.distance_meters <= 0.0 {
            return Err("Race distance must be greater than 0".to_string());
        }
        Ok(())
    }
}
