use super::sync_entity::{SyncEntity, SyncMetadata};
use crate::domain::value_objects::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// アクティブなトレーニングプラン。保存すると既存のプランを置き換える。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlan {
    pub id: EntityId,
    pub name: String,
    pub race_id: Option<EntityId>,
    pub starts_on: DateTime<Utc>,
    pub weeks: u16,
    #[serde(default)]
    pub sync: SyncMetadata,
    pub updated_at: DateTime<Utc>,
}

impl TrainingPlan {
    pub fn new(name: impl Into<String>, starts_on: DateTime<Utc>, weeks: u16) -> Self {
        Self {
            id: EntityId::generate(),
            name: name.into(),
            race_id: None,
            starts_on,
            weeks,
            sync: SyncMetadata::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn for_race(mut self, race_id: EntityId) -> Self {
        self.race_id = Some(race_id);
        self
    }
}

impl SyncEntity for TrainingPlan {
    const KIND: EntityKind = EntityKind::TrainingPlan;

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
        if self.weeks == 0 {
            return Err("Training plan must span at least one week".to_string());
        }
        Ok(())
    }
}
