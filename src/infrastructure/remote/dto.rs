use crate::domain::entities::{
    AthleteProfile, Race, Run, SocialProfile, SyncMetadata, TrainingPlan,
};
use crate::domain::value_objects::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// サーバとの間で交換する JSON 表現への変換。
///
/// `client_id` は端末側の ID、`id` はサーバ採番の ID（未採番なら省略）。
pub trait RemoteResource: Sized {
    type Dto: Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static;

    /// コレクション（単一リソースの場合はリソース自体）のパス
    const PATH: &'static str;
    /// ユーザーごとに 1 件だけ存在するリソースか
    const SINGLETON: bool = false;

    fn to_dto(&self) -> Self::Dto;
    fn from_dto(dto: Self::Dto, received_at: DateTime<Utc>) -> Result<Self, String>;
}

fn metadata(server_id: Option<String>, received_at: DateTime<Utc>) -> SyncMetadata {
    SyncMetadata {
        synced_at: server_id.as_ref().map(|_| received_at),
        server_id,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePageDto<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub client_id: String,
    pub started_at: DateTime<Utc>,
    pub distance_meters: f64,
    pub duration_secs: u32,
    #[serde(default)]
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl RemoteResource for Run {
    type Dto = RunDto;
    const PATH: &'static str = "/v1/runs";

    fn to_dto(&self) -> RunDto {
        RunDto {
            id: self.sync.server_id.clone(),
            client_id: self.id.to_string(),
            started_at: self.started_at,
            distance_meters: self.distance_meters,
            duration_secs: self.duration_secs,
            notes: self.notes.clone(),
            updated_at: self.updated_at,
        }
    }

    fn from_dto(dto: RunDto, received_at: DateTime<Utc>) -> Result<Self, String> {
        Ok(Run {
            id: EntityId::new(dto.client_id)?,
            started_at: dto.started_at,
            distance_meters: dto.distance_meters,
            duration_secs: dto.duration_secs,
            notes: dto.notes,
            sync: metadata(dto.id, received_at),
            updated_at: dto.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfileDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub client_id: String,
    pub display_name: String,
    #[serde(default)]
    pub birth_year: Option<u16>,
    #[serde(default)]
    pub weekly_goal_km: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl RemoteResource for AthleteProfile {
    type Dto = AthleteProfileDto;
    const PATH: &'static str = "/v1/athlete/profile";
    const SINGLETON: bool = true;

    fn to_dto(&self) -> AthleteProfileDto {
        AthleteProfileDto {
            id: self.sync.server_id.clone(),
            client_id: self.id.to_string(),
            display_name: self.display_name.clone(),
            birth_year: self.birth_year,
            weekly_goal_km: self.weekly_goal_km,
            updated_at: self.updated_at,
        }
    }

    fn from_dto(dto: AthleteProfileDto, received_at: DateTime<Utc>) -> Result<Self, String> {
        Ok(AthleteProfile {
            id: EntityId::new(dto.client_id)?,
            display_name: dto.display_name,
            birth_year: dto.birth_year,
            weekly_goal_km: dto.weekly_goal_km,
            sync: metadata(dto.id, received_at),
            updated_at: dto.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub client_id: String,
    pub name: String,
    pub race_date: DateTime<Utc>,
    pub distance_meters: f64,
    #[serde(default)]
    pub goal_time_secs: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl RemoteResource for Race {
    type Dto = RaceDto;
    const PATH: &'static str = "/v1/races";

    fn to_dto(&self) -> RaceDto {
        RaceDto {
            id: self.sync.server_id.clone(),
            client_id: self.id.to_string(),
            name: self.name.clone(),
            race_date: self.race_date,
            distance_meters: self.distance_meters,
            goal_time_secs: self.goal_time_secs,
            updated_at: self.updated_at,
        }
    }

    fn from_dto(dto: RaceDto, received_at: DateTime<Utc>) -> Result<Self, String> {
        Ok(Race {
            id: EntityId::new(dto.client_id)?,
            name: dto.name,
            race_date: dto.race_date,
            distance_meters: dto.distance_meters,
            goal_time_secs: dto.goal_time_secs,
            sync: metadata(dto.id, received_at),
            updated_at: dto.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlanDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub client_id: String,
    pub name: String,
    #[serde(default)]
    pub race_id: Option<String>,
    pub starts_on: DateTime<Utc>,
    pub weeks: u16,
    pub updated_at: DateTime<Utc>,
}

impl RemoteResource for TrainingPlan {
    type Dto = TrainingPlanDto;
    /// 有効なプランはユーザーごとに 1 つ
    const PATH: &'static str = "/v1/training-plan";
    const SINGLETON: bool = true;

    fn to_dto(&self) -> TrainingPlanDto {
        TrainingPlanDto {
            id: self.sync.server_id.clone(),
            client_id: self.id.to_string(),
            name: self.name.clone(),
            race_id: self.race_id.as_ref().map(ToString::to_string),
            starts_on: self.starts_on,
            weeks: self.weeks,
            updated_at: self.updated_at,
        }
    }

    fn from_dto(dto: TrainingPlanDto, received_at: DateTime<Utc>) -> Result<Self, String> {
        Ok(TrainingPlan {
            id: EntityId::new(dto.client_id)?,
            name: dto.name,
            race_id: dto.race_id.map(EntityId::new).transpose()?,
            starts_on: dto.starts_on,
            weeks: dto.weeks,
            sync: metadata(dto.id, received_at),
            updated_at: dto.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialProfileDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub client_id: String,
    pub handle: String,
    #[serde(default)]
    pub bio: Option<String>,
    pub is_public: bool,
    pub updated_at: DateTime<Utc>,
}

impl RemoteResource for SocialProfile {
    type Dto = SocialProfileDto;
    const PATH: &'static str = "/v1/social/profile";
    const SINGLETON: bool = true;

    fn to_dto(&self) -> SocialProfileDto {
        SocialProfileDto {
            id: self.sync.server_id.clone(),
            client_id: self.id.to_string(),
            handle: self.handle.clone(),
            bio: self.bio.clone(),
            is_public: self.is_public,
            updated_at: self.updated_at,
        }
    }

    fn from_dto(dto: SocialProfileDto, received_at: DateTime<Utc>) -> Result<Self, String> {
        Ok(SocialProfile {
            id: EntityId::new(dto.client_id)?,
            handle: dto.handle,
            bio: dto.bio,
            is_public: dto.is_public,
            sync: metadata(dto.id, received_at),
            updated_at: dto.updated_at,
        })
    }
}

/// フィードへのアクティビティ公開リクエスト
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDto {
    pub run_id: String,
    pub distance_meters: f64,
    pub duration_secs: u32,
    pub started_at: DateTime<Utc>,
}

impl From<&Run> for ActivityDto {
    fn from(run: &Run) -> Self {
        Self {
            run_id: run
                .sync
                .server_id
                .clone()
                .unwrap_or_else(|| run.id.to_string()),
            distance_meters: run.distance_meters,
            duration_secs: run.duration_secs,
            started_at: run.started_at,
        }
    }
}
