use super::entity_kind::EntityKind;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// 同期キューに積まれる送信操作の種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperationType {
    RunUpload,
    RunDelete,
    AthleteSync,
    RaceSync,
    RaceDelete,
    TrainingPlanSync,
    TrainingPlanDelete,
    SocialProfileSync,
    ActivityPublish,
    ShareRevoke,
}

impl SyncOperationType {
    pub const ALL: [SyncOperationType; 10] = [
        SyncOperationType::RunUpload,
        SyncOperationType::RunDelete,
        SyncOperationType::AthleteSync,
        SyncOperationType::RaceSync,
        SyncOperationType::RaceDelete,
        SyncOperationType::TrainingPlanSync,
        SyncOperationType::TrainingPlanDelete,
        SyncOperationType::SocialProfileSync,
        SyncOperationType::ActivityPublish,
        SyncOperationType::ShareRevoke,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperationType::RunUpload => "run_upload",
            SyncOperationType::RunDelete => "run_delete",
            SyncOperationType::AthleteSync => "athlete_sync",
            SyncOperationType::RaceSync => "race_sync",
            SyncOperationType::RaceDelete => "race_delete",
            SyncOperationType::TrainingPlanSync => "training_plan_sync",
            SyncOperationType::TrainingPlanDelete => "training_plan_delete",
            SyncOperationType::SocialProfileSync => "social_profile_sync",
            SyncOperationType::ActivityPublish => "activity_publish",
            SyncOperationType::ShareRevoke => "share_revoke",
        }
    }

    /// 操作対象のエンティティ種別
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            SyncOperationType::RunUpload
            | SyncOperationType::RunDelete
            | SyncOperationType::ActivityPublish
            | SyncOperationType::ShareRevoke => EntityKind::Run,
            SyncOperationType::AthleteSync => EntityKind::AthleteProfile,
            SyncOperationType::RaceSync | SyncOperationType::RaceDelete => EntityKind::Race,
            SyncOperationType::TrainingPlanSync | SyncOperationType::TrainingPlanDelete => {
                EntityKind::TrainingPlan
            }
            SyncOperationType::SocialProfileSync => EntityKind::SocialProfile,
        }
    }

    /// ローカルに実体が存在しないことが前提の操作か
    pub fn targets_removed_entity(&self) -> bool {
        matches!(
            self,
            SyncOperationType::RunDelete
                | SyncOperationType::RaceDelete
                | SyncOperationType::TrainingPlanDelete
                | SyncOperationType::ShareRevoke
        )
    }
}

impl fmt::Display for SyncOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncOperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("Unknown sync operation type: {s}"))
    }
}
