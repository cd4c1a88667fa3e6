use super::sync_operation_type::SyncOperationType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// クラウド複製で重複行が生じたときのまとめ方。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    /// テーブル全体で論理的に 1 行だけ
    Singleton,
    /// 業務 ID ごとに 1 行
    NaturalKey,
}

/// 保存時に既存行をどう扱うか。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveSemantics {
    Keyed,
    /// 保存した行以外をローカルから取り除く（プロフィールやアクティブなプランなど）
    ReplaceAll,
}

/// 存在しない ID を削除したときの振る舞い。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingOnDelete {
    NotFound,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Run,
    AthleteProfile,
    Race,
    TrainingPlan,
    SocialProfile,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Run,
        EntityKind::AthleteProfile,
        EntityKind::Race,
        EntityKind::TrainingPlan,
        EntityKind::SocialProfile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Run => "run",
            EntityKind::AthleteProfile => "athlete_profile",
            EntityKind::Race => "race",
            EntityKind::TrainingPlan => "training_plan",
            EntityKind::SocialProfile => "social_profile",
        }
    }

    pub fn dedup_scope(&self) -> DedupScope {
        match self {
            EntityKind::AthleteProfile | EntityKind::SocialProfile | EntityKind::TrainingPlan => {
                DedupScope::Singleton
            }
            EntityKind::Run | EntityKind::Race => DedupScope::NaturalKey,
        }
    }

    pub fn save_semantics(&self) -> SaveSemantics {
        match self {
            EntityKind::AthleteProfile | EntityKind::SocialProfile | EntityKind::TrainingPlan => {
                SaveSemantics::ReplaceAll
            }
            EntityKind::Run | EntityKind::Race => SaveSemantics::Keyed,
        }
    }

    pub fn missing_on_delete(&self) -> MissingOnDelete {
        match self {
            EntityKind::Run => MissingOnDelete::Ignore,
            _ => MissingOnDelete::NotFound,
        }
    }

    pub fn upsert_operation(&self) -> SyncOperationType {
        match self {
            EntityKind::Run => SyncOperationType::RunUpload,
            EntityKind::AthleteProfile => SyncOperationType::AthleteSync,
            EntityKind::Race => SyncOperationType::RaceSync,
            EntityKind::TrainingPlan => SyncOperationType::TrainingPlanSync,
            EntityKind::SocialProfile => SyncOperationType::SocialProfileSync,
        }
    }

    pub fn delete_operation(&self) -> Option<SyncOperationType> {
        match self {
            EntityKind::Run => Some(SyncOperationType::RunDelete),
            EntityKind::Race => Some(SyncOperationType::RaceDelete),
            EntityKind::TrainingPlan => Some(SyncOperationType::TrainingPlanDelete),
            EntityKind::AthleteProfile | EntityKind::SocialProfile => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_round_trip_to_their_kind() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.upsert_operation().entity_kind(), kind);
            if let Some(delete) = kind.delete_operation() {
                assert_eq!(delete.entity_kind(), kind);
                assert!(delete.targets_removed_entity());
            }
        }
    }

    #[test]
    fn profiles_are_singletons() {
        assert_eq!(EntityKind::AthleteProfile.dedup_scope(), DedupScope::Singleton);
        assert_eq!(EntityKind::SocialProfile.dedup_scope(), DedupScope::Singleton);
        assert_eq!(EntityKind::TrainingPlan.dedup_scope(), DedupScope::Singleton);
        assert_eq!(EntityKind::Race.dedup_scope(), DedupScope::NaturalKey);
    }

    #[test]
    fn replace_all_kinds_dedup_as_singletons() {
        for kind in EntityKind::ALL {
            assert_eq!(
                kind.save_semantics() == SaveSemantics::ReplaceAll,
                kind.dedup_scope() == DedupScope::Singleton,
                "{kind}"
            );
        }
    }

    #[test]
    fn only_run_deletion_is_idempotent() {
        assert_eq!(EntityKind::Run.missing_on_delete(), MissingOnDelete::Ignore);
        assert_eq!(EntityKind::Race.missing_on_delete(), MissingOnDelete::NotFound);
        assert_eq!(
            EntityKind::TrainingPlan.missing_on_delete(),
            MissingOnDelete::NotFound
        );
    }
}
