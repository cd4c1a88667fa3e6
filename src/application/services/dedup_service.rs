use crate::application::ports::replicated_table::{ReplicaRow, ReplicatedTable};
use crate::domain::value_objects::DedupScope;
use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    pub tables_scanned: usize,
    pub groups_collapsed: usize,
    pub rows_removed: u64,
}

impl DedupReport {
    pub fn is_noop(&self) -> bool {
        self.rows_removed == 0
    }
}

/// クラウド複製で生じた重複行を 1 行にまとめる。
///
/// 各グループで `updated_at` が最新の行を残し、同時刻なら `row_id` の大きい方を残す。
pub struct CrossDeviceDeduplicationService {
    tables: Vec<Arc<dyn ReplicatedTable>>,
}

impl CrossDeviceDeduplicationService {
    pub fn new(tables: Vec<Arc<dyn ReplicatedTable>>) -> Self {
        Self { tables }
    }

    pub async fn deduplicate_if_needed(&self) -> Result<DedupReport, AppError> {
        let mut report = DedupReport::default();

        for table in &self.tables {
            report.tables_scanned += 1;
            let rows = table.replica_rows().await?;
            if rows.len() <= 1 {
                continue;
            }

            let (groups, losers) = redundant_rows(table.scope(), &rows);
            if losers.is_empty() {
                continue;
            }

            let removed = table.delete_rows(&losers).await?;
            info!(
                target: "sync::dedup",
                table = table.name(),
                groups,
                removed,
                "Collapsed duplicated rows"
            );
            report.groups_collapsed += groups;
            report.rows_removed += removed;
        }

        debug!(
            target: "sync::dedup",
            tables = report.tables_scanned,
            removed = report.rows_removed,
            "Deduplication pass finished"
        );
        Ok(report)
    }
}

/// 重複グループ数と削除対象の row_id を返す
fn redundant_rows(scope: DedupScope, rows: &[ReplicaRow]) -> (usize, Vec<i64>) {
    let mut groups: HashMap<&str, Vec<&ReplicaRow>> = HashMap::new();
    for row in rows {
        let key = match scope {
            DedupScope::Singleton => "",
            DedupScope::NaturalKey => row.natural_key.as_str(),
        };
        groups.entry(key).or_default().push(row);
    }

    let mut collapsed = 0;
    let mut losers = Vec::new();
    for members in groups.values() {
        if members.len() <= 1 {
            continue;
        }
        let Some(keeper) = members
            .iter()
            .max_by_key(|row| (row.updated_at, row.row_id))
        else {
            continue;
        };
        collapsed += 1;
        losers.extend(
            members
                .iter()
                .filter(|row| row.row_id != keeper.row_id)
                .map(|row| row.row_id),
        );
    }
    losers.sort_unstable();

    (collapsed, losers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn row(row_id: i64, key: &str, age_secs: i64) -> ReplicaRow {
        ReplicaRow {
            row_id,
            natural_key: key.to_string(),
            updated_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn singleton_keeps_only_the_newest_row() {
        let rows = vec![row(1, "a", 30), row(2, "b", 10), row(3, "c", 20)];
        let (groups, losers) = redundant_rows(DedupScope::Singleton, &rows);
        assert_eq!(groups, 1);
        assert_eq!(losers, vec![1, 3]);
    }

    #[test]
    fn natural_key_groups_independently() {
        let rows = vec![
            row(1, "race-1", 5),
            row(2, "race-1", 50),
            row(3, "race-2", 5),
            row(4, "race-3", 50),
            row(5, "race-3", 5),
        ];
        let (groups, losers) = redundant_rows(DedupScope::NaturalKey, &rows);
        assert_eq!(groups, 2);
        assert_eq!(losers, vec![2, 4]);
    }

    #[test]
    fn ties_keep_the_latest_row_id() {
        let at = Utc::now();
        let rows = vec![
            ReplicaRow {
                row_id: 7,
                natural_key: "run-1".into(),
                updated_at: at,
            },
            ReplicaRow {
                row_id: 9,
                natural_key: "run-1".into(),
                updated_at: at,
            },
        ];
        let (_, losers) = redundant_rows(DedupScope::NaturalKey, &rows);
        assert_eq!(losers, vec![7]);
    }

    #[test]
    fn unique_rows_are_left_alone() {
        let rows = vec![row(1, "a", 1), row(2, "b", 2)];
        let (groups, losers) = redundant_rows(DedupScope::NaturalKey, &rows);
        assert_eq!(groups, 0);
        assert!(losers.is_empty());
    }
}
