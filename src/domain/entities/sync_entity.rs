use crate::domain::value_objects::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// サーバ側で採番・付与されるメタデータ。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub server_id: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// 同期対象となるドメインエンティティの共通インターフェース。
pub trait SyncEntity:
    Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const KIND: EntityKind;

    fn id(&self) -> &EntityId;

    fn updated_at(&self) -> DateTime<Utc>;

    fn touch(&mut self, at: DateTime<Utc>);

    fn sync_metadata(&self) -> &SyncMetadata;

    fn sync_metadata_mut(&mut self) -> &mut SyncMetadata;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn remote_id(&self) -> Option<&str> {
        self.sync_metadata().server_id.as_deref()
    }

    /// アップロード成功後、サーバ応答のメタデータをローカル行へ反映する
    fn apply_remote(&mut self, remote: &Self, synced_at: DateTime<Utc>) {
        let server_id = remote
            .remote_id()
            .map(str::to_string)
            .unwrap_or_else(|| remote.id().to_string());
        let meta = self.sync_metadata_mut();
        meta.server_id = Some(server_id);
        meta.synced_at = Some(synced_at);
    }
}
