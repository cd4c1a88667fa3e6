use super::dto::{ActivityDto, RemotePageDto, RemoteResource};
use crate::application::ports::remote_source::{
    ActivityRemote, FetchRequest, RemotePage, RemoteSource,
};
use crate::application::ports::ConnectivityProbe;
use crate::domain::entities::{Run, SyncEntity};
use crate::domain::value_objects::EntityId;
use crate::infrastructure::http::interceptors::IDEMPOTENCY_KEY_HEADER;
use crate::infrastructure::http::{ApiClient, ApiError, ApiRequest};
use async_trait::async_trait;
use chrono::Utc;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// `ApiClient` 上に構築したエンティティごとのリモートデータソース。
pub struct HttpRemoteSource<T> {
    client: Arc<ApiClient>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> HttpRemoteSource<T> {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            _marker: PhantomData,
        }
    }
}

fn with_key(request: ApiRequest, key: Option<&str>) -> Result<ApiRequest, ApiError> {
    match key {
        Some(key) => request.with_header(IDEMPOTENCY_KEY_HEADER, key),
        None => Ok(request),
    }
}

impl<T> HttpRemoteSource<T>
where
    T: SyncEntity + RemoteResource,
{
    fn item_path(&self, id: &str) -> String {
        if T::SINGLETON {
            T::PATH.to_string()
        } else {
            format!("{}/{}", T::PATH, id)
        }
    }

    fn decode(dto: T::Dto) -> Result<T, ApiError> {
        T::from_dto(dto, Utc::now()).map_err(ApiError::Decode)
    }
}

#[async_trait]
impl<T> RemoteSource<T> for HttpRemoteSource<T>
where
    T: SyncEntity + RemoteResource,
{
    async fn upload(&self, entity: &T, idempotency_key: Option<&str>) -> Result<T, ApiError> {
        let request = if T::SINGLETON {
            ApiRequest::put(T::PATH)
        } else {
            ApiRequest::post(T::PATH)
        };
        let request = with_key(request.with_json(&entity.to_dto())?, idempotency_key)?;
        let dto: T::Dto = self.client.send_json(request).await?;
        Self::decode(dto)
    }

    async fn update(
        &self,
        entity: &T,
        remote_id: &str,
        idempotency_key: Option<&str>,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::put(self.item_path(remote_id)).with_json(&entity.to_dto())?;
        let dto: T::Dto = self
            .client
            .send_json(with_key(request, idempotency_key)?)
            .await?;
        Self::decode(dto)
    }

    async fn delete(&self, remote_id: &str) -> Result<(), ApiError> {
        self.client
            .send_empty(ApiRequest::delete(self.item_path(remote_id)))
            .await
    }

    async fn fetch(&self, request: FetchRequest) -> Result<RemotePage<T>, ApiError> {
        if T::SINGLETON {
            return match self.client.send_json::<T::Dto>(ApiRequest::get(T::PATH)).await {
                Ok(dto) => Ok(RemotePage::last(vec![Self::decode(dto)?])),
                Err(ApiError::NotFound(_)) => Ok(RemotePage::last(Vec::new())),
                Err(err) => Err(err),
            };
        }

        let mut api_request = ApiRequest::get(T::PATH).with_query("limit", request.limit.to_string());
        if let Some(cursor) = request.cursor {
            api_request = api_request.with_query("cursor", cursor);
        }
        if let Some(since) = request.since {
            api_request = api_request.with_query("since", since.to_rfc3339());
        }

        let page: RemotePageDto<T::Dto> = self.client.send_json(api_request).await?;
        debug!(
            target: "api::client",
            kind = T::KIND.as_str(),
            items = page.items.len(),
            has_more = page.has_more,
            "Fetched remote page"
        );

        let items = page
            .items
            .into_iter()
            .map(Self::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RemotePage {
            items,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        })
    }
}

pub struct HttpActivityRemote {
    client: Arc<ApiClient>,
}

impl HttpActivityRemote {
    pub const FEED_PATH: &'static str = "/v1/feed/activities";

    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActivityRemote for HttpActivityRemote {
    async fn publish_activity(
        &self,
        run: &Run,
        idempotency_key: Option<&str>,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::post(Self::FEED_PATH).with_json(&ActivityDto::from(run))?;
        self.client
            .send_empty(with_key(request, idempotency_key)?)
            .await
    }

    async fn revoke_share(&self, run_id: &EntityId) -> Result<(), ApiError> {
        self.client
            .send_empty(ApiRequest::delete(format!("{}/{}", Self::FEED_PATH, run_id)))
            .await
    }
}

/// ヘルスチェックエンドポイントによる到達性確認。
pub struct HttpConnectivityProbe {
    client: Arc<ApiClient>,
    path: String,
}

impl HttpConnectivityProbe {
    pub fn new(client: Arc<ApiClient>, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.send(ApiRequest::get(self.path.clone())).await {
            Ok(_) => true,
            // サーバまで届いていれば到達可能とみなす
            Err(ApiError::Transport(_)) => false,
            Err(_) => true,
        }
    }
}
