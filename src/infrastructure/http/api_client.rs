use super::error::ApiError;
use super::interceptors::{
    BearerTokenInterceptor, IdempotencyInterceptor, RequestInterceptor, RequestSigner,
    SigningInterceptor,
};
use super::request::{ApiRequest, ApiResponse};
use super::request_dedup::{InFlightDeduplicator, RequestIdentity};
use super::transport::{HttpTransport, ReqwestTransport};
use crate::shared::config::ApiConfig;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const JSON: &str = "application/json";

/// ベース URL の解決・標準ヘッダー・インターセプタ・同時実行の重複排除を
/// まとめて適用する汎用 API クライアント。
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    interceptors: Arc<Vec<Arc<dyn RequestInterceptor>>>,
    in_flight: InFlightDeduplicator,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            interceptors: Arc::new(Vec::new()),
            in_flight: InFlightDeduplicator::new(),
        }
    }

    /// 冪等キーと署名のインターセプタを備えたクライアントを設定から組み立てる
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout))?;
        Ok(Self::new(config.base_url.clone(), Arc::new(transport))
            .with_interceptor(Arc::new(IdempotencyInterceptor))
            .with_interceptor(Arc::new(BearerTokenInterceptor::new(
                config.auth_token.clone(),
            )))
            .with_interceptor(Arc::new(SigningInterceptor::new(RequestSigner::new(
                config.signing_secret.clone(),
            )))))
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        let mut interceptors = self.interceptors.as_ref().clone();
        interceptors.push(interceptor);
        self.interceptors = Arc::new(interceptors);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resolve(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// 2xx 以外は `ApiError` に分類して返す
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let identity = RequestIdentity::of(&request);
        let url = self.resolve(&request.path);
        let transport = Arc::clone(&self.transport);
        let interceptors = Arc::clone(&self.interceptors);

        self.in_flight
            .run(identity, move || async move {
                let request = prepare(request, &interceptors)?;
                let method = request.method.clone();
                debug!(target: "api::client", %method, %url, "Sending request");

                let response = transport.send(url.clone(), request).await?;
                if response.is_success() {
                    return Ok(response);
                }

                let error = ApiError::from_status(response.status, &response.text());
                warn!(
                    target: "api::client",
                    %method,
                    %url,
                    status = response.status,
                    error = %error,
                    "Request failed"
                );
                Err(error)
            })
            .await
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.json()
    }

    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }
}

fn prepare(
    mut request: ApiRequest,
    interceptors: &[Arc<dyn RequestInterceptor>],
) -> Result<ApiRequest, ApiError> {
    request
        .headers
        .entry(ACCEPT)
        .or_insert(HeaderValue::from_static(JSON));
    request
        .headers
        .entry(CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(JSON));

    for interceptor in interceptors {
        interceptor.intercept(&mut request)?;
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http::interceptors::{IDEMPOTENCY_KEY_HEADER, SIGNATURE_HEADER};
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        pub Transport {}

        #[async_trait]
        impl HttpTransport for Transport {
            async fn send(&self, url: String, request: ApiRequest) -> Result<ApiResponse, ApiError>;
        }
    }

    fn client(transport: MockTransport) -> ApiClient {
        ApiClient::new("https://api.example.test/", Arc::new(transport))
            .with_interceptor(Arc::new(IdempotencyInterceptor))
            .with_interceptor(Arc::new(SigningInterceptor::new(RequestSigner::new("k"))))
    }

    #[tokio::test]
    async fn applies_base_url_headers_and_interceptors() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(eq("https://api.example.test/v1/runs".to_string()), always())
            .times(1)
            .returning(|_, request| {
                assert_eq!(request.header("accept"), Some(JSON));
                assert_eq!(request.header("content-type"), Some(JSON));
                assert!(request.header(IDEMPOTENCY_KEY_HEADER).is_some());
                assert!(request.header(SIGNATURE_HEADER).is_some());
                Ok(ApiResponse::new(201, r#"{"id":"r1"}"#))
            });

        let body: serde_json::Value = client(transport)
            .send_json(ApiRequest::post("/v1/runs").with_json(&"run").unwrap())
            .await
            .unwrap();
        assert_eq!(body["id"], "r1");
    }

    #[tokio::test]
    async fn non_success_statuses_are_typed() {
        for status in [401u16, 404, 409, 500] {
            let mut transport = MockTransport::new();
            transport
                .expect_send()
                .returning(move |_, _| Ok(ApiResponse::new(status, "nope")));
            let err = client(transport)
                .send(ApiRequest::get("/v1/runs"))
                .await
                .unwrap_err();

            match status {
                401 => assert_eq!(err, ApiError::Unauthorized),
                404 => assert!(matches!(err, ApiError::NotFound(_))),
                409 => assert!(matches!(err, ApiError::Conflict(_))),
                _ => assert!(matches!(err, ApiError::Server { status: 500, .. })),
            }
        }
    }

    #[tokio::test]
    async fn transport_errors_pass_through() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_, _| Err(ApiError::Transport("connection refused".into())));
        let err = client(transport)
            .send_empty(ApiRequest::delete("/v1/runs/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
