use super::error::ApiError;
use super::request::ApiRequest;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// 送信直前にリクエストを書き換えるフック。
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: &mut ApiRequest) -> Result<(), ApiError>;
}

/// 副作用のあるリクエストに冪等キーを付与する。
///
/// 呼び出し側が既にキーを設定している場合（キュー操作の再送など）は上書きしない。
#[derive(Debug, Default, Clone)]
pub struct IdempotencyInterceptor;

impl RequestInterceptor for IdempotencyInterceptor {
    fn intercept(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        if !request.has_side_effects() || request.header(IDEMPOTENCY_KEY_HEADER).is_some() {
            return Ok(());
        }
        request.set_header(IDEMPOTENCY_KEY_HEADER, &Uuid::new_v4().to_string())
    }
}

/// サービス資格情報を Bearer トークンとして付与する。トークンが空なら何もしない
#[derive(Clone)]
pub struct BearerTokenInterceptor {
    token: String,
}

impl BearerTokenInterceptor {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_string(),
        }
    }
}

impl std::fmt::Debug for BearerTokenInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenInterceptor")
            .field("enabled", &!self.token.is_empty())
            .finish()
    }
}

impl RequestInterceptor for BearerTokenInterceptor {
    fn intercept(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        if self.token.is_empty() || request.header(AUTHORIZATION_HEADER).is_some() {
            return Ok(());
        }
        request.set_header(AUTHORIZATION_HEADER, &format!("Bearer {}", self.token))
    }
}

type HmacSha256 = Hmac<Sha256>;

/// 共有シークレットによる HMAC-SHA256 署名。
#[derive(Clone)]
pub struct RequestSigner {
    secret: Vec<u8>,
}

impl RequestSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.secret.is_empty()
    }

    /// `"{timestamp}." + body` に対する署名を base64 で返す。シークレットが空なら None
    pub fn sign(&self, body: &[u8], timestamp: i64) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        Some(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SigningInterceptor {
    signer: RequestSigner,
}

impl SigningInterceptor {
    pub fn new(signer: RequestSigner) -> Self {
        Self { signer }
    }
}

impl RequestInterceptor for SigningInterceptor {
    fn intercept(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        let timestamp = Utc::now().timestamp();
        let Some(signature) = self.signer.sign(request.body_bytes(), timestamp) else {
            return Ok(());
        };
        request.set_header(SIGNATURE_HEADER, &signature)?;
        request.set_header(TIMESTAMP_HEADER, &timestamp.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_only_on_writes() {
        let interceptor = IdempotencyInterceptor;

        let mut post = ApiRequest::post("/v1/runs");
        interceptor.intercept(&mut post).unwrap();
        let key = post.header(IDEMPOTENCY_KEY_HEADER).unwrap();
        assert!(Uuid::parse_str(key).is_ok());

        let mut get = ApiRequest::get("/v1/runs");
        interceptor.intercept(&mut get).unwrap();
        assert!(get.header(IDEMPOTENCY_KEY_HEADER).is_none());

        let mut delete = ApiRequest::delete("/v1/runs/1");
        interceptor.intercept(&mut delete).unwrap();
        assert!(delete.header(IDEMPOTENCY_KEY_HEADER).is_none());
    }

    #[test]
    fn fresh_key_per_call_but_explicit_key_is_kept() {
        let interceptor = IdempotencyInterceptor;
        let mut first = ApiRequest::post("/v1/runs");
        let mut second = ApiRequest::post("/v1/runs");
        interceptor.intercept(&mut first).unwrap();
        interceptor.intercept(&mut second).unwrap();
        assert_ne!(
            first.header(IDEMPOTENCY_KEY_HEADER),
            second.header(IDEMPOTENCY_KEY_HEADER)
        );

        let mut keyed = ApiRequest::post("/v1/runs")
            .with_header(IDEMPOTENCY_KEY_HEADER, "queue-item-1")
            .unwrap();
        interceptor.intercept(&mut keyed).unwrap();
        assert_eq!(keyed.header(IDEMPOTENCY_KEY_HEADER), Some("queue-item-1"));
    }

    #[test]
    fn bearer_token_is_attached_when_configured() {
        let mut request = ApiRequest::get("/v1/runs");
        BearerTokenInterceptor::new("svc-token")
            .intercept(&mut request)
            .unwrap();
        assert_eq!(request.header(AUTHORIZATION_HEADER), Some("Bearer svc-token"));

        let mut anonymous = ApiRequest::get("/v1/runs");
        BearerTokenInterceptor::new("").intercept(&mut anonymous).unwrap();
        assert!(anonymous.header(AUTHORIZATION_HEADER).is_none());
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = RequestSigner::new("s3cret");
        let first = signer.sign(br#"{"a":1}"#, 1_700_000_000).unwrap();
        let second = signer.sign(br#"{"a":1}"#, 1_700_000_000).unwrap();
        assert_eq!(first, second);

        let other_body = signer.sign(br#"{"a":2}"#, 1_700_000_000).unwrap();
        assert_ne!(first, other_body);

        let other_time = signer.sign(br#"{"a":1}"#, 1_700_000_001).unwrap();
        assert_ne!(first, other_time);
    }

    #[test]
    fn empty_body_is_still_signed() {
        let signer = RequestSigner::new("s3cret");
        assert!(signer.sign(b"", 1_700_000_000).is_some());

        let mut request = ApiRequest::delete("/v1/runs/1");
        SigningInterceptor::new(signer).intercept(&mut request).unwrap();
        assert!(request.header(SIGNATURE_HEADER).is_some());
        assert!(request.header(TIMESTAMP_HEADER).is_some());
    }

    #[test]
    fn empty_secret_disables_signing() {
        let signer = RequestSigner::new("");
        assert!(signer.sign(b"body", 1).is_none());

        let mut request = ApiRequest::post("/v1/runs").with_json(&"body").unwrap();
        SigningInterceptor::new(signer).intercept(&mut request).unwrap();
        assert!(request.header(SIGNATURE_HEADER).is_none());
        assert!(request.header(TIMESTAMP_HEADER).is_none());
    }
}
