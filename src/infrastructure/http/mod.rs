pub mod api_client;
pub mod error;
pub mod interceptors;
pub mod request;
pub mod request_dedup;
pub mod transport;

pub use api_client::ApiClient;
pub use error::ApiError;
pub use interceptors::{
    BearerTokenInterceptor, IdempotencyInterceptor, RequestInterceptor, RequestSigner,
    SigningInterceptor,
};
pub use request::{ApiRequest, ApiResponse};
pub use request_dedup::{InFlightDeduplicator, RequestIdentity};
pub use transport::{HttpTransport, ReqwestTransport};
