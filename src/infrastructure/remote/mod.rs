pub mod dto;
pub mod http_remote_source;

pub use dto::RemoteResource;
pub use http_remote_source::{HttpActivityRemote, HttpConnectivityProbe, HttpRemoteSource};
