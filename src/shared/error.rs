use crate::infrastructure::http::ApiError;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Database(String),
    Network(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    ValidationError(String),
    ConfigurationError(String),
    SerializationError(String),
    DeserializationError(String),
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: impl fmt::Display, id: impl fmt::Display) -> Self {
        AppError::NotFound(format!("{kind} {id} does not exist"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            AppError::DeserializationError(err.to_string())
        } else {
            AppError::SerializationError(err.to_string())
        }
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => AppError::Unauthorized(err.to_string()),
            ApiError::NotFound(_) => AppError::NotFound(err.to_string()),
            ApiError::Conflict(_) => AppError::Conflict(err.to_string()),
            ApiError::Decode(_) => AppError::DeserializationError(err.to_string()),
            ApiError::InvalidRequest(_) => AppError::ValidationError(err.to_string()),
            ApiError::Server { .. } | ApiError::Client { .. } | ApiError::Transport(_) => {
                AppError::Network(err.to_string())
            }
        }
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_matching_app_errors() {
        assert!(matches!(
            AppError::from(ApiError::Unauthorized),
            AppError::Unauthorized(_)
        ));
        assert!(AppError::from(ApiError::NotFound("/v1/races/1".into())).is_not_found());
        assert!(matches!(
            AppError::from(ApiError::Server {
                status: 503,
                message: "unavailable".into()
            }),
            AppError::Network(_)
        ));
    }

    #[test]
    fn json_syntax_errors_are_deserialization_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(
            AppError::from(err),
            AppError::DeserializationError(_)
        ));
    }
}
