use axum::{response::IntoResponse, Json};
use log::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Database(String),
}

impl ApiError {
    /// Logs the underlying store failure and returns the generic
    /// user-facing message for it. Internal detail never reaches the
    /// client.
    pub fn db(context: &str, err: impl std::fmt::Display) -> Self {
        error!("{context}: {err}");
        Self::Database(format!("Failed to {context}"))
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::NotFound("Record not found".to_string()),
            other => {
                error!("Database error: {other}");
                Self::Database("Internal database error".to_string())
            }
        }
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        error!("Connection pool error: {err}");
        Self::Database("Internal database error".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::Unauthorized(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
