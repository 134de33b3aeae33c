use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    /// The completion service rejected the request for quota reasons.
    /// Expected and recoverable: the caller should try again later.
    #[error("Completion quota exceeded")]
    QuotaExceeded,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, None, self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, None, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, None, msg.clone()),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, None, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, None, msg.clone()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, None, self.to_string()),
            AppError::QuotaExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                Some("COMPLETION_QUOTA_EXCEEDED"),
                "Analysis temporarily unavailable due to high demand. Please try again later."
                    .into(),
            ),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error".into(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error".into(),
                )
            }
        };

        // `code` carries a machine-readable discriminator where the client UI
        // must distinguish outcomes beyond the status line (quota vs. generic 429).
        let body = match code {
            Some(code) => json!({
                "error": {
                    "message": message,
                    "code": code,
                    "status": status.as_u16(),
                }
            }),
            None => json!({
                "error": {
                    "message": message,
                    "code": status.as_u16(),
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn response_parts(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_quota_exceeded_renders_retry_later() {
        let (status, body) = response_parts(AppError::QuotaExceeded).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "COMPLETION_QUOTA_EXCEEDED");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("high demand"));
    }

    #[tokio::test]
    async fn test_internal_error_renders_generic_500() {
        let err = AppError::Internal(anyhow::anyhow!("connection pool exhausted"));
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], 500);
        assert_eq!(body["error"]["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_database_error_renders_generic_500() {
        let (status, body) = response_parts(AppError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], 500);
        assert_eq!(body["error"]["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_quota_and_generic_limit_responses_differ() {
        let (quota_status, quota_body) = response_parts(AppError::QuotaExceeded).await;
        let (limited_status, limited_body) = response_parts(AppError::RateLimited).await;
        assert_eq!(quota_status, limited_status);
        assert_ne!(
            quota_body["error"]["code"], limited_body["error"]["code"],
            "quota responses must stay machine-distinguishable from plain 429s"
        );
    }
}
