use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use commsync_core::auth::AuthWebhookResponse;
use thiserror::Error;

/// Webhook failures. The rendered message is fixed per variant; any detail is
/// only logged.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No token provided")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Server configuration error")]
    Config,
    #[error("Failed to verify permissions")]
    MembershipLookup,
    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Config | Self::MembershipLookup | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!("Sync auth webhook error: {}", detail);
        }
        let status = self.status();
        (status, Json(AuthWebhookResponse::denied(self.to_string()))).into_response()
    }
}
