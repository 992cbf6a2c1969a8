use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sprite_db::LedgerError;
use sprite_types::UserIdentity;
use sprite_types::api::ErrorResponse;
use tracing::error;

/// A ledger failure on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Conflict { .. } | LedgerError::AlreadyCompleted(_) => StatusCode::CONFLICT,
            LedgerError::InvalidAmount(_) | LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LedgerError::InsufficientBalance { .. }
            | LedgerError::BelowMinimum { .. }
            | LedgerError::NoRecipients
            | LedgerError::AmountTooSmall { .. }
            | LedgerError::NoEligibleUsers => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
            LedgerError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            // Don't leak SQL details to adapters.
            LedgerError::Storage(e) => {
                error!("storage error: {}", e);
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            code: self.0.code().to_string(),
            error: message,
        };
        (status, Json(body)).into_response()
    }
}

/// Parse a user identity taken from a path segment.
pub fn parse_user(raw: &str) -> ApiResult<UserIdentity> {
    raw.parse()
        .map_err(|e: sprite_types::IdentityError| ApiError(LedgerError::InvalidInput(e.to_string())))
}
