//! HTTP error mapping.
//!
//! ```text
//!   EbayError / DbError / CoreError ──► ApiError ──► (status, {code, message})
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use cardshop_core::{CoreError, ValidationError};
use cardshop_db::DbError;
use cardshop_ebay::EbayError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Ebay(#[from] EbayError),
    #[error("{0}")]
    Db(#[from] DbError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    /// Admin surface disabled (no admin token configured).
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Ebay(e) => match e {
                EbayError::Database(db) => db_status(db),
                EbayError::Config(_)
                | EbayError::MissingCredentials(_)
                | EbayError::NotConnected
                | EbayError::Invalid(_) => StatusCode::BAD_REQUEST,
                EbayError::SyncInProgress => StatusCode::CONFLICT,
                EbayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                EbayError::Transport(_)
                | EbayError::Api { .. }
                | EbayError::Parse(_)
                | EbayError::TokenRefresh(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::Db(e) => db_status(e),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

fn db_status(err: &DbError) -> StatusCode {
    match err {
        DbError::NotFound { .. } => StatusCode::NOT_FOUND,
        DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
        DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(EbayError::NotConnected).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(EbayError::SyncInProgress).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(DbError::not_found("Listing", 7)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(EbayError::Database(DbError::duplicate("category", "Pokemon"))).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(EbayError::TokenRefresh("401".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
