//! Maps core errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::errors::{Error, ErrorKind};

/// Status code for each public error kind.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidSlot => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::DuplicateBooking | ErrorKind::SlotFull => StatusCode::CONFLICT,
        ErrorKind::InsufficientCredit => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match &self {
            Self::Database(e) => {
                tracing::error!("Database failure: {}", e);
                "storage is temporarily unavailable".to_string()
            }
            Self::Io(e) => {
                tracing::error!("I/O failure: {}", e);
                "storage is temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": kind.as_str(),
            "message": message,
        }));

        (status_for(kind), body).into_response()
    }
}

/// Type alias for handler results
pub type ApiResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DbErr;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::SlotFull), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::InsufficientCredit),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_for(ErrorKind::InvalidSlot),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let response = Error::Database(DbErr::Custom("disk".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = Error::not_found("session", 3).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
