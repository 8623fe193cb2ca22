use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Rent record deletion blocked by existing payments.
    #[error("{0}")]
    HasDependentPayments(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    /// Payment would push total received past the total due.
    #[error("{0}")]
    Overpayment(String),
    #[error("{0}")]
    Dependency(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::HasDependentPayments(_) => StatusCode::CONFLICT,
            Self::UnprocessableEntity(_) | Self::Overpayment(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Dependency(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::HasDependentPayments(_) => "has_dependent_payments",
            Self::UnprocessableEntity(_) => "unprocessable_entity",
            Self::Overpayment(_) => "overpayment",
            Self::Dependency(_) => "dependency",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        }
        let body = Json(json!({
            "error": self.kind(),
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Map store errors, folding unique-constraint violations into `Conflict`
/// so the database remains the last line of defense behind the explicit
/// pre-write checks.
pub fn map_db_error(error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_error) = error {
        if db_error.code().as_deref() == Some("23505") {
            return AppError::Conflict(
                "Duplicate value violates a unique constraint.".to_string(),
            );
        }
    }
    tracing::error!(db_error = %error, "Database query failed");
    AppError::Dependency("Database operation failed.".to_string())
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use axum::http::StatusCode;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(
            AppError::Overpayment("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::HasDependentPayments("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Dependency("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(AppError::Overpayment("x".into()).kind(), "overpayment");
        assert_eq!(
            AppError::HasDependentPayments("x".into()).kind(),
            "has_dependent_payments"
        );
    }
}
