// Maps store and request errors onto the ApiResponse envelope.

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{http::StatusCode, HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;

use crate::api::models::ApiResponse;
use crate::model::FieldError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Conflict { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Constraint(_) | StoreError::Database(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            ApiError::Validation(errors) => {
                ApiResponse::<()>::error(self.to_string()).with_errors(errors.clone())
            }
            ApiError::Store(StoreError::Conflict { field, value }) => {
                ApiResponse::<()>::error(self.to_string()).with_errors(vec![FieldError::new(
                    field,
                    &format!("a country with {field} {value} already exists"),
                )])
            }
            _ if status.is_server_error() => {
                tracing::error!(error = %self, "request failed");
                ApiResponse::<()>::error("internal server error")
            }
            _ => ApiResponse::<()>::error(self.to_string()),
        };
        HttpResponse::build(status).json(body)
    }
}

/// Body extraction failures get the envelope instead of actix's plain text.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        JsonPayloadError::Deserialize(e) => {
            ApiError::Validation(vec![payload_field_error(&e.to_string())]).into()
        }
        other => ApiError::BadRequest(other.to_string()).into(),
    }
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let message = match err {
        QueryPayloadError::Deserialize(e) => e.to_string(),
        other => other.to_string(),
    };
    ApiError::Validation(vec![FieldError::new("query", &message)]).into()
}

/// serde reports a missing field as "missing field `name` at line ..".
fn payload_field_error(message: &str) -> FieldError {
    message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split_once('`'))
        .map(|(field, _)| FieldError::new(field, "is required"))
        .unwrap_or_else(|| FieldError::new("body", message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_field_error() {
        assert_eq!(
            payload_field_error("missing field `common_name` at line 1 column 46"),
            FieldError::new("common_name", "is required")
        );
        let other =
            payload_field_error("invalid type: string \"x\", expected i64 at line 1 column 20");
        assert_eq!(other.field, "body");
        assert!(other.message.starts_with("invalid type"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Store(StoreError::country_not_found()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Store(StoreError::Conflict {
                field: "cca3",
                value: "PER".into()
            })
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::BadRequest("q is required".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Store(StoreError::Constraint("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
