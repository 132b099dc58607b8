//! HTTP mapping of access-layer errors.
//!
//! Handlers return [`ApiResult`]; any [`DbError`] converts into an [`ApiError`] with `?` and
//! is rendered as `{ "statusCode": n, "error": kind, "message": text }`.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

use labstore::error::DbError;

#[derive(Error, Debug)]
#[error(transparent)]
pub struct ApiError(#[from] DbError);

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    status_code: u16,
    error: &'a str,
    message: String,
}

impl ApiError {
    /// Name of the error kind reported in the response body.
    pub fn kind(&self) -> &'static str {
        match &self.0 {
            DbError::Connection(_) => "ConnectionError",
            DbError::Operation { .. } => "OperationError",
            DbError::Serialization(_) => "SerializationError",
            DbError::Configuration(_) => "ConfigurationError",
        }
    }

    /// Error text without the kind prefix.
    pub fn message(&self) -> String {
        match &self.0 {
            DbError::Connection(inner) => inner.to_string(),
            DbError::Operation { message, .. } => message.clone(),
            DbError::Serialization(message) | DbError::Configuration(message) => message.clone(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            DbError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(ErrorBody {
            status_code: status.as_u16(),
            error: self.kind(),
            message: self.message(),
        })
    }
}
