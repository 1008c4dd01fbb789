use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// JSON body returned by the HTTP surface whenever a request fails
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// Errors that can cross the HTTP boundary.
///
/// Each implementor picks a status and a stable machine-readable code
/// (e.g. "BLANK_CITY") so clients do not have to match on message text.
pub trait HttpError: std::error::Error {
    fn status_code(&self) -> StatusCode;

    fn error_code(&self) -> &'static str;
}

/// Render an [`HttpError`] as `{error, code}` with its status
pub fn into_response<E: HttpError>(err: E) -> Response {
    let status = err.status_code();
    let body = ErrorBody {
        error: err.to_string(),
        code: err.error_code(),
    };

    if status.is_server_error() {
        tracing::error!(error = %body.error, status = %status, code = body.code, "Request failed");
    } else {
        tracing::warn!(error = %body.error, status = %status, code = body.code, "Request rejected");
    }

    (status, Json(body)).into_response()
}

/// Implement `IntoResponse` for an [`HttpError`] so handlers can return it directly
#[macro_export]
macro_rules! impl_into_response {
    ($error_type:ty) => {
        impl axum::response::IntoResponse for $error_type {
            fn into_response(self) -> axum::response::Response {
                $crate::error::into_response(self)
            }
        }
    };
}
