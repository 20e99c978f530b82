//! Mapping of core errors onto HTTP responses

use crate::api::ErrorBody;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fireglobe_core::{Error, ErrorKind, TransportMode};

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Message-protocol clients only ever see `200` with `success: false`
    pub fn new(mode: TransportMode, status: StatusCode, message: impl Into<String>) -> Self {
        let status = match mode {
            TransportMode::PlainHttp => status,
            TransportMode::MessageProtocol => StatusCode::OK,
        };
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn from_core(mode: TransportMode, err: Error) -> Self {
        tracing::error!("Request failed: {}", err);
        Self::new(mode, status_for(err.kind()), err.message().to_string())
    }

    pub fn from_rejection(mode: TransportMode, rejection: JsonRejection) -> Self {
        tracing::warn!("Rejected request body: {}", rejection.body_text());
        Self::new(mode, rejection.status(), rejection.body_text())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument | ErrorKind::ValidationFailed | ErrorKind::ParseFailed => StatusCode::BAD_REQUEST,
        ErrorKind::FileNotFound => StatusCode::NOT_FOUND,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::RelayUnavailable | ErrorKind::GatewayFailed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
