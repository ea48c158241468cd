use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chill_core::PlannerError;

use crate::error_response;

/// `Json` whose rejections use the structured error payload.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(BodyRejection))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejections use the structured error payload.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(BodyRejection))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug)]
pub struct BodyRejection {
    status: StatusCode,
    message: String,
}

impl From<JsonRejection> for BodyRejection {
    fn from(rejection: JsonRejection) -> Self {
        // Oversized bodies keep their 413; everything else is bad input.
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for BodyRejection {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for BodyRejection {
    fn into_response(self) -> Response {
        let mut response = error_response(PlannerError::InvalidInput(self.message));
        *response.status_mut() = self.status;
        response
    }
}
