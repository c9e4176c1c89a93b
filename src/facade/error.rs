//! Error-to-HTTP mapping (SPEC_FULL.md §7): the facade's concern, not the
//! core's. `Insufficient` never reaches here — it is carried inside a
//! successful `AnomalyCheckResponse` as `cannot_determine`.

use crate::core::error::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    details: Option<String>,
}

pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            CoreError::Transient(_) => (StatusCode::BAD_GATEWAY, "transient"),
            CoreError::Permanent(_) => (StatusCode::INTERNAL_SERVER_ERROR, "permanent"),
        };
        // Transient/Permanent wrap an `anyhow::Error`; its source chain is
        // useful to an operator but noisier than the top-level message, so
        // it only goes in `details`.
        let details = match &self.0 {
            CoreError::Transient(err) | CoreError::Permanent(err) => Some(format!("{err:?}")),
            CoreError::InvalidInput(_) | CoreError::NotFound(_) => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.0.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_maps_to_400_with_no_details() {
        let resp = ApiError::from(CoreError::InvalidInput("bad hour".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError::from(CoreError::NotFound("base:a|b|0|weekday".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn transient_maps_to_502() {
        let resp = ApiError::from(CoreError::transient(anyhow::anyhow!("redis down"))).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn permanent_maps_to_500() {
        let resp = ApiError::from(CoreError::permanent(anyhow::anyhow!("bad config"))).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
