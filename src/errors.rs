//! Route-level errors
//!
//! Every handler failure ends up here and is rendered as
//! `{ "error": ..., "details": ... }`. Fetch and parse failures share a body;
//! the underlying cause is only distinguished in the server log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::epg::EpgError;
use crate::services::fetcher::FetchError;
use crate::services::fragment::RewriteError;
use crate::services::relay::RelayError;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("url query parameter is required")]
    MissingParameter,
    #[error("Failed to fetch or parse playlist")]
    Playlist(#[source] FetchError),
    #[error("Failed to fetch or parse EPG data")]
    Epg(#[source] EpgError),
    #[error("Failed to proxy stream")]
    Relay(#[source] RelayError),
    #[error("Failed to rewrite fragment url")]
    Rewrite(#[source] RewriteError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter | ApiError::Rewrite(_) => StatusCode::BAD_REQUEST,
            ApiError::Playlist(_) | ApiError::Epg(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Relay(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn details(&self) -> String {
        match self {
            ApiError::MissingParameter => "pass the remote resource as ?url=<absolute url>".to_string(),
            ApiError::Playlist(e) => e.to_string(),
            ApiError::Epg(e) => e.to_string(),
            ApiError::Relay(e) => e.to_string(),
            ApiError::Rewrite(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
        };

        match &self {
            ApiError::MissingParameter | ApiError::Rewrite(_) => {
                tracing::debug!(details = %body.details, "{}", body.error)
            }
            _ => tracing::error!(status = status.as_u16(), details = %body.details, "{}", body.error),
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::MissingParameter.status(), StatusCode::BAD_REQUEST);

        let fetch = FetchError::Status { status: 500, reason: "Internal Server Error".to_string() };
        assert_eq!(ApiError::Playlist(fetch).status(), StatusCode::INTERNAL_SERVER_ERROR);

        let relay = RelayError::Status { status: 500, reason: "Internal Server Error".to_string() };
        let err = ApiError::Relay(relay);
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Failed to proxy stream");
        assert_eq!(err.details(), "upstream returned HTTP 500: Internal Server Error");

        let rewrite = ApiError::Rewrite(RewriteError::InvalidBase("nope".to_string()));
        assert_eq!(rewrite.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rewrite.details(), "invalid stream base url 'nope'");
    }
}
