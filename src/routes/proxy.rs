use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use futures::TryStreamExt;
use std::sync::Arc;

use crate::errors::ApiError;
use crate::metrics;
use crate::models::UrlQuery;
use crate::services::relay::{ForwardHeaders, RelayError};
use crate::AppState;

/// Request header as an owned string (reqwest and axum disagree on http versions)
fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// GET /proxy?url=<encoded>
/// Relays a manifest or segment so the player never talks to the origin directly.
/// Nothing is buffered: the upstream body is streamed and dropped with the client.
pub async fn proxy_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let url = query.url().ok_or(ApiError::MissingParameter)?;

    let forward = ForwardHeaders {
        user_agent: header_string(&headers, header::USER_AGENT),
        referer: header_string(&headers, header::REFERER),
        range: header_string(&headers, header::RANGE),
    };

    let relayed = match state.relay.relay(url, &forward).await {
        Ok(relayed) => relayed,
        Err(e) => {
            let outcome = match e {
                RelayError::Status { .. } => "upstream_status",
                _ => "upstream_error",
            };
            metrics::RELAY_REQUESTS.with_label_values(&[outcome]).inc();
            tracing::warn!(url, error = %e, "Relay failed");
            return Err(ApiError::Relay(e));
        }
    };
    metrics::RELAY_REQUESTS.with_label_values(&["ok"]).inc();

    let content_type = HeaderValue::from_str(&relayed.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("video/MP2T"));

    let mut response = Response::builder()
        .status(StatusCode::from_u16(relayed.status).unwrap_or(StatusCode::OK))
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-store");

    for (name, value) in &relayed.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            response = response.header(name, value);
        }
    }

    // Stream the body back; dropped with the client connection
    let source = url.to_string();
    let body = Body::from_stream(
        relayed
            .into_body_stream()
            .inspect_err(move |e| tracing::warn!(url = %source, error = %e, "Relay body aborted")),
    );

    response.body(body).map_err(|e| {
        tracing::error!("Failed to build response: {}", e);
        ApiError::Relay(RelayError::Response(e.to_string()))
    })
}
