use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::ApiError;
use crate::services::fragment::stream_base_url;
use crate::AppState;

/// Query parameters for fragment rewriting
#[derive(Debug, Deserialize)]
pub struct RewriteQuery {
    #[serde(default)]
    pub url: Option<String>,
    /// Stream base; the directory of `url` when absent
    #[serde(default)]
    pub base: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    pub url: String,
}

/// GET /rewrite?url=<requested>&base=<optional>
/// Maps a manifest or segment URL onto `/proxy` for players that cannot rewrite locally.
pub async fn rewrite_fragment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RewriteQuery>,
) -> Result<Json<RewriteResponse>, ApiError> {
    let requested = query
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or(ApiError::MissingParameter)?;

    let base = match query.base.as_deref().filter(|b| !b.trim().is_empty()) {
        Some(base) => base.to_string(),
        None => stream_base_url(requested),
    };

    let url = state
        .rewriter
        .rewrite(requested, &base)
        .map_err(ApiError::Rewrite)?;

    tracing::debug!(requested, base = %base, relayed = %url, "Fragment rewritten");
    Ok(Json(RewriteResponse { url }))
}
