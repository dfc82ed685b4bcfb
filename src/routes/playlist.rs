use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::errors::ApiError;
use crate::metrics;
use crate::models::{Channel, PlaylistFormat, UrlQuery};
use crate::services::fetcher::parse_remote_url;
use crate::services::m3u_parser;
use crate::AppState;

/// GET /playlist?url=<encoded> - Fetch a remote playlist and normalize it into channels
pub async fn get_playlist(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    let url = query.url().ok_or(ApiError::MissingParameter)?;

    let target = parse_remote_url(url).map_err(ApiError::Playlist)?;
    let text = state
        .fetcher
        .fetch_text(&target)
        .await
        .map_err(ApiError::Playlist)?;

    let (format, channels) = m3u_parser::normalize(&text);
    match format {
        PlaylistFormat::ExtendedM3u => tracing::info!("M3U format detected"),
        PlaylistFormat::CommaDelimited => tracing::info!("Comma-delimited format detected"),
    }
    let label = format.to_string();
    metrics::PLAYLIST_REQUESTS
        .with_label_values(&[label.as_str()])
        .inc();

    tracing::info!(url, channels = channels.len(), %format, "Playlist normalized");
    Ok(Json(channels))
}
