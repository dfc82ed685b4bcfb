use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::errors::ApiError;
use crate::models::{EpgResponse, UrlQuery};
use crate::AppState;

/// GET /epg?url=<encoded> - Programmes of an XMLTV guide (plain or .gz), cached per URL
pub async fn get_epg(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<Arc<EpgResponse>>, ApiError> {
    let url = query.url().ok_or(ApiError::MissingParameter)?;

    let epg = state.epg.programmes(url).await.map_err(ApiError::Epg)?;
    Ok(Json(epg))
}
