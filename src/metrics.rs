use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Playlists normalized, by detected format
    pub static ref PLAYLIST_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "iptv_relay_playlist_requests_total",
        "Playlists fetched and normalized, by detected format",
        &["format"]
    )
    .unwrap();

    /// EPG cache lookups: hit, miss, coalesced
    pub static ref EPG_CACHE_LOOKUPS: IntCounterVec = register_int_counter_vec!(
        "iptv_relay_epg_cache_lookups_total",
        "EPG cache lookups by result",
        &["result"]
    )
    .unwrap();

    /// Relay requests: ok, upstream_status, upstream_error
    pub static ref RELAY_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "iptv_relay_proxy_requests_total",
        "Stream relay requests by outcome",
        &["outcome"]
    )
    .unwrap();
}
