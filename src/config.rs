use std::env;
use std::time::Duration;

/// Desktop browser identity sent to origins that reject generic HTTP clients
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub app_env: String,
    /// Public origin of this server, used when building relay URLs
    pub base_url: String,
    pub static_dir: Option<String>,

    // Fetching
    pub user_agent: String,
    pub fetch_timeout_ms: u64,
    pub max_redirects: usize,

    // Stream relay
    pub proxy_timeout_ms: u64,

    // EPG cache
    pub epg_cache_ttl_secs: u64,
    pub epg_cache_max_entries: Option<usize>,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // Server
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            base_url: env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            static_dir: env::var("STATIC_DIR").ok().filter(|v| !v.is_empty()),

            // Fetching
            user_agent: env::var("USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),

            fetch_timeout_ms: env::var("FETCH_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30_000), // 30 seconds

            max_redirects: env::var("MAX_REDIRECTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Stream relay
            proxy_timeout_ms: env::var("PROXY_TIMEOUT_MS")
                .unwrap_or_else(|_| "15000".to_string())
                .parse()
                .unwrap_or(15_000), // 15 seconds

            // EPG cache
            epg_cache_ttl_secs: env::var("EPG_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "14400".to_string())
                .parse()
                .unwrap_or(14_400), // 4 hours
            epg_cache_max_entries: env::var("EPG_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_millis(self.proxy_timeout_ms)
    }

    pub fn epg_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.epg_cache_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            app_env: "development".to_string(),
            base_url: "http://localhost:3000".to_string(),
            static_dir: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_ms: 30_000,
            max_redirects: 10,
            proxy_timeout_ms: 15_000,
            epg_cache_ttl_secs: 14_400,
            epg_cache_max_entries: None,
        }
    }
}
