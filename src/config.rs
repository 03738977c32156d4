// src/config.rs
//
// Environment-driven runtime settings. Everything has a workable default so
// `cargo run` boots without a .env file.

use std::time::Duration;

const ENV_TIMEOUT: &str = "PRICE_FETCH_TIMEOUT_SECS";
const ENV_PROXIES: &str = "PROXY_ENDPOINTS";
const ENV_BIND: &str = "BIND_ADDR";

/// Per-request timeout band. Target pages either answer quickly or hang;
/// anything past the cap is treated as a failed source, never escalated.
const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 15;
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Public relay endpoints used when a target origin refuses direct access.
/// `{target}` is replaced by the percent-encoded page URL. Order matters:
/// the chain is walked front to back and the first 2xx non-empty body wins.
pub const DEFAULT_PROXY_ENDPOINTS: &[&str] = &[
    "https://api.allorigins.win/raw?url={target}",
    "https://corsproxy.io/?{target}",
    "https://api.codetabs.com/v1/proxy?quest={target}",
];

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    /// Ordered proxy templates; empty disables the fallback chain.
    pub proxy_endpoints: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy_endpoints: DEFAULT_PROXY_ENDPOINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl FetchConfig {
    /// Read settings from the environment:
    /// - `PRICE_FETCH_TIMEOUT_SECS`: clamped to [5, 15].
    /// - `PROXY_ENDPOINTS`: comma-separated templates; `none` disables the
    ///   chain entirely; unset keeps the built-in list.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(secs) = std::env::var(ENV_TIMEOUT)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            cfg.timeout = Duration::from_secs(secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS));
        }

        if let Ok(raw) = std::env::var(ENV_PROXIES) {
            let raw = raw.trim();
            if raw.eq_ignore_ascii_case("none") {
                cfg.proxy_endpoints.clear();
            } else if !raw.is_empty() {
                cfg.proxy_endpoints = raw
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
        }

        cfg
    }
}

/// Listen address for the HTTP server. Port 3001 matches the dev proxy the
/// UI expects.
pub fn bind_addr() -> String {
    std::env::var(ENV_BIND).unwrap_or_else(|_| "0.0.0.0:3001".to_string())
}
