use std::env;

use serde::{Deserialize, Serialize};

use crate::item::DeviceClass;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

/// Host-side settings: where stack items come from and how the device is classed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub fetch: FetchConfig,
    pub device: DeviceClass,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `STACKFETCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("STACKFETCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let is_mobile = profiled_env_or(p, "STACKFETCH_MOBILE", "false") == "true";
        Self {
            profile: p.to_string(),
            fetch: FetchConfig::from_env_profiled(p),
            device: DeviceClass::from_is_mobile(is_mobile),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  fetch:   base_url={}, timeout={}ms, cache_capacity={}",
            self.fetch.base_url.as_deref().unwrap_or("(none)"),
            self.fetch.request_timeout_ms,
            self.fetch.cache_capacity
        );
        tracing::info!("  device:  {}", self.device);
    }
}

// ── Fetch ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base URL that item ids are resolved against. `None` = ids are absolute URLs.
    pub base_url: Option<String>,
    pub request_timeout_ms: u64,
    /// Maximum number of items kept in the in-memory cache.
    pub cache_capacity: usize,
    pub user_agent: String,
}

impl FetchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_opt(p, "STACKFETCH_BASE_URL"),
            request_timeout_ms: profiled_env_u64(p, "STACKFETCH_REQUEST_TIMEOUT_MS", 30_000),
            cache_capacity: profiled_env_usize(p, "STACKFETCH_CACHE_CAPACITY", 2048),
            user_agent: profiled_env_or(p, "STACKFETCH_USER_AGENT", "stackfetch/0.1"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: 30_000,
            cache_capacity: 2048,
            user_agent: "stackfetch/0.1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_config_defaults() {
        let cfg = FetchConfig::default();
        assert!(cfg.base_url.is_none());
        assert!(!cfg.is_configured());
        assert_eq!(cfg.request_timeout_ms, 30_000);
        assert_eq!(cfg.cache_capacity, 2048);
    }

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        std::env::set_var("STACKFETCH_TEST_ONLY_KEY", "plain");
        std::env::set_var("QA_STACKFETCH_TEST_ONLY_KEY", "prefixed");
        assert_eq!(
            profiled_env_opt("QA", "STACKFETCH_TEST_ONLY_KEY").as_deref(),
            Some("prefixed")
        );
        assert_eq!(
            profiled_env_opt("", "STACKFETCH_TEST_ONLY_KEY").as_deref(),
            Some("plain")
        );
        assert_eq!(
            profiled_env_opt("OTHER", "STACKFETCH_TEST_ONLY_KEY").as_deref(),
            Some("plain")
        );
        std::env::remove_var("STACKFETCH_TEST_ONLY_KEY");
        std::env::remove_var("QA_STACKFETCH_TEST_ONLY_KEY");
    }

    #[test]
    fn profile_label_default() {
        let cfg = Config {
            profile: String::new(),
            fetch: FetchConfig::default(),
            device: DeviceClass::Desktop,
        };
        assert_eq!(cfg.profile_label(), "default");
    }
}
