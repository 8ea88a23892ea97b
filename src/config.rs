//! Endpoints and HTTP settings

use std::time::Duration;

pub const RECIPES_URL: &str = "https://api.hypixel.net/resources/skyblock/collections";
pub const RECIPES_FALLBACK_URLS: &[&str] = &["https://api.hypixel.net/v2/resources/skyblock/collections"];
pub const BAZAAR_URL: &str = "https://api.hypixel.net/skyblock/bazaar";
pub const USER_AGENT: &str = concat!("bazaar-calculator/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings shared by every HTTP request
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Primary recipes endpoint followed by its fallbacks, in the order they are tried.
///
/// An explicit primary replaces the default one; explicit fallbacks replace
/// the default fallbacks.
pub fn recipe_endpoints(primary: Option<String>, fallbacks: Vec<String>) -> Vec<String> {
    let mut endpoints = vec![primary.unwrap_or_else(|| RECIPES_URL.to_string())];
    if fallbacks.is_empty() {
        endpoints.extend(RECIPES_FALLBACK_URLS.iter().map(|url| url.to_string()));
    } else {
        endpoints.extend(fallbacks);
    }
    endpoints.dedup();
    endpoints
}
