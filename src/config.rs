use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::api_connection::connection::{FoodLookup, DEFAULT_TIMEOUT_SECS};
use crate::api_connection::endpoints::{Provider, DEFAULT_PAGE_SIZE, FDC_BASE_URL};
use crate::search::session::{SearchSession, DEFAULT_DEBOUNCE};

pub const DEFAULT_API_KEY_VAR: &str = "FDC_API_KEY";
pub const DEFAULT_STATE_FILE: &str = "bitewise-state.json";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Name of the variable holding the FDC key; the key itself is read per request.
    pub api_key_var: String,
    pub fdc_base_url: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub search_debounce: Duration,
    pub state_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key_var: DEFAULT_API_KEY_VAR.to_string(),
            fdc_base_url: FDC_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            search_debounce: DEFAULT_DEBOUNCE,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset or blank values take the
    /// default; values that do not parse are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            api_key_var: get("FDC_API_KEY_VAR").unwrap_or(defaults.api_key_var),
            fdc_base_url: get("FDC_BASE_URL").unwrap_or(defaults.fdc_base_url),
            page_size: parse_or(get("FDC_PAGE_SIZE"), "FDC_PAGE_SIZE", defaults.page_size)?,
            timeout_secs: parse_or(get("FDC_TIMEOUT_SECS"), "FDC_TIMEOUT_SECS", defaults.timeout_secs)?,
            search_debounce: parse_or(
                get("SEARCH_DEBOUNCE_MS"),
                "SEARCH_DEBOUNCE_MS",
                defaults.search_debounce.as_millis() as u64,
            )
            .map(Duration::from_millis)?,
            state_file: get("BITEWISE_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_file),
        })
    }

    pub fn provider(&self) -> Provider {
        Provider::usda_fdc(&self.api_key_var)
            .with_base_url(&self.fdc_base_url)
            .with_timeout_secs(self.timeout_secs)
    }

    /// A search session using the configured debounce and page size.
    pub fn search_session<L: FoodLookup>(&self, lookup: Arc<L>) -> SearchSession<L> {
        SearchSession::new(lookup)
            .with_debounce(self.search_debounce)
            .with_page_size(self.page_size)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.search_debounce, Duration::from_millis(250));
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FDC_API_KEY_VAR", "MY_KEY"),
            ("FDC_PAGE_SIZE", "10"),
            ("SEARCH_DEBOUNCE_MS", "400"),
            ("BITEWISE_STATE_FILE", "/tmp/state.json"),
            ("FDC_TIMEOUT_SECS", "  "),
        ]))
        .unwrap();
        assert_eq!(config.api_key_var, "MY_KEY");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.search_debounce, Duration::from_millis(400));
        assert_eq!(config.state_file, PathBuf::from("/tmp/state.json"));
        assert_eq!(config.timeout_secs, 15);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("FDC_PAGE_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("FDC_PAGE_SIZE"));
    }

    #[test]
    fn test_provider_uses_configured_url() {
        let config = AppConfig::from_lookup(lookup(&[("FDC_BASE_URL", "http://localhost:9000/")])).unwrap();
        assert_eq!(config.provider().base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_search_session_uses_configured_debounce() {
        let config = AppConfig::from_lookup(lookup(&[("SEARCH_DEBOUNCE_MS", "0"), ("FDC_PAGE_SIZE", "7")])).unwrap();
        let session = config.search_session(Arc::new(config.provider()));
        assert_eq!(session.debounce(), Duration::ZERO);
        assert_eq!(session.page_size(), 7);
    }
}
