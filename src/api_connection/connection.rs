use async_trait::async_trait;
use dotenv::dotenv;
use reqwest::Client;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::endpoints::{FoodRecord, Provider, SearchRequest, SearchResponse, FDC_BASE_URL};

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
}

/// The food-lookup collaborator: text search, fetch by id, barcode lookup.
#[async_trait]
pub trait FoodLookup: Send + Sync {
    async fn search_foods(&self, request: &SearchRequest) -> Result<SearchResponse, ApiConnectionError>;

    async fn get_food(&self, fdc_id: u64) -> Result<FoodRecord, ApiConnectionError>;

    /// UPC lookup as a branded-only text search.
    async fn lookup_barcode(&self, upc: &str) -> Result<Option<FoodRecord>, ApiConnectionError> {
        let response = self.search_foods(&SearchRequest::barcode(upc)).await?;
        Ok(pick_barcode_match(response.foods, upc))
    }
}

/// Exact `gtinUpc` match first, then the first hit, then nothing.
pub fn pick_barcode_match(foods: Vec<FoodRecord>, upc: &str) -> Option<FoodRecord> {
    let exact = foods
        .iter()
        .position(|f| f.gtin_upc.as_deref() == Some(upc));
    match exact {
        Some(idx) => foods.into_iter().nth(idx),
        None => foods.into_iter().next(),
    }
}

impl Provider {
    pub fn usda_fdc(api_key_env_var_name: &str) -> Self {
        dotenv().ok();
        Self::UsdaFdc {
            api_key: api_key_env_var_name.to_string(),
            base_url: FDC_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_base_url(self, url: &str) -> Self {
        match self {
            Provider::UsdaFdc {
                api_key,
                timeout_secs,
                ..
            } => Provider::UsdaFdc {
                api_key,
                base_url: url.trim_end_matches('/').to_string(),
                timeout_secs,
            },
        }
    }

    pub fn with_timeout_secs(self, secs: u64) -> Self {
        match self {
            Provider::UsdaFdc {
                api_key, base_url, ..
            } => Provider::UsdaFdc {
                api_key,
                base_url,
                timeout_secs: secs,
            },
        }
    }

    pub fn base_url(&self) -> &str {
        match self {
            Provider::UsdaFdc { base_url, .. } => base_url,
        }
    }

    /// Resolves the key at call time, so a missing key fails the first lookup
    /// rather than process start-up.
    fn resolve_api_key(&self) -> Result<String, ApiConnectionError> {
        match self {
            Provider::UsdaFdc {
                api_key: api_key_env_var_name,
                ..
            } => {
                dotenv().ok();
                env::var(api_key_env_var_name)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| ApiConnectionError::MissingApiKey(api_key_env_var_name.clone()))
            }
        }
    }

    fn http_client(&self) -> Result<Client, ApiConnectionError> {
        let timeout_secs = match self {
            Provider::UsdaFdc { timeout_secs, .. } => *timeout_secs,
        };
        Ok(Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiConnectionError> {
        let actual_api_key = self.resolve_api_key()?;
        let client = self.http_client()?;

        let response = client
            .get(url)
            .query(query)
            .query(&[("api_key", actual_api_key.as_str())])
            .send()
            .await?;

        if response.status().is_success() {
            let body = response.text().await?;
            Ok(serde_json::from_str::<T>(&body)?)
        } else {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            warn!(%status, url, "FDC request failed");
            Err(ApiConnectionError::ApiError { status, error_body })
        }
    }
}

#[async_trait]
impl FoodLookup for Provider {
    #[instrument(skip(self), fields(query = %request.query))]
    async fn search_foods(&self, request: &SearchRequest) -> Result<SearchResponse, ApiConnectionError> {
        let url = format!("{}/foods/search", self.base_url());
        let response: SearchResponse = self.get_json(&url, &request.query_pairs()).await?;
        debug!(
            hits = response.total_hits,
            returned = response.foods.len(),
            "FDC search complete"
        );
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn get_food(&self, fdc_id: u64) -> Result<FoodRecord, ApiConnectionError> {
        let url = format!("{}/food/{}", self.base_url(), fdc_id);
        self.get_json(&url, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branded(id: u64, upc: &str) -> FoodRecord {
        FoodRecord {
            fdc_id: Some(id),
            gtin_upc: Some(upc.to_string()),
            data_type: Some("Branded".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_pick_barcode_prefers_exact_upc() {
        let foods = vec![branded(1, "111"), branded(2, "222"), branded(3, "333")];
        let picked = pick_barcode_match(foods, "222").unwrap();
        assert_eq!(picked.fdc_id, Some(2));
    }

    #[test]
    fn test_pick_barcode_falls_back_to_first_then_none() {
        let foods = vec![branded(7, "999"), branded(8, "888")];
        assert_eq!(pick_barcode_match(foods, "123").unwrap().fdc_id, Some(7));
        assert!(pick_barcode_match(Vec::new(), "123").is_none());
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let provider = Provider::usda_fdc("SOME_KEY_VAR").with_base_url("http://localhost:9000/fdc/");
        assert_eq!(provider.base_url(), "http://localhost:9000/fdc");
    }

    #[tokio::test]
    async fn test_missing_api_key_short_circuits() {
        let provider = Provider::usda_fdc("BITEWISE_KEY_THAT_IS_NEVER_SET_QWERTY")
            // unroutable: reaching the network would be a bug in this test
            .with_base_url("http://127.0.0.1:9");
        let result = provider.search_foods(&SearchRequest::new("apple")).await;
        match result {
            Err(ApiConnectionError::MissingApiKey(name)) => {
                assert_eq!(name, "BITEWISE_KEY_THAT_IS_NEVER_SET_QWERTY")
            }
            other => panic!("expected MissingApiKey, got {:?}", other),
        }
    }
}
