use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api_connection::connection::{ApiConnectionError, FoodLookup};
use crate::api_connection::endpoints::{FoodRecord, SearchRequest, DEFAULT_PAGE_SIZE};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// What a search box currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<FoodRecord>,
    pub total_hits: u64,
    pub error: Option<String>,
}

#[derive(Debug)]
pub enum SearchOutcome {
    /// Results published; carries the number of records.
    Updated(usize),
    /// Blank query; results emptied without a request.
    Cleared,
    /// A newer query arrived first. Nothing was published.
    Superseded,
    Failed(ApiConnectionError),
}

/// Search-as-you-type over a [`FoodLookup`].
///
/// Each `submit` takes a new generation number and waits out the debounce.
/// Only a call whose generation is still the latest when its response lands
/// may publish, so a slow older response never overwrites newer results.
pub struct SearchSession<L: FoodLookup> {
    lookup: Arc<L>,
    debounce: Duration,
    page_size: u32,
    generation: AtomicU64,
    state: Mutex<SearchState>,
}

impl<L: FoodLookup> SearchSession<L> {
    pub fn new(lookup: Arc<L>) -> Self {
        Self {
            lookup,
            debounce: DEFAULT_DEBOUNCE,
            page_size: DEFAULT_PAGE_SIZE,
            generation: AtomicU64::new(0),
            state: Mutex::new(SearchState::default()),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub async fn state(&self) -> SearchState {
        self.state.lock().await.clone()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub async fn submit(&self, query: &str) -> SearchOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.trim();

        if query.is_empty() {
            let mut state = self.state.lock().await;
            if !self.is_current(generation) {
                return SearchOutcome::Superseded;
            }
            *state = SearchState::default();
            return SearchOutcome::Cleared;
        }

        tokio::time::sleep(self.debounce).await;
        if !self.is_current(generation) {
            return SearchOutcome::Superseded;
        }

        let request = SearchRequest::new(query).with_page_size(self.page_size);
        let result = self.lookup.search_foods(&request).await;

        let mut state = self.state.lock().await;
        if !self.is_current(generation) {
            debug!(query, "Discarding stale search response");
            return SearchOutcome::Superseded;
        }
        match result {
            Ok(response) => {
                let count = response.foods.len();
                *state = SearchState {
                    query: query.to_string(),
                    results: response.foods,
                    total_hits: response.total_hits,
                    error: None,
                };
                SearchOutcome::Updated(count)
            }
            Err(e) => {
                warn!(query, error = %e, "Search failed");
                state.query = query.to_string();
                state.error = Some(e.to_string());
                SearchOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_connection::endpoints::SearchResponse;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct SlowLookup {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FoodLookup for SlowLookup {
        async fn search_foods(&self, request: &SearchRequest) -> Result<SearchResponse, ApiConnectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = if request.query == "app" { 500 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if request.query == "boom" {
                return Err(ApiConnectionError::MissingApiKey("FDC_API_KEY".to_string()));
            }
            Ok(SearchResponse {
                foods: vec![FoodRecord {
                    description: request.query.clone(),
                    ..Default::default()
                }],
                total_hits: 1,
                ..Default::default()
            })
        }

        async fn get_food(&self, fdc_id: u64) -> Result<FoodRecord, ApiConnectionError> {
            Ok(FoodRecord {
                fdc_id: Some(fdc_id),
                ..Default::default()
            })
        }
    }

    fn session() -> (Arc<SlowLookup>, Arc<SearchSession<SlowLookup>>) {
        let lookup = Arc::new(SlowLookup::default());
        (lookup.clone(), Arc::new(SearchSession::new(lookup)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_never_overwrites_newer() {
        let (_, session) = session();
        let first = {
            let s = session.clone();
            tokio::spawn(async move { s.submit("app").await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        let second = {
            let s = session.clone();
            tokio::spawn(async move { s.submit("apple").await })
        };

        assert!(matches!(second.await.unwrap(), SearchOutcome::Updated(1)));
        assert!(matches!(first.await.unwrap(), SearchOutcome::Superseded));
        let state = session.state().await;
        assert_eq!(state.query, "apple");
        assert_eq!(state.results[0].description, "apple");
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_only_sends_last_keystroke() {
        let (lookup, session) = session();
        let mut handles = Vec::new();
        for q in ["a", "ap", "apr"] {
            let s = session.clone();
            handles.push(tokio::spawn(async move { s.submit(q).await }));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let mut outcomes = Vec::new();
        for h in handles {
            outcomes.push(h.await.unwrap());
        }
        assert!(matches!(outcomes[0], SearchOutcome::Superseded));
        assert!(matches!(outcomes[1], SearchOutcome::Superseded));
        assert!(matches!(outcomes[2], SearchOutcome::Updated(1)));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_query_clears_without_request() {
        let (lookup, session) = session();
        assert!(matches!(session.submit("oats").await, SearchOutcome::Updated(1)));
        assert!(matches!(session.submit("   ").await, SearchOutcome::Cleared));
        assert_eq!(session.state().await, SearchState::default());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_reported_and_recorded() {
        let (_, session) = session();
        assert!(matches!(session.submit("boom").await, SearchOutcome::Failed(_)));
        assert!(session.state().await.error.is_some());
    }
}
