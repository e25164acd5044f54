//! Google Scholar pre-search via SerpAPI
//!
//! Supplies literature context for the research prompt. A failed or empty
//! search never fails the run; the pipeline records a degraded reason and
//! invokes the agent without pre-search context.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serpapi_search_rust::serp_api_search::SerpApiSearch;
use tracing::{debug, info};

use crate::models::LiteratureHit;
use crate::providers::{timed, LiteratureSearch};
use crate::types::{ProviderErrorKind, ProviderFailure, ProviderResult};

const PROVIDER: &str = "google-scholar";

pub struct ScholarClient {
    api_key: String,
    timeout: Duration,
}

impl ScholarClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self { api_key, timeout }
    }

    async fn run_search(&self, terms: &str, limit: usize) -> Result<Vec<LiteratureHit>, ProviderFailure> {
        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google_scholar".to_string());
        params.insert("q".to_string(), terms.to_string());
        params.insert("hl".to_string(), "en".to_string());
        params.insert("num".to_string(), limit.to_string());

        let search = SerpApiSearch::google(params, self.api_key.clone());
        let results = search.json().await.map_err(|e| {
            ProviderFailure::new(PROVIDER, ProviderErrorKind::Unknown, e.to_string())
        })?;

        debug!("Raw Scholar response received");

        let organic = match results.get("organic_results").and_then(|v| v.as_array()) {
            Some(arr) => arr.clone(),
            None => return Ok(Vec::new()),
        };

        let hits = organic
            .iter()
            .take(limit)
            .map(|result| {
                let publication_summary = result
                    .get("publication_info")
                    .and_then(|p| p.get("summary"))
                    .and_then(|v| v.as_str());

                LiteratureHit {
                    title: result
                        .get("title")
                        .and_then(|v| v.as_str())
                        .unwrap_or("Untitled")
                        .to_string(),
                    snippet: result
                        .get("snippet")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    link: result.get("link").and_then(|v| v.as_str()).map(String::from),
                    authors: publication_summary
                        .map(|s| s.split(" - ").next().unwrap_or(s).to_string()),
                    year: publication_summary.and_then(extract_year),
                }
            })
            .collect();

        Ok(hits)
    }
}

/// Pull a plausible publication year out of a "Authors - Journal, Year"
/// summary string.
fn extract_year(summary: &str) -> Option<i32> {
    summary
        .split(|c: char| !c.is_numeric())
        .find(|part| part.len() == 4)
        .and_then(|y| y.parse::<i32>().ok())
        .filter(|&y| (1900..=2100).contains(&y))
}

#[async_trait]
impl LiteratureSearch for ScholarClient {
    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(&self, terms: &str, limit: usize) -> ProviderResult<Vec<LiteratureHit>> {
        info!(terms = %terms, limit, "Searching Google Scholar via SerpAPI");
        let result = timed(PROVIDER, self.timeout, self.run_search(terms, limit)).await;
        if let Ok(hits) = &result.outcome {
            info!(count = hits.len(), "Scholar search completed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_extraction() {
        assert_eq!(extract_year("A Smith, B Jones - Nature, 2021"), Some(2021));
        assert_eq!(extract_year("C Lee - bioRxiv preprint"), None);
        // Implausible years are rejected as noise.
        assert_eq!(extract_year("D Kim - Journal, 1742"), None);
    }

    #[test]
    fn missing_key_means_unavailable() {
        let client = ScholarClient::new(String::new(), Duration::from_secs(5));
        assert!(!client.is_available());
        let client = ScholarClient::new("key".to_string(), Duration::from_secs(5));
        assert!(client.is_available());
    }
}
