//! External movie-year lookup capability.
//!
//! One operation: given a normalized movie title, return an optional
//! release year. The TMDB-backed implementation is rate limited to four
//! requests per second on the caller side, caches results for the run,
//! and degrades to `None` on any failure, so a missing credential or a
//! flaky network never fails a run.

use log::{debug, info};
use serde::Deserialize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Minimum spacing between lookup requests (4 per second).
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(250);

const SEARCH_URL: &str = "https://api.themoviedb.org/3/search/movie";

/// The movie-year lookup capability.
pub trait YearLookup {
    /// Return the release year for a normalized movie title, if known.
    fn year_for(&self, title: &str) -> Option<u16>;
}

/// The absent capability: every lookup degrades to "year unknown".
pub struct NoLookup;

impl YearLookup for NoLookup {
    fn year_for(&self, _title: &str) -> Option<u16> {
        None
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    release_date: String,
}

/// TMDB-backed year lookup.
pub struct TmdbLookup {
    client: reqwest::blocking::Client,
    api_key: String,
    cache: RefCell<HashMap<String, Option<u16>>>,
    last_request: Cell<Option<Instant>>,
}

impl TmdbLookup {
    /// Build a lookup from the `TMDB_API_KEY` environment variable.
    /// Returns `None` when no credential is configured.
    pub fn from_env() -> Option<Self> {
        match std::env::var("TMDB_API_KEY") {
            Ok(key) if !key.is_empty() => Some(Self::new(key)),
            _ => None,
        }
    }

    /// Build a lookup with an explicit API key.
    pub fn new(api_key: String) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            cache: RefCell::new(HashMap::new()),
            last_request: Cell::new(None),
        }
    }

    fn throttle(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                std::thread::sleep(MIN_REQUEST_INTERVAL - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }

    fn query(&self, title: &str) -> Option<u16> {
        self.throttle();

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", title),
                ("include_adult", "false"),
            ])
            .send()
            .and_then(|r| r.error_for_status())
            .ok()?;

        let body: SearchResponse = response.json().ok()?;
        let first = body.results.first()?;
        let year: u16 = first.release_date.get(..4)?.parse().ok()?;
        info!("TMDB LOOKUP: '{}' -> {}", title, year);
        Some(year)
    }
}

impl YearLookup for TmdbLookup {
    fn year_for(&self, title: &str) -> Option<u16> {
        let cache_key = title.trim().to_lowercase();
        if let Some(cached) = self.cache.borrow().get(&cache_key) {
            return *cached;
        }

        let result = self.query(title);
        if result.is_none() {
            debug!("TMDB lookup found no year for '{}'", title);
        }
        self.cache.borrow_mut().insert(cache_key, result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_lookup_returns_none() {
        assert_eq!(NoLookup.year_for("Any Movie"), None);
    }

    #[test]
    fn test_release_date_year_extraction() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"results": [{"release_date": "2020-07-16"}, {"release_date": "1999-01-01"}]}"#,
        )
        .unwrap();
        let year: u16 = body.results[0].release_date[..4].parse().unwrap();
        assert_eq!(year, 2020);
    }

    #[test]
    fn test_missing_release_date_tolerated() {
        let body: SearchResponse =
            serde_json::from_str(r#"{"results": [{}]}"#).unwrap();
        assert_eq!(body.results[0].release_date, "");
        assert!(body.results[0].release_date.get(..4).is_none());
    }
}
