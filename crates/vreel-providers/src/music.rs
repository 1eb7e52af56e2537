//! Background music search and download (Pixabay).

use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::download;
use crate::error::{ProviderError, ProviderResult};
use crate::metrics;

const PROVIDER: &str = "pixabay";
const DEFAULT_BASE_URL: &str = "https://pixabay.com/api";
const PER_PAGE: u32 = 20;

/// Tracks shorter than this loop too obviously under a minute of narration.
const MIN_TRACK_SECONDS: f64 = 30.0;

/// Downloads smaller than this are error pages, not audio.
const MIN_TRACK_BYTES: u64 = 10 * 1024;

/// Terms worth keeping when a plan's music suggestion is too specific
/// for a stock library search.
const MUSIC_VOCAB: &[&str] = &[
    "acoustic",
    "ambient",
    "beat",
    "calm",
    "chill",
    "cinematic",
    "corporate",
    "dramatic",
    "electronic",
    "energetic",
    "epic",
    "funk",
    "groove",
    "guitar",
    "happy",
    "hip",
    "hop",
    "inspiring",
    "jazz",
    "lofi",
    "mellow",
    "motivational",
    "piano",
    "pop",
    "relaxing",
    "rock",
    "synth",
    "upbeat",
    "uplifting",
];

/// Pixabay music search client.
pub struct MusicClient {
    api_key: String,
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<MusicHit>,
}

#[derive(Debug, Deserialize)]
struct MusicHit {
    id: u64,
    #[serde(default)]
    duration: f64,
    #[serde(rename = "downloadURL", default)]
    download_url: Option<String>,
}

impl MusicClient {
    /// Create a music client.
    pub fn new(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Try the plan's suggestion, then progressively generic queries.
    ///
    /// Music is optional: every query failing yields `None`, never an
    /// error, and the final video ships without a music bed.
    pub async fn fetch_with_fallbacks(
        &self,
        suggestion: Option<&str>,
        dest_dir: &Path,
    ) -> Option<PathBuf> {
        for query in fallback_queries(suggestion) {
            match self.search_and_download(&query, dest_dir).await {
                Ok(path) => {
                    debug!(query, path = %path.display(), "Music track downloaded");
                    return Some(path);
                }
                Err(err) => {
                    warn!(query, error = %err, "Music query failed, trying next");
                }
            }
        }

        warn!("All music queries failed, continuing without music");
        None
    }

    /// Search for a track of usable length and download a random match.
    pub async fn search_and_download(
        &self,
        query: &str,
        dest_dir: &Path,
    ) -> ProviderResult<PathBuf> {
        let started = Instant::now();
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", query),
                ("media_type", "music"),
                ("safesearch", "true"),
                ("per_page", &PER_PAGE.to_string()),
                ("category", "music"),
            ])
            .send()
            .await?;

        let status = response.status();
        metrics::record_request(
            PROVIDER,
            "search",
            status.as_u16(),
            started.elapsed().as_millis() as f64,
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(PROVIDER, status.as_u16(), body));
        }

        let results: SearchResponse = response.json().await?;
        let usable: Vec<&MusicHit> = results
            .hits
            .iter()
            .filter(|h| h.duration >= MIN_TRACK_SECONDS && h.download_url.is_some())
            .collect();

        if usable.is_empty() {
            return Err(ProviderError::no_results(PROVIDER, query));
        }

        let pick = {
            let mut rng = rand::rng();
            rng.random_range(0..usable.len())
        };
        let hit = usable[pick];
        let url = hit
            .download_url
            .as_deref()
            .ok_or_else(|| ProviderError::no_results(PROVIDER, query))?;

        let dest = dest_dir.join(format!("pixabay_music_{}.mp3", hit.id));
        self.download(url, &dest).await?;
        Ok(dest)
    }

    async fn download(&self, url: &str, dest: &Path) -> ProviderResult<()> {
        let started = Instant::now();
        let response = self.client.get(url).send().await?;

        let status = response.status();
        metrics::record_request(
            PROVIDER,
            "download",
            status.as_u16(),
            started.elapsed().as_millis() as f64,
        );

        if !status.is_success() {
            return Err(ProviderError::download_failed(format!(
                "music download returned {status}"
            )));
        }

        let written = download::stream_to_file(response, dest).await?;
        if written < MIN_TRACK_BYTES {
            return Err(ProviderError::download_failed(format!(
                "music download too small ({written} bytes)"
            )));
        }
        Ok(())
    }
}

/// Ordered, deduplicated query chain for one suggestion.
fn fallback_queries(suggestion: Option<&str>) -> Vec<String> {
    let mut queries = Vec::new();

    if let Some(raw) = suggestion {
        let raw = raw.trim();
        if !raw.is_empty() {
            queries.push(raw.to_lowercase());
            if let Some(simplified) = simplify_query(raw) {
                queries.push(simplified);
            }
        }
    }

    queries.push("background music".to_string());
    queries.push("instrumental".to_string());
    queries.push("music".to_string());

    let mut seen = std::collections::HashSet::new();
    queries.retain(|q| seen.insert(q.clone()));
    queries
}

/// Keep only library-friendly terms, at most two of them.
fn simplify_query(raw: &str) -> Option<String> {
    let kept: Vec<String> = raw
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_ascii_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| MUSIC_VOCAB.contains(&w.as_str()))
        .take(2)
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_chain_includes_suggestion_first() {
        let queries = fallback_queries(Some("Upbeat Synthwave Chase"));
        assert_eq!(queries[0], "upbeat synthwave chase");
        assert_eq!(queries[1], "upbeat");
        assert!(queries.contains(&"background music".to_string()));
        assert_eq!(queries.last().map(String::as_str), Some("music"));
    }

    #[test]
    fn test_fallback_chain_without_suggestion() {
        let queries = fallback_queries(None);
        assert_eq!(queries, vec!["background music", "instrumental", "music"]);
    }

    #[test]
    fn test_fallback_chain_deduplicates() {
        let queries = fallback_queries(Some("music"));
        assert_eq!(queries.iter().filter(|q| q.as_str() == "music").count(), 1);
    }

    #[test]
    fn test_simplify_keeps_known_terms_only() {
        assert_eq!(
            simplify_query("dark dramatic orchestral tension"),
            Some("dramatic".to_string())
        );
        assert_eq!(
            simplify_query("upbeat, energetic electro swing!"),
            Some("upbeat energetic".to_string())
        );
        assert_eq!(simplify_query("xylophone quartet"), None);
    }
}
