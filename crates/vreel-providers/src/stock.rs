//! Stock footage search and download (Pexels).

use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::download;
use crate::error::{ProviderError, ProviderResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

const PROVIDER: &str = "pexels";
const DEFAULT_BASE_URL: &str = "https://api.pexels.com";
const PER_PAGE: u32 = 15;

/// Pexels video search client.
pub struct StockClient {
    api_key: String,
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<StockVideo>,
}

#[derive(Debug, Deserialize)]
struct StockVideo {
    id: u64,
    #[serde(default)]
    video_files: Vec<StockVideoFile>,
}

#[derive(Debug, Deserialize)]
struct StockVideoFile {
    file_type: String,
    #[serde(default)]
    height: Option<u32>,
    link: String,
}

impl StockClient {
    /// Create a stock footage client.
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

    /// Search for portrait footage and download one random match.
    ///
    /// Returns the local path of the downloaded file. Retries are bounded;
    /// the caller substitutes a fallback clip when this fails.
    pub async fn search_and_download(
        &self,
        query: &str,
        dest_dir: &Path,
    ) -> ProviderResult<PathBuf> {
        let config = RetryConfig::new("stock_search");
        let attempt = std::sync::atomic::AtomicU32::new(0);

        retry_async(&config, || {
            if attempt.fetch_add(1, std::sync::atomic::Ordering::SeqCst) > 0 {
                metrics::record_retry(PROVIDER, "search_and_download");
            }
            self.fetch_once(query, dest_dir)
        })
        .await
    }

    async fn fetch_once(&self, query: &str, dest_dir: &Path) -> ProviderResult<PathBuf> {
        let started = Instant::now();
        let response = self
            .client
            .get(format!("{}/videos/search", self.base_url))
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("per_page", &PER_PAGE.to_string()),
                ("orientation", "portrait"),
                ("size", "medium"),
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
        if results.videos.is_empty() {
            return Err(ProviderError::no_results(PROVIDER, query));
        }

        // Random pick keeps repeated renders of similar plans from all
        // using the same clip.
        let pick = {
            let mut rng = rand::rng();
            rng.random_range(0..results.videos.len())
        };
        let video = &results.videos[pick];

        let file = best_file(&video.video_files)
            .ok_or_else(|| ProviderError::no_results(PROVIDER, query))?;

        let dest = dest_dir.join(format!("pexels_{}.mp4", video.id));
        self.download(&file.link, &dest).await?;

        debug!(query, video_id = video.id, dest = %dest.display(), "Stock clip downloaded");
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
                "stock download returned {status}"
            )));
        }

        let written = download::stream_to_file(response, dest).await?;
        if written == 0 {
            return Err(ProviderError::download_failed("stock download was empty"));
        }
        Ok(())
    }
}

/// Highest-resolution mp4 rendition.
fn best_file(files: &[StockVideoFile]) -> Option<&StockVideoFile> {
    files
        .iter()
        .filter(|f| f.file_type == "video/mp4")
        .max_by_key(|f| f.height.unwrap_or(0))
}
