//! Speech-to-text word timings for caption sync.

use std::path::Path;
use std::time::Instant;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use vreel_models::WordTiming;

use crate::error::{ProviderError, ProviderResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

const PROVIDER: &str = "asr";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "whisper-1";

/// Transcription client returning per-word timestamps.
pub struct AsrClient {
    api_key: String,
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    words: Vec<TranscribedWord>,
}

#[derive(Debug, Deserialize)]
struct TranscribedWord {
    word: String,
    start: f64,
    end: f64,
}

impl AsrClient {
    /// Create a transcription client.
    pub fn new(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Point the client at a different endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Transcribe an audio file into word timings.
    ///
    /// Callers treat a failure as "no captions for this segment"; nothing
    /// here is fatal to a run.
    pub async fn transcribe_words(&self, audio_path: &Path) -> ProviderResult<Vec<WordTiming>> {
        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        let mime = mime_for(audio_path);

        let config = RetryConfig::new("asr_transcribe");
        let attempt = std::sync::atomic::AtomicU32::new(0);
        let timings = retry_async(&config, || {
            if attempt.fetch_add(1, std::sync::atomic::Ordering::SeqCst) > 0 {
                metrics::record_retry(PROVIDER, "transcribe");
            }
            async {
                // Multipart forms are single-use; rebuild per attempt.
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)
                    .map_err(ProviderError::Http)?;
                let form = Form::new()
                    .part("file", part)
                    .text("model", self.model.clone())
                    .text("response_format", "verbose_json")
                    .text("timestamp_granularities[]", "word");

                let started = Instant::now();
                let response = self
                    .client
                    .post(format!("{}/v1/audio/transcriptions", self.base_url))
                    .bearer_auth(&self.api_key)
                    .multipart(form)
                    .send()
                    .await?;

                let status = response.status();
                metrics::record_request(
                    PROVIDER,
                    "transcribe",
                    status.as_u16(),
                    started.elapsed().as_millis() as f64,
                );

                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ProviderError::api(PROVIDER, status.as_u16(), body));
                }

                let transcription: VerboseTranscription = response.json().await?;
                Ok(transcription
                    .words
                    .into_iter()
                    .map(|w| WordTiming::new(w.word, w.start, w.end))
                    .collect::<Vec<_>>())
            }
        })
        .await?;

        debug!(
            audio = %audio_path.display(),
            words = timings.len(),
            "Transcription complete"
        );
        Ok(timings)
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}
