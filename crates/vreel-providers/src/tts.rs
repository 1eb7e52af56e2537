//! Text-to-speech synthesis.
//!
//! The provider is chosen once at run start from configuration and never
//! switches mid-run, so every narration clip in one video carries the same
//! voice.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const SPEECHIFY_BASE_URL: &str = "https://api.sws.speechify.com";
const OPENAI_TTS_MODEL: &str = "tts-1-hd";

/// Which synthesis backend a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProvider {
    OpenAi,
    Speechify,
}

impl TtsProvider {
    /// Default voice for this provider.
    pub fn default_voice(&self) -> &'static str {
        match self {
            TtsProvider::OpenAi => "shimmer",
            TtsProvider::Speechify => "Matthew",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TtsProvider::OpenAi => "openai_tts",
            TtsProvider::Speechify => "speechify",
        }
    }

    fn file_extension(&self) -> &'static str {
        match self {
            TtsProvider::OpenAi => "mp3",
            TtsProvider::Speechify => "wav",
        }
    }
}

impl FromStr for TtsProvider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(TtsProvider::OpenAi),
            "speechify" => Ok(TtsProvider::Speechify),
            other => Err(ProviderError::config(format!(
                "unknown TTS provider '{other}', expected 'openai' or 'speechify'"
            ))),
        }
    }
}

impl std::fmt::Display for TtsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TtsProvider::OpenAi => write!(f, "openai"),
            TtsProvider::Speechify => write!(f, "speechify"),
        }
    }
}

/// TTS client bound to one provider and voice for the whole run.
pub struct TtsClient {
    provider: TtsProvider,
    api_key: String,
    voice: String,
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct OpenAiSpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

#[derive(Debug, Serialize)]
struct SpeechifyRequest<'a> {
    input: &'a str,
    voice_id: &'a str,
    audio_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct SpeechifyResponse {
    audio_data: String,
}

impl TtsClient {
    /// Create a client for the given provider.
    pub fn new(
        provider: TtsProvider,
        api_key: impl Into<String>,
        voice: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = match provider {
            TtsProvider::OpenAi => OPENAI_BASE_URL,
            TtsProvider::Speechify => SPEECHIFY_BASE_URL,
        };
        Self {
            provider,
            api_key: api_key.into(),
            voice: voice.into(),
            client,
            base_url: base_url.to_string(),
        }
    }

    /// Point the client at a different endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The provider this client is locked to.
    pub fn provider(&self) -> TtsProvider {
        self.provider
    }

    /// Synthesize `text` to `output_base` plus the provider's extension.
    ///
    /// Returns the path actually written. Duration is NOT reported here;
    /// callers measure the decoded file themselves.
    pub async fn synthesize(&self, text: &str, output_base: &Path) -> ProviderResult<PathBuf> {
        let output = output_base.with_extension(self.provider.file_extension());
        let config = RetryConfig::new(format!("tts_{}", self.provider));

        let attempt = std::sync::atomic::AtomicU32::new(0);
        retry_async(&config, || {
            if attempt.fetch_add(1, std::sync::atomic::Ordering::SeqCst) > 0 {
                metrics::record_retry(self.provider.name(), "synthesize");
            }
            async {
                let audio = match self.provider {
                    TtsProvider::OpenAi => self.synthesize_openai(text).await?,
                    TtsProvider::Speechify => self.synthesize_speechify(text).await?,
                };

                if audio.is_empty() {
                    return Err(ProviderError::EmptyResponse(self.provider.name()));
                }

                tokio::fs::write(&output, &audio).await?;
                debug!(
                    provider = %self.provider,
                    bytes = audio.len(),
                    output = %output.display(),
                    "Narration synthesized"
                );
                Ok(output.clone())
            }
        })
        .await
    }

    async fn synthesize_openai(&self, text: &str) -> ProviderResult<Vec<u8>> {
        let request = OpenAiSpeechRequest {
            model: OPENAI_TTS_MODEL,
            voice: &self.voice,
            input: text,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        metrics::record_request(
            self.provider.name(),
            "synthesize",
            status.as_u16(),
            started.elapsed().as_millis() as f64,
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(
                self.provider.name(),
                status.as_u16(),
                body,
            ));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn synthesize_speechify(&self, text: &str) -> ProviderResult<Vec<u8>> {
        let request = SpeechifyRequest {
            input: text,
            voice_id: &self.voice,
            audio_format: "wav",
        };

        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        metrics::record_request(
            self.provider.name(),
            "synthesize",
            status.as_u16(),
            started.elapsed().as_millis() as f64,
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(
                self.provider.name(),
                status.as_u16(),
                body,
            ));
        }

        let payload: SpeechifyResponse = response.json().await?;
        BASE64
            .decode(payload.audio_data.as_bytes())
            .map_err(|e| ProviderError::download_failed(format!("bad speechify audio: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!(
            TtsProvider::from_str("openai").unwrap(),
            TtsProvider::OpenAi
        );
        assert_eq!(
            TtsProvider::from_str("Speechify").unwrap(),
            TtsProvider::Speechify
        );
        assert!(TtsProvider::from_str("espeak").is_err());
    }

    #[test]
    fn test_default_voices() {
        assert_eq!(TtsProvider::OpenAi.default_voice(), "shimmer");
        assert_eq!(TtsProvider::Speechify.default_voice(), "Matthew");
    }

    #[test]
    fn test_file_extensions_per_provider() {
        assert_eq!(TtsProvider::OpenAi.file_extension(), "mp3");
        assert_eq!(TtsProvider::Speechify.file_extension(), "wav");
    }
}
