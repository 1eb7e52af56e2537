//! External service clients for the video pipeline.
//!
//! Everything the pipeline fetches from the network lives here: plan
//! generation and refinement ([`planner`]), speech synthesis ([`tts`]),
//! word-level transcription ([`asr`]), stock footage ([`stock`]) and
//! background music ([`music`]). Clients share bounded retries
//! ([`retry`]) and request metrics ([`metrics`]).

pub mod asr;
mod download;
pub mod error;
pub mod metrics;
pub mod music;
pub mod planner;
pub mod retry;
pub mod stock;
pub mod tts;

pub use asr::AsrClient;
pub use error::{ProviderError, ProviderResult};
pub use music::MusicClient;
pub use planner::{PlanDrafts, PlannerClient};
pub use retry::{retry_async, RetryConfig};
pub use stock::StockClient;
pub use tts::{TtsClient, TtsProvider};
