//! Concurrent per-scene asset gathering.
//!
//! Every scene needs narration (TTS + duration probe + word timings) and
//! stock footage (search + download + probe). Both are network-bound, so
//! scenes fan out as independent futures under a semaphore; a failure in
//! one scene degrades that scene only and never cancels its siblings.
//! Results come back in plan order regardless of completion order.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use vreel_media::{probe_asset, probe_audio_duration};
use vreel_models::{MediaAsset, NarrationSegment, PlanSegment, VideoPlan};
use vreel_providers::{AsrClient, StockClient, TtsClient};

use crate::metrics;

/// Everything gathered for one scene before assembly.
#[derive(Debug)]
pub struct SceneAssets {
    /// Index of the scene in plan order.
    pub index: usize,

    /// Synthesized narration; `None` when the scene is silent or synthesis
    /// failed.
    pub narration: Option<NarrationSegment>,

    /// Downloaded stock footage; `None` means the assembler substitutes a
    /// flat fallback clip.
    pub visual: Option<MediaAsset>,

    /// Set when a narrated scene failed synthesis; the assembler excludes
    /// skipped scenes from the timeline.
    pub skipped: bool,
}

/// Fans out asset gathering for all scenes of a plan.
pub struct SceneGatherer<'a> {
    tts: &'a TtsClient,
    asr: &'a AsrClient,
    stock: Option<&'a StockClient>,
    temp_dir: &'a Path,
    max_parallel: usize,
}

impl<'a> SceneGatherer<'a> {
    pub fn new(
        tts: &'a TtsClient,
        asr: &'a AsrClient,
        stock: Option<&'a StockClient>,
        temp_dir: &'a Path,
        max_parallel: usize,
    ) -> Self {
        Self {
            tts,
            asr,
            stock,
            temp_dir,
            max_parallel,
        }
    }

    /// Gather narration and footage for every scene of the plan.
    ///
    /// Always returns one entry per plan segment, in plan order.
    pub async fn gather(&self, plan: &VideoPlan) -> Vec<SceneAssets> {
        let sem = Arc::new(Semaphore::new(self.max_parallel.max(1)));

        let scene_futures: Vec<_> = plan
            .segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let sem = sem.clone();
                async move {
                    let _permit = sem.acquire().await.expect("semaphore closed");
                    self.gather_scene(index, segment).await
                }
            })
            .collect();

        join_all(scene_futures).await
    }

    async fn gather_scene(&self, index: usize, segment: &PlanSegment) -> SceneAssets {
        debug!(scene_id = index, kind = segment.kind(), "Gathering scene assets");

        let (narration, visual) = tokio::join!(
            self.gather_narration(index, segment),
            self.gather_visual(index, segment)
        );

        let skipped = segment.has_narration() && narration.is_none();
        if skipped {
            warn!(scene_id = index, "Scene dropped, narration unavailable");
        }

        SceneAssets {
            index,
            narration,
            visual,
            skipped,
        }
    }

    async fn gather_narration(
        &self,
        index: usize,
        segment: &PlanSegment,
    ) -> Option<NarrationSegment> {
        let text = segment.narration_text().trim();
        if text.is_empty() {
            return None;
        }

        let base = self.temp_dir.join(format!("narration_{index}"));
        let path = match self.tts.synthesize(text, &base).await {
            Ok(path) => path,
            Err(err) => {
                warn!(scene_id = index, error = %err, "Narration synthesis failed");
                metrics::record_fallback("tts");
                return None;
            }
        };

        // Durations reported by TTS providers are never trusted; only the
        // decoded file counts.
        let duration = match probe_audio_duration(&path).await {
            Ok(duration) if duration > 0.0 => duration,
            Ok(_) => {
                warn!(scene_id = index, "Narration decoded to zero duration");
                metrics::record_fallback("tts");
                return None;
            }
            Err(err) => {
                warn!(scene_id = index, error = %err, "Narration file unreadable");
                metrics::record_fallback("tts");
                return None;
            }
        };

        let word_timings = match self.asr.transcribe_words(&path).await {
            Ok(timings) => timings,
            Err(err) => {
                warn!(
                    scene_id = index,
                    error = %err,
                    "Transcription failed, scene renders without captions"
                );
                metrics::record_fallback("captions");
                Vec::new()
            }
        };

        info!(
            scene_id = index,
            duration = format!("{duration:.2}s"),
            words = word_timings.len(),
            "Narration ready"
        );

        Some(NarrationSegment {
            scene_index: index,
            path,
            duration,
            source_text: text.to_string(),
            word_timings,
        })
    }

    async fn gather_visual(&self, index: usize, segment: &PlanSegment) -> Option<MediaAsset> {
        let stock = self.stock?;

        let query = segment.visual_search_query();
        let path = match stock.search_and_download(query, self.temp_dir).await {
            Ok(path) => path,
            Err(err) => {
                warn!(scene_id = index, query, error = %err, "Stock search failed");
                return None;
            }
        };

        match probe_asset(&path).await {
            Ok(asset) => {
                debug!(
                    scene_id = index,
                    width = asset.width,
                    height = asset.height,
                    duration = format!("{:.2}s", asset.duration),
                    "Footage ready"
                );
                Some(asset)
            }
            Err(err) => {
                warn!(
                    scene_id = index,
                    path = %path.display(),
                    error = %err,
                    "Downloaded footage unreadable"
                );
                None
            }
        }
    }
}
