//! Pipeline orchestration.
//!
//! [`VideoPipeline`] owns the provider clients and drives a run end to end:
//! plan (or load a persisted plan), gather assets concurrently, assemble
//! segments, mix audio, render, and move the result into the output
//! directory. A run ends in exactly one of two states: an output file path,
//! or an explicit error.

pub mod assemble;
pub mod scene;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, Instrument};

use vreel_media::{
    mix_audio, move_file, render_final, FfmpegRunner, MixPolicy, RenderFallback, RenderRequest,
    ResourceMonitor,
};
use vreel_models::{sanitize_filename, RenderQualityProfile, VideoPlan};
use vreel_providers::{AsrClient, MusicClient, PlannerClient, StockClient, TtsClient, TtsProvider};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::pipeline::assemble::SegmentAssembler;
use crate::pipeline::scene::SceneGatherer;

/// Persona folded into the planner prompts when no persona file is set.
const DEFAULT_PERSONA: &str = "Your channel voice: a sharp, friendly explainer \
    who turns surprising facts into punchy sub-60-second stories for a broad \
    audience. Enthusiastic, never clickbait. Short sentences, concrete verbs.";

/// The full production pipeline for one configured process.
///
/// Construction validates keys and builds one shared HTTP client; the
/// pipeline itself is stateless across runs and can produce any number of
/// videos.
pub struct VideoPipeline {
    config: PipelineConfig,
    planner: PlannerClient,
    tts: TtsClient,
    asr: AsrClient,
    stock: Option<StockClient>,
    music: Option<MusicClient>,
    monitor: ResourceMonitor,
    runner: FfmpegRunner,
}

impl VideoPipeline {
    /// Build the pipeline from config.
    pub fn new(config: PipelineConfig) -> WorkerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| WorkerError::config_error(format!("HTTP client init failed: {err}")))?;

        let planner = PlannerClient::new(
            &config.openai_api_key,
            client.clone(),
            &config.creator_model,
            &config.critic_model,
        );

        let tts_key = match config.tts_provider {
            TtsProvider::OpenAi => config.openai_api_key.clone(),
            TtsProvider::Speechify => config.speechify_api_key.clone().ok_or_else(|| {
                WorkerError::config_error(
                    "SPEECHIFY_API_KEY is required when TTS_PROVIDER=speechify",
                )
            })?,
        };
        let tts = TtsClient::new(config.tts_provider, tts_key, &config.tts_voice, client.clone());

        let asr = AsrClient::new(&config.openai_api_key, client.clone());

        let stock = config
            .pexels_api_key
            .as_deref()
            .map(|key| StockClient::new(key, client.clone()));
        let music = config
            .pixabay_api_key
            .as_deref()
            .map(|key| MusicClient::new(key, client.clone()));

        let monitor = ResourceMonitor::new(config.resource_limits());
        let runner = FfmpegRunner::new().with_timeout(config.ffmpeg_timeout_secs);

        Ok(Self {
            config,
            planner,
            tts,
            asr,
            stock,
            music,
            monitor,
            runner,
        })
    }

    /// Full run: plan a video for `topic`, persist both plan passes, produce.
    pub async fn run_generate(&self, topic: &str) -> WorkerResult<PathBuf> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(WorkerError::planning_failed("topic is empty"));
        }

        let logger = RunLogger::new("plan");
        logger.log_start(&format!("Planning video for topic: {topic}"));

        let persona = self.load_persona().await?;
        let drafts = self.planner.generate_plan(topic, &persona).await?;

        let stem = sanitize_filename(&drafts.refined.video_title);
        self.persist_plan(&drafts.draft, &stem, "draft").await?;
        let plan_path = self.persist_plan(&drafts.refined, &stem, "final").await?;

        logger.log_completion(&format!(
            "Plan ready: '{}' ({} segments), persisted to {}",
            drafts.refined.video_title,
            drafts.refined.segments.len(),
            plan_path.display()
        ));

        self.produce(&drafts.refined).await
    }

    /// Re-render a persisted final plan without planning again.
    pub async fn run_render_file(&self, plan_path: &Path) -> WorkerResult<PathBuf> {
        let json = tokio::fs::read_to_string(plan_path).await.map_err(|err| {
            WorkerError::config_error(format!(
                "cannot read plan file {}: {err}",
                plan_path.display()
            ))
        })?;
        let plan = VideoPlan::from_json(&json)?;

        info!(
            title = %plan.video_title,
            segments = plan.segments.len(),
            "Loaded persisted plan"
        );
        self.produce(&plan).await
    }

    /// Produce a video from a validated plan.
    pub async fn produce(&self, plan: &VideoPlan) -> WorkerResult<PathBuf> {
        let logger = RunLogger::new("produce");
        let span = logger.create_span();
        self.produce_inner(plan, &logger).instrument(span).await
    }

    async fn produce_inner(&self, plan: &VideoPlan, logger: &RunLogger) -> WorkerResult<PathBuf> {
        logger.log_start(&format!(
            "Producing '{}' ({} segments)",
            plan.video_title,
            plan.segments.len()
        ));

        tokio::fs::create_dir_all(&self.config.temp_root).await?;
        let temp_dir = tempfile::Builder::new()
            .prefix("vreel_run_")
            .tempdir_in(&self.config.temp_root)?;
        let temp_path = temp_dir.path();

        let snapshot = self.monitor.sample().await;
        let max_segments = self.monitor.limits().recommended_max_segments(&snapshot);

        let gatherer = SceneGatherer::new(
            &self.tts,
            &self.asr,
            self.stock.as_ref(),
            temp_path,
            max_segments,
        );
        let music_future = async {
            match &self.music {
                Some(client) => {
                    client
                        .fetch_with_fallbacks(
                            plan.background_music_suggestion.as_deref(),
                            temp_path,
                        )
                        .await
                }
                None => None,
            }
        };

        let (scenes, music) = tokio::join!(gatherer.gather(plan), music_future);
        if self.music.is_some() && music.is_none() {
            metrics::record_fallback("music");
        }

        let usable = scenes.iter().filter(|s| !s.skipped).count();
        logger.stage("gather").log_progress(&format!(
            "Assets gathered: {usable}/{} scenes usable, music {}",
            scenes.len(),
            if music.is_some() { "found" } else { "absent" }
        ));

        let assembler = SegmentAssembler::new(&self.runner, &self.monitor, &self.config, temp_path);
        let assembled = assembler
            .assemble(plan, &scenes, max_segments, &logger.stage("assemble"))
            .await?;

        let mixed = temp_path.join("final_audio.m4a");
        let policy = MixPolicy {
            duck_volume: self.config.music_volume,
            total_duration: assembled.total_duration,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        };
        mix_audio(
            &self.runner,
            &assembled.audio_tracks,
            music.as_deref(),
            &policy,
            &mixed,
        )
        .await?;

        let snapshot = self.monitor.sample().await;
        let tier = self.monitor.limits().select_quality(&snapshot);
        let mut profile = RenderQualityProfile::for_tier(tier);
        if let Some(codec) = &self.config.video_codec_override {
            profile = profile.with_codec(codec);
        }

        let render_logger = logger.stage("render");
        render_logger.log_start(&format!(
            "Encoding {} segments at tier {tier} ({:.1} GB free)",
            assembled.segments.len(),
            snapshot.available_gb()
        ));

        let request = RenderRequest {
            segments: &assembled.segments,
            fades: &assembled.fades,
            audio: &mixed,
            visual_duration: assembled.visual_duration,
            total_duration: assembled.total_duration,
            width: self.config.canvas_width,
            height: self.config.canvas_height,
        };

        let render_path = temp_path.join("render.mp4");
        let started = Instant::now();
        let outcome = render_final(&self.runner, &request, &profile, &render_path).await?;
        metrics::record_render_seconds(started.elapsed().as_secs_f64());
        self.monitor.log_phase_delta("render", &snapshot).await;
        if outcome.fallback != RenderFallback::None {
            metrics::record_fallback("render");
            render_logger.log_warning(&format!("Encode degraded: {:?}", outcome.fallback));
        }

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let stem = sanitize_filename(&plan.video_title);
        let dest = self.config.output_dir.join(format!("{stem}.mp4"));
        move_file(&outcome.path, &dest).await?;

        logger.log_completion(&format!("Video written to {}", dest.display()));
        Ok(dest)
    }

    /// The persona text folded into the planner prompts.
    ///
    /// A configured persona file must exist and parse as JSON; anything
    /// else aborts the run instead of planning with the wrong voice.
    async fn load_persona(&self) -> WorkerResult<String> {
        let Some(path) = &self.config.persona_file else {
            return Ok(DEFAULT_PERSONA.to_string());
        };

        let text = tokio::fs::read_to_string(path).await.map_err(|err| {
            WorkerError::config_error(format!(
                "cannot read persona file {}: {err}",
                path.display()
            ))
        })?;
        serde_json::from_str::<serde_json::Value>(&text).map_err(|err| {
            WorkerError::config_error(format!(
                "persona file {} is not valid JSON: {err}",
                path.display()
            ))
        })?;

        info!(path = %path.display(), "Loaded brand persona");
        Ok(text)
    }

    async fn persist_plan(
        &self,
        plan: &VideoPlan,
        stem: &str,
        suffix: &str,
    ) -> WorkerResult<PathBuf> {
        tokio::fs::create_dir_all(&self.config.plans_dir).await?;
        let path = self.config.plans_dir.join(format!("{stem}_{suffix}.json"));
        let json = plan.to_json_pretty()?;
        tokio::fs::write(&path, json).await?;

        info!(path = %path.display(), "Plan persisted");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_persona_used_without_file() {
        let pipeline = VideoPipeline::new(PipelineConfig::default()).unwrap();
        let persona = pipeline.load_persona().await.unwrap();
        assert!(persona.contains("channel voice"));
    }

    #[tokio::test]
    async fn test_persona_file_must_be_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persona.json");
        std::fs::write(&path, "not json at all").unwrap();

        let mut config = PipelineConfig::default();
        config.persona_file = Some(path);
        let pipeline = VideoPipeline::new(config).unwrap();
        assert!(pipeline.load_persona().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_persona_file_is_config_error() {
        let mut config = PipelineConfig::default();
        config.persona_file = Some(PathBuf::from("/nonexistent/persona.json"));
        let pipeline = VideoPipeline::new(config).unwrap();

        let err = pipeline.load_persona().await.unwrap_err();
        assert!(err.to_string().contains("persona"));
    }

    #[tokio::test]
    async fn test_persona_file_text_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persona.json");
        std::fs::write(&path, r#"{"channel_name": "Deep Dive Daily"}"#).unwrap();

        let mut config = PipelineConfig::default();
        config.persona_file = Some(path);
        let pipeline = VideoPipeline::new(config).unwrap();

        let persona = pipeline.load_persona().await.unwrap();
        assert!(persona.contains("Deep Dive Daily"));
    }

    #[tokio::test]
    async fn test_plans_persist_under_stem_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.plans_dir = dir.path().to_path_buf();
        let pipeline = VideoPipeline::new(config).unwrap();

        let plan = VideoPlan::from_json(
            r#"{
                "video_title": "Tea: A Short History",
                "segments": [
                    {
                        "kind": "section",
                        "narration_text": "Tea crossed an ocean before it had a name.",
                        "visual_search_query": "tea plantation aerial"
                    }
                ]
            }"#,
        )
        .unwrap();

        let path = pipeline.persist_plan(&plan, "tea_history", "final").await.unwrap();
        assert!(path.ends_with("tea_history_final.json"));

        let written = std::fs::read_to_string(&path).unwrap();
        let reloaded = VideoPlan::from_json(&written).unwrap();
        assert_eq!(reloaded.video_title, "Tea: A Short History");
    }
}
