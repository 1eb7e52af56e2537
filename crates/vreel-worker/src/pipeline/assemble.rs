//! Per-segment media assembly.
//!
//! Consumes gathered scene assets in plan order: the timeline is planned
//! first, then each placed segment runs its FFmpeg passes (normalize,
//! captions, composite) one at a time. Narration tracks are placed at their
//! timeline offsets for the mixer. FFmpeg work is strictly sequential here;
//! concurrency happens upstream during asset gathering.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use vreel_media::{
    build_cues, compose_segment, extract_audio_window, fallback_clip, jittered_caption_baseline,
    normalize_or_fallback, plan_timeline, render_ass_document, write_ass_file, AudioTrack,
    FfmpegRunner, PlannedSegment, ResourceMonitor, ResourceSnapshot, SegmentPlanInput,
};
use vreel_models::{PlanSegment, VideoPlan};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::pipeline::scene::SceneAssets;

/// Output of the assembly phase, ready for the mixer and the final encode.
#[derive(Debug)]
pub struct AssembledVideo {
    /// Composited segment clips in timeline order.
    pub segments: Vec<PathBuf>,

    /// Fade-in length per segment, same order.
    pub fades: Vec<f64>,

    /// Narration and pass-through source audio at timeline offsets.
    pub audio_tracks: Vec<AudioTrack>,

    /// Sum of placed segment durations.
    pub visual_duration: f64,

    /// Final output duration.
    pub total_duration: f64,
}

/// Runs the sequential per-segment FFmpeg work for one video.
pub struct SegmentAssembler<'a> {
    runner: &'a FfmpegRunner,
    monitor: &'a ResourceMonitor,
    config: &'a PipelineConfig,
    temp_dir: &'a Path,
}

impl<'a> SegmentAssembler<'a> {
    pub fn new(
        runner: &'a FfmpegRunner,
        monitor: &'a ResourceMonitor,
        config: &'a PipelineConfig,
        temp_dir: &'a Path,
    ) -> Self {
        Self {
            runner,
            monitor,
            config,
            temp_dir,
        }
    }

    /// Assemble all usable scenes into composited clips plus audio placement.
    ///
    /// Fails only when no scene survived gathering; every other problem
    /// degrades the affected segment and the run continues.
    pub async fn assemble(
        &self,
        plan: &VideoPlan,
        scenes: &[SceneAssets],
        max_segments: usize,
        logger: &RunLogger,
    ) -> WorkerResult<AssembledVideo> {
        let (kept, inputs) = timeline_inputs(plan, scenes);
        if kept.is_empty() {
            return Err(WorkerError::assembly_failed(
                "no usable scenes: every narrated scene failed synthesis",
            ));
        }

        let timeline = plan_timeline(&inputs, &self.config.timeline_policy(max_segments))?;
        info!(
            segments = timeline.segments.len(),
            visual = format!("{:.2}s", timeline.visual_duration),
            narration = format!("{:.2}s", timeline.narration_duration),
            total = format!("{:.2}s", timeline.total_duration),
            "Timeline planned"
        );

        let mut segments: Vec<PathBuf> = Vec::with_capacity(timeline.segments.len());
        let mut fades: Vec<f64> = Vec::with_capacity(timeline.segments.len());
        let mut audio_tracks: Vec<AudioTrack> = Vec::new();

        for placed in &timeline.segments {
            let scene_index = kept[placed.index];
            let scene = &scenes[scene_index];
            let segment = &plan.segments[scene_index];

            let clip = self
                .assemble_segment(scene_index, scene, segment, placed, &mut audio_tracks)
                .await?;
            segments.push(clip);
            fades.push(placed.fade_in);

            metrics::record_segment_processed();
            logger.log_progress(&format!(
                "Segment {}/{} composited",
                segments.len(),
                timeline.segments.len()
            ));
        }

        // Narration that lost its visual slot to the segment cap still
        // plays; the last frame holds underneath it. Stacking starts after
        // the visual runway, which can land past the planned total when
        // placed clips were padded to the minimum length, so the total
        // stretches to cover the last track.
        let mut tail_offset = timeline.visual_duration;
        for &scene_index in kept.iter().skip(timeline.segments.len()) {
            if let Some(narration) = &scenes[scene_index].narration {
                audio_tracks.push(AudioTrack {
                    path: narration.path.clone(),
                    offset: tail_offset,
                });
                tail_offset += narration.duration;
            }
        }
        let total_duration = timeline.total_duration.max(tail_offset);

        Ok(AssembledVideo {
            segments,
            fades,
            audio_tracks,
            visual_duration: timeline.visual_duration,
            total_duration,
        })
    }

    async fn assemble_segment(
        &self,
        scene_index: usize,
        scene: &SceneAssets,
        segment: &PlanSegment,
        placed: &PlannedSegment,
        audio_tracks: &mut Vec<AudioTrack>,
    ) -> WorkerResult<PathBuf> {
        let snapshot = self.monitor.sample().await;
        let spec = self.config.normalize_spec();

        let base = self.temp_dir.join(format!("segment_{scene_index}_base.mp4"));
        let window = match &scene.visual {
            Some(asset) => {
                normalize_or_fallback(self.runner, asset, placed.duration, &spec, &base).await?
            }
            None => {
                fallback_clip(self.runner, placed.duration, &spec, "No content available", &base)
                    .await?;
                None
            }
        };
        if window.is_none() {
            metrics::record_fallback("visual");
        }

        let caption_file = if self.monitor.limits().is_memory_critical(&snapshot) {
            warn!(
                scene_id = scene_index,
                available_gb = format!("{:.2}", snapshot.available_gb()),
                "Memory critical, captions skipped for this segment"
            );
            metrics::record_fallback("captions");
            None
        } else {
            self.caption_track(scene_index, scene, segment, &snapshot)
                .await?
        };

        let composed = self.temp_dir.join(format!("segment_{scene_index}.mp4"));
        let clip = compose_segment(
            self.runner,
            &base,
            segment.overlay_text(),
            caption_file.as_deref(),
            &self.config.caption_style,
            self.config.canvas_width,
            self.config.canvas_height,
            &composed,
        )
        .await?;

        if let Some(narration) = &scene.narration {
            audio_tracks.push(AudioTrack {
                path: narration.path.clone(),
                offset: placed.start,
            });
        } else if let (Some(asset), Some(window)) = (&scene.visual, &window) {
            // Silent scenes keep their source clip's own audio when it has
            // any; the extracted window matches the normalized video window.
            if asset.has_audio {
                let wav = self
                    .temp_dir
                    .join(format!("segment_{scene_index}_audio.wav"));
                match extract_audio_window(self.runner, asset, window, &wav).await {
                    Ok(path) => audio_tracks.push(AudioTrack {
                        path,
                        offset: placed.start,
                    }),
                    Err(err) => {
                        warn!(
                            scene_id = scene_index,
                            error = %err,
                            "Source audio extraction failed, span stays silent"
                        );
                    }
                }
            }
        }

        self.monitor
            .log_phase_delta(&format!("segment_{scene_index}"), &snapshot)
            .await;
        Ok(clip)
    }

    async fn caption_track(
        &self,
        scene_index: usize,
        scene: &SceneAssets,
        segment: &PlanSegment,
        snapshot: &ResourceSnapshot,
    ) -> WorkerResult<Option<PathBuf>> {
        let Some(narration) = &scene.narration else {
            return Ok(None);
        };
        if narration.word_timings.is_empty() {
            return Ok(None);
        }

        let style = &self.config.caption_style;
        let max_words = self.monitor.limits().max_caption_words(snapshot);
        let cues = build_cues(
            &narration.word_timings,
            segment.keywords(),
            style.words_per_group,
            max_words,
        );
        if cues.is_empty() {
            debug!(scene_id = scene_index, "All word timings filtered, no captions");
            return Ok(None);
        }

        let document = render_ass_document(
            &cues,
            style,
            self.config.canvas_width,
            self.config.canvas_height,
            jittered_caption_baseline(self.config.canvas_height),
        );
        let path = self.temp_dir.join(format!("captions_{scene_index}.ass"));
        write_ass_file(&document, &path).await?;

        debug!(scene_id = scene_index, cues = cues.len(), "Caption track written");
        Ok(Some(path))
    }
}

/// Map gathered scenes to timeline inputs, excluding skipped scenes.
///
/// The returned vectors are parallel: `kept[i]` is the plan index behind
/// `inputs[i]`, so placed segments map back to their scenes.
fn timeline_inputs(
    plan: &VideoPlan,
    scenes: &[SceneAssets],
) -> (Vec<usize>, Vec<SegmentPlanInput>) {
    let mut kept = Vec::with_capacity(scenes.len());
    let mut inputs = Vec::with_capacity(scenes.len());

    for scene in scenes {
        if scene.skipped {
            continue;
        }
        kept.push(scene.index);
        inputs.push(SegmentPlanInput {
            narration_duration: scene.narration.as_ref().map(|n| n.duration),
            estimated_duration: plan.segments[scene.index].duration_estimate(),
        });
    }

    (kept, inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vreel_models::{MotionHint, NarrationSegment};

    fn plan() -> VideoPlan {
        VideoPlan {
            video_title: "Why Ravens Remember Faces".to_string(),
            segments: vec![
                PlanSegment::Hook {
                    narration_text: String::new(),
                    visual_search_query: "raven close up eye".to_string(),
                    keywords_for_highlighting: vec![],
                    motion: MotionHint::ZoomIn,
                    duration_estimate_seconds: 2.5,
                    overlay_text: Some("They never forget".to_string()),
                },
                PlanSegment::Section {
                    title: Some("The experiment".to_string()),
                    narration_text: "Researchers wore masks while trapping wild ravens."
                        .to_string(),
                    visual_search_query: "scientist forest field work".to_string(),
                    keywords_for_highlighting: vec!["masks".to_string()],
                    motion: MotionHint::None,
                    duration_estimate_seconds: 4.0,
                },
                PlanSegment::CallToAction {
                    narration_text: "Follow for more bird science!".to_string(),
                    visual_search_query: "abstract background".to_string(),
                    overlay_text: None,
                },
            ],
            background_music_suggestion: None,
        }
    }

    fn narration(index: usize, duration: f64) -> NarrationSegment {
        NarrationSegment {
            scene_index: index,
            path: PathBuf::from(format!("narration_{index}.mp3")),
            duration,
            source_text: "text".to_string(),
            word_timings: vec![],
        }
    }

    #[test]
    fn test_timeline_inputs_prefer_measured_narration() {
        let plan = plan();
        let scenes = vec![
            SceneAssets {
                index: 0,
                narration: None,
                visual: None,
                skipped: false,
            },
            SceneAssets {
                index: 1,
                narration: Some(narration(1, 5.5)),
                visual: None,
                skipped: false,
            },
            SceneAssets {
                index: 2,
                narration: Some(narration(2, 2.1)),
                visual: None,
                skipped: false,
            },
        ];

        let (kept, inputs) = timeline_inputs(&plan, &scenes);
        assert_eq!(kept, vec![0, 1, 2]);
        assert_eq!(inputs[0].narration_duration, None);
        assert!((inputs[0].estimated_duration - 2.5).abs() < 1e-9);
        assert_eq!(inputs[1].narration_duration, Some(5.5));
        assert_eq!(inputs[2].narration_duration, Some(2.1));
    }

    #[test]
    fn test_timeline_inputs_exclude_skipped_scenes() {
        let plan = plan();
        let scenes = vec![
            SceneAssets {
                index: 0,
                narration: None,
                visual: None,
                skipped: false,
            },
            SceneAssets {
                index: 1,
                narration: None,
                visual: None,
                skipped: true,
            },
            SceneAssets {
                index: 2,
                narration: Some(narration(2, 3.0)),
                visual: None,
                skipped: false,
            },
        ];

        let (kept, inputs) = timeline_inputs(&plan, &scenes);
        assert_eq!(kept, vec![0, 2]);
        assert_eq!(inputs.len(), 2);
        // CTA estimate backs the second kept scene if its audio were lost.
        assert!((inputs[1].estimated_duration - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_timeline_inputs_empty_when_all_skipped() {
        let plan = plan();
        let scenes = vec![
            SceneAssets {
                index: 0,
                narration: None,
                visual: None,
                skipped: true,
            },
            SceneAssets {
                index: 1,
                narration: None,
                visual: None,
                skipped: true,
            },
        ];

        let (kept, inputs) = timeline_inputs(&plan, &scenes);
        assert!(kept.is_empty());
        assert!(inputs.is_empty());
    }
}
