//! Video production worker binary.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vreel_media::{check_ffmpeg, check_ffprobe};
use vreel_worker::{PipelineConfig, VideoPipeline};

const USAGE: &str =
    "usage: vreel-worker generate <topic...> | vreel-worker render --plan <file>";

/// What the process was asked to do.
#[derive(Debug, PartialEq)]
enum Mode {
    /// Plan and produce a video for a topic prompt.
    Generate(String),
    /// Re-render a persisted plan file.
    RenderPlan(PathBuf),
}

fn parse_args(args: &[String]) -> Result<Mode, String> {
    match args {
        [] => Err(USAGE.to_string()),
        [first, rest @ ..] if first == "generate" => {
            let topic = rest.join(" ");
            if topic.trim().is_empty() {
                Err(format!("generate needs a topic\n{USAGE}"))
            } else {
                Ok(Mode::Generate(topic))
            }
        }
        [first, flag, path] if first == "render" && flag == "--plan" => {
            Ok(Mode::RenderPlan(PathBuf::from(path)))
        }
        [first, ..] if first == "render" => Err(format!("render needs --plan <file>\n{USAGE}")),
        // A bare prompt is treated as a topic.
        _ => Ok(Mode::Generate(args.join(" "))),
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("vreel=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = match parse_args(&args) {
        Ok(mode) => mode,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    info!("Starting vreel-worker");

    if let Err(err) = run(mode).await {
        error!("Run failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run(mode: Mode) -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg().context("ffmpeg is required on PATH")?;
    let ffprobe = check_ffprobe().context("ffprobe is required on PATH")?;
    info!(
        ffmpeg = %ffmpeg.display(),
        ffprobe = %ffprobe.display(),
        "FFmpeg tooling found"
    );

    let config = PipelineConfig::from_env()?;
    tokio::fs::create_dir_all(&config.output_dir).await?;
    tokio::fs::create_dir_all(&config.plans_dir).await?;
    tokio::fs::create_dir_all(&config.temp_root).await?;

    let pipeline = VideoPipeline::new(config)?;

    let output = match mode {
        Mode::Generate(topic) => pipeline.run_generate(&topic).await?,
        Mode::RenderPlan(path) => pipeline.run_render_file(&path).await?,
    };

    info!(path = %output.display(), "Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_generate_mode_joins_topic_words() {
        let mode = parse_args(&args(&["generate", "why", "octopuses", "dream"])).unwrap();
        assert_eq!(mode, Mode::Generate("why octopuses dream".to_string()));
    }

    #[test]
    fn test_bare_topic_defaults_to_generate() {
        let mode = parse_args(&args(&["the", "history", "of", "tea"])).unwrap();
        assert_eq!(mode, Mode::Generate("the history of tea".to_string()));
    }

    #[test]
    fn test_render_mode_requires_plan_flag() {
        let mode = parse_args(&args(&["render", "--plan", "plans/tea_final.json"])).unwrap();
        assert_eq!(mode, Mode::RenderPlan(PathBuf::from("plans/tea_final.json")));

        assert!(parse_args(&args(&["render"])).is_err());
        assert!(parse_args(&args(&["render", "plans/tea_final.json"])).is_err());
    }

    #[test]
    fn test_no_args_is_usage_error() {
        assert!(parse_args(&[]).is_err());
    }

    #[test]
    fn test_generate_without_topic_is_error() {
        assert!(parse_args(&args(&["generate"])).is_err());
        assert!(parse_args(&args(&["generate", "  "])).is_err());
    }
}
