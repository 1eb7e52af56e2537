//! Automated short-form video production worker.
//!
//! This crate provides:
//! - Pipeline orchestration: plan, gather, assemble, mix, render
//! - Concurrent per-scene asset gathering with bounded parallelism
//! - Environment-driven configuration
//! - Run-scoped logging and pipeline metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::RunLogger;
pub use pipeline::assemble::{AssembledVideo, SegmentAssembler};
pub use pipeline::scene::{SceneAssets, SceneGatherer};
pub use pipeline::VideoPipeline;
