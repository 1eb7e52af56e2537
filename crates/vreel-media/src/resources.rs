//! System resource sampling and adaptive limits.
//!
//! Scene fan-out width, caption word caps, and the render quality tier all
//! follow the memory and CPU headroom measured at runtime, so a run on a
//! small container degrades instead of getting OOM-killed.

use std::sync::Mutex;
use sysinfo::System;
use tracing::debug;

use vreel_models::QualityTier;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Point-in-time view of system memory and CPU.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSnapshot {
    /// Total physical memory in bytes
    pub total_bytes: u64,
    /// Available memory in bytes
    pub available_bytes: u64,
    /// Used memory in bytes
    pub used_bytes: u64,
    /// Global CPU utilization, 0.0 to 100.0
    pub cpu_percent: f32,
}

impl ResourceSnapshot {
    /// Available memory in GiB.
    pub fn available_gb(&self) -> f64 {
        self.available_bytes as f64 / BYTES_PER_GB
    }

    /// Total memory in GiB.
    pub fn total_gb(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_GB
    }

    /// Used memory in GiB.
    pub fn used_gb(&self) -> f64 {
        self.used_bytes as f64 / BYTES_PER_GB
    }
}

/// Thresholds governing adaptive behavior.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Fraction of total memory treated as the safe working ceiling.
    pub safe_ceiling_fraction: f64,
    /// Fraction of the ceiling beyond which memory is critical.
    pub critical_fraction: f64,
    /// Available GiB and CPU % required for the High quality tier.
    pub high_tier_mem_gb: f64,
    pub high_tier_cpu_pct: f32,
    /// Available GiB and CPU % required for the Medium quality tier.
    pub medium_tier_mem_gb: f64,
    pub medium_tier_cpu_pct: f32,
    /// Available GiB above which the full caption word budget applies.
    pub caption_mem_gb: f64,
    /// Caption word budgets above and below `caption_mem_gb`.
    pub caption_words_full: usize,
    pub caption_words_reduced: usize,
    /// Available-GiB floors paired with the segment count granted above
    /// each, checked in order.
    pub segment_tiers: Vec<(f64, usize)>,
    /// Segment count when available memory sits below every tier floor.
    pub segment_floor: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            safe_ceiling_fraction: 0.75,
            critical_fraction: 0.90,
            high_tier_mem_gb: 3.0,
            high_tier_cpu_pct: 70.0,
            medium_tier_mem_gb: 1.5,
            medium_tier_cpu_pct: 85.0,
            caption_mem_gb: 2.0,
            caption_words_full: 100,
            caption_words_reduced: 50,
            segment_tiers: vec![(4.0, 10), (2.5, 7), (1.5, 5), (0.8, 3)],
            segment_floor: 2,
        }
    }
}

impl ResourceLimits {
    /// How many segments a run should carry at this memory level.
    ///
    /// The same number bounds concurrent asset gathering and the timeline
    /// length; segments beyond it are dropped from the tail.
    pub fn recommended_max_segments(&self, snapshot: &ResourceSnapshot) -> usize {
        let avail_gb = snapshot.available_gb();
        for &(floor_gb, count) in &self.segment_tiers {
            if avail_gb > floor_gb {
                return count;
            }
        }
        self.segment_floor
    }

    /// Maximum words rendered as captions at this memory level.
    pub fn max_caption_words(&self, snapshot: &ResourceSnapshot) -> usize {
        if snapshot.available_gb() > self.caption_mem_gb {
            self.caption_words_full
        } else {
            self.caption_words_reduced
        }
    }

    /// Pick the render quality tier for the current headroom.
    pub fn select_quality(&self, snapshot: &ResourceSnapshot) -> QualityTier {
        let avail_gb = snapshot.available_gb();
        if avail_gb > self.high_tier_mem_gb && snapshot.cpu_percent < self.high_tier_cpu_pct {
            QualityTier::High
        } else if avail_gb > self.medium_tier_mem_gb
            && snapshot.cpu_percent < self.medium_tier_cpu_pct
        {
            QualityTier::Medium
        } else {
            QualityTier::Low
        }
    }

    /// Whether memory use has crossed into the critical band.
    ///
    /// The working ceiling is `safe_ceiling_fraction` of total memory;
    /// usage beyond `critical_fraction` of that ceiling is critical.
    pub fn is_memory_critical(&self, snapshot: &ResourceSnapshot) -> bool {
        let ceiling = snapshot.total_bytes as f64 * self.safe_ceiling_fraction;
        snapshot.used_bytes as f64 > ceiling * self.critical_fraction
    }
}

/// Samples system memory and CPU via sysinfo.
pub struct ResourceMonitor {
    system: Mutex<System>,
    limits: ResourceLimits,
}

impl ResourceMonitor {
    /// Create a monitor with the given limits.
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            system: Mutex::new(System::new()),
            limits,
        }
    }

    /// The thresholds this monitor applies.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Take a fresh snapshot of memory and CPU.
    ///
    /// CPU utilization needs two refreshes separated by sysinfo's minimum
    /// interval, so this sleeps briefly.
    pub async fn sample(&self) -> ResourceSnapshot {
        {
            let mut sys = self.system.lock().unwrap_or_else(|e| e.into_inner());
            sys.refresh_memory();
            sys.refresh_cpu_usage();
        }

        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;

        let snapshot = {
            let mut sys = self.system.lock().unwrap_or_else(|e| e.into_inner());
            sys.refresh_cpu_usage();
            ResourceSnapshot {
                total_bytes: sys.total_memory(),
                available_bytes: sys.available_memory(),
                used_bytes: sys.used_memory(),
                cpu_percent: sys.global_cpu_usage(),
            }
        };

        debug!(
            available_gb = format!("{:.2}", snapshot.available_gb()),
            cpu_percent = format!("{:.1}", snapshot.cpu_percent),
            "Resource snapshot"
        );

        snapshot
    }

    /// Sample and report whether memory is critical.
    pub async fn memory_critical(&self) -> bool {
        let snapshot = self.sample().await;
        self.limits.is_memory_critical(&snapshot)
    }

    /// Re-sample after a heavy phase and log how memory moved.
    pub async fn log_phase_delta(&self, phase: &str, before: &ResourceSnapshot) {
        let after = self.sample().await;
        debug!(
            phase,
            used_before_gb = format!("{:.1}", before.used_gb()),
            used_after_gb = format!("{:.1}", after.used_gb()),
            delta_gb = format!("{:+.1}", after.used_gb() - before.used_gb()),
            "Phase resource delta"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(total_gb: f64, available_gb: f64, cpu: f32) -> ResourceSnapshot {
        let total = (total_gb * BYTES_PER_GB) as u64;
        let available = (available_gb * BYTES_PER_GB) as u64;
        ResourceSnapshot {
            total_bytes: total,
            available_bytes: available,
            used_bytes: total - available,
            cpu_percent: cpu,
        }
    }

    #[test]
    fn test_concurrency_tiers() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.recommended_max_segments(&snapshot(16.0, 8.0, 10.0)), 10);
        assert_eq!(limits.recommended_max_segments(&snapshot(8.0, 3.0, 10.0)), 7);
        assert_eq!(limits.recommended_max_segments(&snapshot(4.0, 2.0, 10.0)), 5);
        assert_eq!(limits.recommended_max_segments(&snapshot(2.0, 1.0, 10.0)), 3);
        assert_eq!(limits.recommended_max_segments(&snapshot(1.0, 0.5, 10.0)), 2);
    }

    #[test]
    fn test_quality_selection() {
        let limits = ResourceLimits::default();
        assert_eq!(
            limits.select_quality(&snapshot(16.0, 8.0, 30.0)),
            QualityTier::High
        );
        // Plenty of memory but a busy CPU drops to Medium.
        assert_eq!(
            limits.select_quality(&snapshot(16.0, 8.0, 75.0)),
            QualityTier::Medium
        );
        assert_eq!(
            limits.select_quality(&snapshot(4.0, 2.0, 30.0)),
            QualityTier::Medium
        );
        assert_eq!(
            limits.select_quality(&snapshot(2.0, 1.0, 95.0)),
            QualityTier::Low
        );
    }

    #[test]
    fn test_memory_critical_band() {
        let limits = ResourceLimits::default();
        // Ceiling for 10 GiB total is 7.5 GiB; critical above 6.75 GiB used.
        assert!(!limits.is_memory_critical(&snapshot(10.0, 4.0, 0.0)));
        assert!(limits.is_memory_critical(&snapshot(10.0, 3.0, 0.0)));
    }

    #[test]
    fn test_caption_word_budget() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.max_caption_words(&snapshot(8.0, 4.0, 0.0)), 100);
        assert_eq!(limits.max_caption_words(&snapshot(4.0, 1.0, 0.0)), 50);
    }
}
