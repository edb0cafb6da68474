//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Release lifecycle (transitions, working set, stalled releases)
//! - Agents (poll failures, submissions)
//! - Upload and intake decisions
//! - Sample queue back-pressure

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Release lifecycle
// =============================================================================

/// Release transitions by target state.
pub static RELEASE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atus_release_transitions_total",
            "Total release state transitions",
        ),
        &["state"],
    )
    .unwrap()
});

/// Releases currently in the live working set.
pub static WORKING_SET_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "atus_working_set_size",
        "Number of non-terminal releases tracked in memory",
    )
    .unwrap()
});

/// Downloading releases whose agent has been unreachable for too long.
pub static RELEASES_STALLED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "atus_releases_stalled",
        "Downloading releases whose assigned agent is unreachable",
    )
    .unwrap()
});

// =============================================================================
// Agents
// =============================================================================

/// Failed agent polls by agent and poll kind.
pub static AGENT_POLL_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atus_agent_poll_failures_total",
            "Total failed agent polls",
        ),
        &["agent", "kind"], // "statistics", "list", "meta_files"
    )
    .unwrap()
});

/// Structure submissions to agents by result.
pub static AGENT_SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atus_agent_submissions_total",
            "Total structure submissions to agents",
        ),
        &["result"], // "accepted", "failed", "hash_mismatch"
    )
    .unwrap()
});

// =============================================================================
// Upload
// =============================================================================

/// Upload attempts by result.
pub static UPLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("atus_uploads_total", "Total upload attempts"),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

/// Upload duration in seconds.
pub static UPLOAD_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "atus_upload_duration_seconds",
            "Duration of destination upload and re-announce",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Intake and samples
// =============================================================================

/// Intake decisions by outcome.
pub static INTAKE_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atus_intake_decisions_total",
            "Total intake decisions for discovered releases",
        ),
        &["outcome"], // "accepted", "duplicate", "too_old", "rejected", "failed"
    )
    .unwrap()
});

/// Samples that could not be queued because the queue was full.
pub static SAMPLE_QUEUE_REJECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "atus_sample_queue_rejections_total",
        "Samples not queued because the sample queue was full",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Release lifecycle
        Box::new(RELEASE_TRANSITIONS.clone()),
        Box::new(WORKING_SET_SIZE.clone()),
        Box::new(RELEASES_STALLED.clone()),
        // Agents
        Box::new(AGENT_POLL_FAILURES.clone()),
        Box::new(AGENT_SUBMISSIONS.clone()),
        // Upload
        Box::new(UPLOADS.clone()),
        Box::new(UPLOAD_DURATION.clone()),
        // Intake and samples
        Box::new(INTAKE_DECISIONS.clone()),
        Box::new(SAMPLE_QUEUE_REJECTIONS.clone()),
    ]
}
