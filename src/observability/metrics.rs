//! Metrics for digest runs.
//!
//! Names follow Prometheus conventions and are recorded through the
//! `metrics` facade. A Prometheus recorder is installed once per process
//! so a short-lived run can render its own exposition text at exit.

use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Enum representing all metric names used by the digest pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Source metrics
    SourcesFetchSuccess,
    SourcesFetchError,
    RecordsFetched,

    // Merge metrics
    RecordsInvalid,
    RecordsUnparseable,
    RecordsOutOfRange,
    DuplicatePostings,
    EventsMerged,
    EventsDroppedPast,

    // Classification metrics
    EventsThisWeek,
    EventsNextWeek,
    EventsFuture,

    // Run metrics
    DigestsWritten,
    RunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourcesFetchSuccess => "event_digest_sources_fetch_success_total",
            MetricName::SourcesFetchError => "event_digest_sources_fetch_error_total",
            MetricName::RecordsFetched => "event_digest_records_fetched_total",

            MetricName::RecordsInvalid => "event_digest_records_invalid_total",
            MetricName::RecordsUnparseable => "event_digest_records_unparseable_total",
            MetricName::RecordsOutOfRange => "event_digest_records_out_of_range_total",
            MetricName::DuplicatePostings => "event_digest_duplicate_postings_total",
            MetricName::EventsMerged => "event_digest_events_merged_total",
            MetricName::EventsDroppedPast => "event_digest_events_dropped_past_total",

            MetricName::EventsThisWeek => "event_digest_events_this_week",
            MetricName::EventsNextWeek => "event_digest_events_next_week",
            MetricName::EventsFuture => "event_digest_events_future",

            MetricName::DigestsWritten => "event_digest_digests_written_total",
            MetricName::RunDuration => "event_digest_run_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        [
            MetricName::SourcesFetchSuccess,
            MetricName::SourcesFetchError,
            MetricName::RecordsFetched,
            MetricName::RecordsInvalid,
            MetricName::RecordsUnparseable,
            MetricName::RecordsOutOfRange,
            MetricName::DuplicatePostings,
            MetricName::EventsMerged,
            MetricName::EventsDroppedPast,
            MetricName::EventsThisWeek,
            MetricName::EventsNextWeek,
            MetricName::EventsFuture,
            MetricName::DigestsWritten,
            MetricName::RunDuration,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn emit_counter(name: MetricName, value: f64) {
    ::metrics::counter!(name.as_str()).increment(value.max(0.0) as u64);
}

pub fn emit_gauge(name: MetricName, value: f64) {
    ::metrics::gauge!(name.as_str()).set(value);
}

pub fn emit_histogram(name: MetricName, value: f64) {
    ::metrics::histogram!(name.as_str()).record(value);
}

/// Install the Prometheus recorder. Idempotent; later calls are no-ops.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_ok() {
                info!("Prometheus recorder installed (handle available for in-process render)");
            }
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}

/// Prometheus text exposition of everything recorded so far, if a recorder
/// was installed.
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}
