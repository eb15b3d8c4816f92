use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::app::ports::{DigestOutputPort, EventSourcePort};
use crate::config::Config;
use crate::domain::{Instant, MergedEvent, RawEventRecord};
use crate::observability::metrics::{emit_counter, emit_gauge, emit_histogram, MetricName};
use crate::pipeline::processing::{
    DateExpressionParser, DigestBuilder, EventKeyBuilder, EventMerger, MergeReport, TimeWindowClassifier,
};

/// What one digest run did, for logging and for the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DigestRunSummary {
    pub records_fetched: usize,
    pub failed_sources: usize,
    pub merge: MergeReport,
    pub dropped_past: usize,
    pub this_week: usize,
    pub next_week: usize,
    pub future: usize,
}

impl DigestRunSummary {
    pub fn total_events(&self) -> usize {
        self.this_week + self.next_week + self.future
    }
}

/// Use case for turning scraped postings into a weekly digest
pub struct DigestUseCase {
    sources: Vec<Arc<dyn EventSourcePort>>,
    output_port: Arc<dyn DigestOutputPort>,
    config: Config,
}

impl DigestUseCase {
    pub fn new(
        sources: Vec<Arc<dyn EventSourcePort>>,
        output_port: Arc<dyn DigestOutputPort>,
        config: Config,
    ) -> Self {
        Self {
            sources,
            output_port,
            config,
        }
    }

    /// Fetch, merge, classify, and write one digest evaluated at `now`.
    pub async fn run(&self, now: Instant) -> Result<DigestRunSummary> {
        let start_time = std::time::Instant::now();
        let mut summary = DigestRunSummary::default();

        info!("Starting digest run for {} source(s) at {}", self.sources.len(), now);

        let records = self.fetch_all(&mut summary).await;
        summary.records_fetched = records.len();
        if records.is_empty() {
            warn!("No events found across {} source(s)", self.sources.len());
        }

        let merger = EventMerger::new(
            DateExpressionParser::with_config(now, self.config.parser.clone()),
            EventKeyBuilder::new(self.config.merge.key_strategy),
        );
        let (mut events, report) = merger.merge_with_report(&records);
        summary.merge = report;
        self.emit_merge_metrics(&report);

        if self.config.digest.drop_past_events {
            summary.dropped_past = drop_past_events(&mut events, now);
            if summary.dropped_past > 0 {
                info!("Dropped {} event(s) that already ended", summary.dropped_past);
                emit_counter(MetricName::EventsDroppedPast, summary.dropped_past as f64);
            }
        }

        let classified = TimeWindowClassifier::new().classify(events, now);
        summary.this_week = classified.this_week.len();
        summary.next_week = classified.next_week.len();
        summary.future = classified.future.len();
        emit_gauge(MetricName::EventsThisWeek, summary.this_week as f64);
        emit_gauge(MetricName::EventsNextWeek, summary.next_week as f64);
        emit_gauge(MetricName::EventsFuture, summary.future as f64);

        let digest = DigestBuilder::new(self.config.digest.instant_format).build(&classified, now);
        self.output_port
            .write_digest(&digest)
            .await
            .context("Failed to write digest")?;
        emit_counter(MetricName::DigestsWritten, 1.0);

        emit_histogram(MetricName::RunDuration, start_time.elapsed().as_secs_f64());
        info!(
            "Digest complete: {} this week, {} next week, {} upcoming ({} records, {} dropped)",
            summary.this_week,
            summary.next_week,
            summary.future,
            summary.records_fetched,
            summary.merge.dropped_records() + summary.dropped_past
        );
        Ok(summary)
    }

    /// A failing source is logged and skipped.
    async fn fetch_all(&self, summary: &mut DigestRunSummary) -> Vec<RawEventRecord> {
        let mut records = Vec::new();
        for source in &self.sources {
            match source.fetch_events().await {
                Ok(batch) => {
                    debug!("Source {} returned {} record(s)", source.source_id(), batch.len());
                    emit_counter(MetricName::SourcesFetchSuccess, 1.0);
                    emit_counter(MetricName::RecordsFetched, batch.len() as f64);
                    records.extend(batch);
                }
                Err(e) => {
                    error!("Source {} failed: {:#}", source.source_id(), e);
                    emit_counter(MetricName::SourcesFetchError, 1.0);
                    summary.failed_sources += 1;
                }
            }
        }
        records
    }

    fn emit_merge_metrics(&self, report: &MergeReport) {
        emit_counter(MetricName::RecordsInvalid, report.invalid_records as f64);
        emit_counter(MetricName::RecordsUnparseable, report.unparseable_records as f64);
        emit_counter(MetricName::RecordsOutOfRange, report.out_of_range_records as f64);
        emit_counter(MetricName::DuplicatePostings, report.duplicate_postings as f64);
        emit_counter(MetricName::EventsMerged, report.merged_events as f64);
    }
}

/// Remove events whose latest date is before `now`; returns how many went.
fn drop_past_events(events: &mut Vec<MergedEvent>, now: Instant) -> usize {
    let before = events.len();
    events.retain(|event| event.latest_instant() >= now);
    before - events.len()
}
