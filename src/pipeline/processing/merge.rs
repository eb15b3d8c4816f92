use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::{EventKey, Instant, MergedEvent, RawEventRecord};
use crate::pipeline::processing::dates::{DateExpressionParser, ParseError};
use crate::pipeline::processing::key::EventKeyBuilder;

/// Counters collected while folding one batch of postings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub records_seen: usize,
    /// Blank title or blank date block.
    pub invalid_records: usize,
    pub unparseable_records: usize,
    pub out_of_range_records: usize,
    /// Postings folded into an event that already existed.
    pub duplicate_postings: usize,
    pub merged_events: usize,
}

impl MergeReport {
    pub fn dropped_records(&self) -> usize {
        self.invalid_records + self.unparseable_records + self.out_of_range_records
    }
}

/// Folds repeat postings of one logical event into a single [`MergedEvent`].
#[derive(Debug, Clone)]
pub struct EventMerger {
    parser: DateExpressionParser,
    key_builder: EventKeyBuilder,
}

impl EventMerger {
    pub fn new(parser: DateExpressionParser, key_builder: EventKeyBuilder) -> Self {
        Self { parser, key_builder }
    }

    /// Output is in first-seen order.
    pub fn merge(&self, records: &[RawEventRecord]) -> Vec<MergedEvent> {
        self.merge_with_report(records).0
    }

    pub fn merge_with_report(&self, records: &[RawEventRecord]) -> (Vec<MergedEvent>, MergeReport) {
        let mut report = MergeReport {
            records_seen: records.len(),
            ..MergeReport::default()
        };
        let mut events: Vec<MergedEvent> = Vec::new();
        let mut index: HashMap<EventKey, usize> = HashMap::new();

        for record in records {
            if !record.is_valid() {
                debug!("Skipping invalid record: {:?}", record.title);
                report.invalid_records += 1;
                continue;
            }

            let expression = self.parser.parse(&record.datetime_text);
            if let Some(error) = expression.error() {
                warn!(
                    "Dropping '{}': unparseable date '{}' ({})",
                    record.title, record.datetime_text, error
                );
                match error {
                    ParseError::OutOfRangeDate { .. } => report.out_of_range_records += 1,
                    ParseError::ParseFailure { .. } => report.unparseable_records += 1,
                }
                continue;
            }
            let instants = expression.instants();

            let description = non_empty(record.description.as_deref()).unwrap_or_default();
            let key = self.key_builder.key(&record.title, description);

            match index.get(&key) {
                Some(&position) => {
                    report.duplicate_postings += 1;
                    absorb(&mut events[position], record, instants);
                }
                None => {
                    if let Some(event) = start_event(key.clone(), record, instants) {
                        index.insert(key, events.len());
                        events.push(event);
                    }
                }
            }
        }

        report.merged_events = events.len();
        debug!(
            "Merged {} records into {} events ({} duplicates)",
            report.records_seen, report.merged_events, report.duplicate_postings
        );
        (events, report)
    }
}

/// `None` when the posting carried no instants at all.
fn start_event(key: EventKey, record: &RawEventRecord, mut instants: Vec<Instant>) -> Option<MergedEvent> {
    instants.sort();
    instants.dedup();
    let canonical_instant = *instants.first()?;
    Some(MergedEvent {
        key,
        title: record.title.trim().to_string(),
        description: non_empty(record.description.as_deref())
            .unwrap_or_default()
            .to_string(),
        image_ref: non_empty(record.image_ref.as_deref()).map(str::to_string),
        url: non_empty(record.url.as_deref()).map(str::to_string),
        venue: non_empty(record.venue.as_deref()).map(str::to_string),
        instants,
        canonical_instant,
        postings: 1,
    })
}

fn absorb(event: &mut MergedEvent, record: &RawEventRecord, instants: Vec<Instant>) {
    event.instants.extend(instants);
    event.instants.sort();
    event.instants.dedup();
    if let Some(first) = event.instants.first() {
        event.canonical_instant = *first;
    }
    event.postings += 1;

    if event.description.is_empty() {
        if let Some(description) = non_empty(record.description.as_deref()) {
            event.description = description.to_string();
        }
    }
    fill_gap(&mut event.image_ref, record.image_ref.as_deref());
    fill_gap(&mut event.url, record.url.as_deref());
    fill_gap(&mut event.venue, record.venue.as_deref());
}

fn fill_gap(slot: &mut Option<String>, candidate: Option<&str>) {
    if slot.is_none() {
        *slot = non_empty(candidate).map(str::to_string);
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
