use chrono::{Datelike, Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::{Instant, MergedEvent, TimeWindow};

/// Calendar boundaries of the current and next week, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekBounds {
    pub week_start: Instant,
    pub this_week_end: Instant,
    pub next_week_end: Instant,
}

impl WeekBounds {
    pub fn for_instant(now: Instant) -> Self {
        let today = now.date();
        let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        let week_start = monday.and_time(NaiveTime::MIN);
        let this_week_end = week_start + Duration::days(7) - Duration::seconds(1);
        let next_week_end = this_week_end + Duration::days(7);

        Self {
            week_start,
            this_week_end,
            next_week_end,
        }
    }
}

impl TimeWindow {
    /// Both boundaries are inclusive. Instants before the week start are
    /// still `ThisWeek`; staleness is the caller's concern.
    pub fn for_instant(instant: Instant, bounds: &WeekBounds) -> Self {
        if instant <= bounds.this_week_end {
            TimeWindow::ThisWeek
        } else if instant <= bounds.next_week_end {
            TimeWindow::NextWeek
        } else {
            TimeWindow::Future
        }
    }
}

/// Merged events split into presentation buckets, each sorted by
/// canonical instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedEvents {
    pub this_week: Vec<MergedEvent>,
    pub next_week: Vec<MergedEvent>,
    pub future: Vec<MergedEvent>,
}

impl ClassifiedEvents {
    pub fn get(&self, window: TimeWindow) -> &[MergedEvent] {
        match window {
            TimeWindow::ThisWeek => &self.this_week,
            TimeWindow::NextWeek => &self.next_week,
            TimeWindow::Future => &self.future,
        }
    }

    fn bucket_mut(&mut self, window: TimeWindow) -> &mut Vec<MergedEvent> {
        match window {
            TimeWindow::ThisWeek => &mut self.this_week,
            TimeWindow::NextWeek => &mut self.next_week,
            TimeWindow::Future => &mut self.future,
        }
    }

    pub fn len(&self) -> usize {
        self.this_week.len() + self.next_week.len() + self.future.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeWindowClassifier;

impl TimeWindowClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, events: Vec<MergedEvent>, now: Instant) -> ClassifiedEvents {
        let bounds = WeekBounds::for_instant(now);
        let mut classified = ClassifiedEvents::default();

        for event in events {
            let window = TimeWindow::for_instant(event.canonical_instant, &bounds);
            classified.bucket_mut(window).push(event);
        }

        // Stable, so ties keep input order.
        for window in TimeWindow::ALL {
            classified
                .bucket_mut(window)
                .sort_by_key(|event| event.canonical_instant);
        }
        classified
    }
}
