//! Renderer-facing digest built from classified events.
//!
//! Entries keep the grouped-event shape the downstream formatter expects:
//! one entry per logical event, with every date joined by " and ".

use serde::{Deserialize, Serialize};

use crate::domain::{Instant, MergedEvent, TimeWindow, INSTANT_FORMAT};
use crate::pipeline::processing::windows::{ClassifiedEvents, WeekBounds};

const DISPLAY_FORMAT: &str = "%A %-I:%M %p, %b %d %Y";

/// How instants are written into digest entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstantFormat {
    /// `2025-03-10 19:00:00`
    #[default]
    Iso,
    /// `Monday 7:00 PM, Mar 10 2025`
    Display,
}

impl InstantFormat {
    pub fn render(&self, instant: &Instant) -> String {
        match self {
            InstantFormat::Iso => instant.format(INSTANT_FORMAT).to_string(),
            InstantFormat::Display => instant.format(DISPLAY_FORMAT).to_string(),
        }
    }
}

impl std::str::FromStr for InstantFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "iso" => Ok(InstantFormat::Iso),
            "display" => Ok(InstantFormat::Display),
            other => Err(format!("unknown instant format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub id: String,
    pub title: String,
    /// Every date of the event joined by " and ".
    pub datetime: String,
    pub dates: Vec<String>,
    pub description: String,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub venue: Option<String>,
    pub multiple_dates: bool,
}

impl DigestEntry {
    pub fn from_event(event: &MergedEvent, format: InstantFormat) -> Self {
        let dates: Vec<String> = event.instants.iter().map(|i| format.render(i)).collect();
        Self {
            id: event.key.fingerprint(),
            title: event.title.clone(),
            datetime: dates.join(" and "),
            multiple_dates: dates.len() > 1,
            dates,
            description: event.description.clone(),
            image_url: event.image_ref.clone(),
            url: event.url.clone(),
            venue: event.venue.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSection {
    pub window: TimeWindow,
    pub label: String,
    pub events: Vec<DigestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub generated_at: Instant,
    pub week: WeekBounds,
    /// Always one section per window, in presentation order.
    pub sections: Vec<DigestSection>,
}

impl Digest {
    pub fn section(&self, window: TimeWindow) -> Option<&DigestSection> {
        self.sections.iter().find(|s| s.window == window)
    }

    pub fn event_count(&self) -> usize {
        self.sections.iter().map(|s| s.events.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DigestBuilder {
    format: InstantFormat,
}

impl DigestBuilder {
    pub fn new(format: InstantFormat) -> Self {
        Self { format }
    }

    pub fn build(&self, classified: &ClassifiedEvents, now: Instant) -> Digest {
        let sections = TimeWindow::ALL
            .iter()
            .map(|window| DigestSection {
                window: *window,
                label: window.label().to_string(),
                events: classified
                    .get(*window)
                    .iter()
                    .map(|event| DigestEntry::from_event(event, self.format))
                    .collect(),
            })
            .collect();

        Digest {
            generated_at: now,
            week: WeekBounds::for_instant(now),
            sections,
        }
    }
}
