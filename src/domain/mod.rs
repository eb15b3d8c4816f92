use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A fully resolved calendar date-time. Scraped listings carry no zone
/// information, so instants are naive wall-clock values.
pub type Instant = NaiveDateTime;

/// Canonical rendering used when an instant is written back out as text.
pub const INSTANT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One event posting as produced by a scraper. Only `datetime_text` is
/// interpreted; everything else passes through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEventRecord {
    pub title: String,
    #[serde(rename = "datetime", alias = "datetime_text", default)]
    pub datetime_text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "image_url", alias = "image_ref", alias = "image", default)]
    pub image_ref: Option<String>,
    #[serde(alias = "ticket_url", default)]
    pub url: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
}

impl RawEventRecord {
    pub fn new(title: impl Into<String>, datetime_text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            datetime_text: datetime_text.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    /// Scrapers occasionally emit cards with no title or no date block.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.datetime_text.trim().is_empty()
    }
}

/// Normalized identity used to fold repeat postings of one logical event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKey(String);

impl EventKey {
    pub(crate) fn from_normalized(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short stable id derived from the key, used to identify digest entries
    /// across runs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..16].to_string()
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The deduplicated, multi-date-aware representation of one logical event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEvent {
    pub key: EventKey,
    pub title: String,
    pub description: String,
    pub image_ref: Option<String>,
    pub url: Option<String>,
    pub venue: Option<String>,
    /// Ascending, no duplicates, never empty.
    pub instants: Vec<Instant>,
    pub canonical_instant: Instant,
    /// Number of raw postings folded into this event.
    pub postings: usize,
}

impl MergedEvent {
    pub fn latest_instant(&self) -> Instant {
        self.instants
            .last()
            .copied()
            .unwrap_or(self.canonical_instant)
    }

    pub fn has_multiple_dates(&self) -> bool {
        self.instants.len() > 1
    }

    /// Render this event back into the scraper record shape, with every
    /// instant written out and joined by " and ".
    pub fn to_raw_record(&self) -> RawEventRecord {
        let datetime_text = self
            .instants
            .iter()
            .map(|i| i.format(INSTANT_FORMAT).to_string())
            .collect::<Vec<_>>()
            .join(" and ");

        RawEventRecord {
            title: self.title.clone(),
            datetime_text,
            description: Some(self.description.clone()).filter(|d| !d.is_empty()),
            image_ref: self.image_ref.clone(),
            url: self.url.clone(),
            venue: self.venue.clone(),
        }
    }
}

/// Presentation bucket for a merged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    ThisWeek,
    NextWeek,
    Future,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [TimeWindow::ThisWeek, TimeWindow::NextWeek, TimeWindow::Future];

    pub fn label(&self) -> &'static str {
        match self {
            TimeWindow::ThisWeek => "This Week",
            TimeWindow::NextWeek => "Next Week",
            TimeWindow::Future => "Upcoming",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_accepts_scraper_field_names() {
        let json = r#"{
            "title": "Murder Mystery Dinner",
            "datetime": "March 10, 2025 7:00 pm",
            "description": "",
            "image_url": "https://example.com/a.jpg",
            "ticket_url": "https://example.com/tickets"
        }"#;

        let record: RawEventRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.datetime_text, "March 10, 2025 7:00 pm");
        assert_eq!(record.image_ref.as_deref(), Some("https://example.com/a.jpg"));
        assert_eq!(record.url.as_deref(), Some("https://example.com/tickets"));
        assert!(record.venue.is_none());
    }

    #[test]
    fn test_invalid_record_detection() {
        assert!(RawEventRecord::new("Show", "March 1").is_valid());
        assert!(!RawEventRecord::new("   ", "March 1").is_valid());
        assert!(!RawEventRecord::new("Show", "").is_valid());
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let key = EventKey::from_normalized("wine walk_".to_string());
        let a = key.fingerprint();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, key.clone().fingerprint());
    }
}
