use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use crate::app::ports::EventSourcePort;
use crate::domain::RawEventRecord;
use crate::error::DigestError;

/// Scraper output on disk: either a bare array of records or an object
/// wrapping them in `events`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Bare(Vec<RawEventRecord>),
    Wrapped { events: Vec<RawEventRecord> },
}

/// Reads one scraper's JSON output file per run.
pub struct JsonFileEventSource {
    id: String,
    path: PathBuf,
}

impl JsonFileEventSource {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    /// Source id taken from the file stem (`data/downtown.json` -> `downtown`).
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("events")
            .to_string();
        Self { id, path }
    }
}

#[async_trait::async_trait]
impl EventSourcePort for JsonFileEventSource {
    async fn fetch_events(&self) -> anyhow::Result<Vec<RawEventRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let parsed: RecordFile = serde_json::from_str(&content).map_err(|e| DigestError::Source {
            source_id: self.id.clone(),
            message: format!("invalid JSON in {}: {}", self.path.display(), e),
        })?;
        let records = match parsed {
            RecordFile::Bare(records) => records,
            RecordFile::Wrapped { events } => events,
        };

        info!("Loaded {} record(s) from {}", records.len(), self.path.display());
        Ok(records)
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_reads_bare_array() {
        let file = file_with(r#"[{"title": "Jazz Night", "datetime": "March 8, 2024 7:00 pm"}]"#);
        let source = JsonFileEventSource::new("downtown", file.path());

        let records = source.fetch_events().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].datetime_text, "March 8, 2024 7:00 pm");
        assert_eq!(source.source_id(), "downtown");
    }

    #[tokio::test]
    async fn test_reads_wrapped_events() {
        let file = file_with(
            r#"{"events": [
                {"title": "A", "datetime": "March 8, 2024", "venue": "Hall"},
                {"title": "B", "datetime_text": "March 9, 2024"}
            ]}"#,
        );
        let records = JsonFileEventSource::new("x", file.path()).fetch_events().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].venue.as_deref(), Some("Hall"));
        assert_eq!(records[1].datetime_text, "March 9, 2024");
    }

    #[tokio::test]
    async fn test_bad_json_and_missing_file_are_errors() {
        let file = file_with("{not json");
        let err = JsonFileEventSource::new("x", file.path()).fetch_events().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DigestError>(),
            Some(DigestError::Source { source_id, .. }) if source_id == "x"
        ));

        let missing = JsonFileEventSource::new("x", "/nonexistent/events.json");
        assert!(missing.fetch_events().await.is_err());
    }

    #[test]
    fn test_id_from_file_stem() {
        assert_eq!(JsonFileEventSource::from_path("data/wine_country.json").source_id(), "wine_country");
    }
}
