use anyhow::Context;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::app::ports::DigestOutputPort;
use crate::pipeline::processing::Digest;

/// Writes the digest as pretty-printed JSON to a file, or to stdout when no
/// path is configured.
pub struct FileDigestOutputAdapter {
    path: Option<PathBuf>,
}

impl FileDigestOutputAdapter {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait::async_trait]
impl DigestOutputPort for FileDigestOutputAdapter {
    async fn write_digest(&self, digest: &Digest) -> anyhow::Result<()> {
        let mut json = serde_json::to_string_pretty(digest)?;
        json.push('\n');

        match &self.path {
            Some(path) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .with_context(|| format!("Failed to create {}", dir.display()))?;
                }
                tokio::fs::write(path, json)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Wrote digest with {} event(s) to {}", digest.event_count(), path.display());
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(json.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::{ClassifiedEvents, DigestBuilder};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_writes_json_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/digest.json");
        let now = NaiveDate::from_ymd_opt(2024, 3, 6)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let digest = DigestBuilder::default().build(&ClassifiedEvents::default(), now);

        FileDigestOutputAdapter::new(Some(path.clone()))
            .write_digest(&digest)
            .await
            .unwrap();

        let written: Digest = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, digest);
    }
}
