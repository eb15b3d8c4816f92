use async_trait::async_trait;

use crate::domain::RawEventRecord;
use crate::pipeline::processing::Digest;

/// Supplies one batch of scraped postings per run.
#[async_trait]
pub trait EventSourcePort: Send + Sync {
    async fn fetch_events(&self) -> anyhow::Result<Vec<RawEventRecord>>;
    fn source_id(&self) -> &str;
}

/// Receives the finished digest.
#[async_trait]
pub trait DigestOutputPort: Send + Sync {
    async fn write_digest(&self, digest: &Digest) -> anyhow::Result<()>;
}
