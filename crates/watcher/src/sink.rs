use async_trait::async_trait;
use sheetbridge_protocol::{IngestReply, IngestRequest};

/// Destination for rows lifted off the watched file.
///
/// The bridge stays agnostic about where rows go: the CLI plugs in an HTTP
/// sink posting to a remote ingest endpoint, or a local sink driving the
/// pipeline in-process. Submission errors are reported back to the bridge,
/// which logs them and keeps watching.
#[async_trait]
pub trait RowSink: Send + Sync {
    async fn submit_row(&self, request: &IngestRequest) -> anyhow::Result<IngestReply>;
}
