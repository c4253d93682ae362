//! Row sinks wiring the file bridge to an ingest pipeline.
//!
//! The default deployment runs the bridge on a desktop and the API server
//! elsewhere, so rows travel over HTTP. `--direct` collapses the two into
//! one process for single-machine setups.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sheetbridge_ingest::IngestPipeline;
use sheetbridge_protocol::{IngestReply, IngestRequest};
use sheetbridge_watcher::RowSink;

use crate::security::SECRET_HEADER;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts rows to a running ingestion API.
pub struct HttpRowSink {
    http: reqwest::Client,
    url: String,
    secret: String,
}

impl HttpRowSink {
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl RowSink for HttpRowSink {
    async fn submit_row(&self, request: &IngestRequest) -> anyhow::Result<IngestReply> {
        let response = self
            .http
            .post(&self.url)
            .timeout(SUBMIT_TIMEOUT)
            .header(SECRET_HEADER, &self.secret)
            .json(request)
            .send()
            .await
            .with_context(|| format!("could not reach {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("ingest endpoint answered {status}: {body}");
        }
        response
            .json::<IngestReply>()
            .await
            .context("ingest endpoint returned an unreadable reply")
    }
}

/// Runs rows through an in-process pipeline, no server required.
pub struct LocalSink {
    pipeline: IngestPipeline,
}

impl LocalSink {
    pub fn new(pipeline: IngestPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl RowSink for LocalSink {
    async fn submit_row(&self, request: &IngestRequest) -> anyhow::Result<IngestReply> {
        Ok(self.pipeline.ingest_row(request).await?.into_reply())
    }
}
