//! # SheetBridge Ingest
//!
//! The orchestrator: takes one submitted row through fingerprinting, the
//! idempotency check, column mapping and the CRM upsert, and writes the one
//! audit event that makes the decision final.

mod error;
mod pipeline;

pub use error::{IngestError, Result};
pub use pipeline::{IngestOutcome, IngestPipeline};
