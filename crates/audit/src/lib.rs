//! # SheetBridge Audit
//!
//! Row fingerprinting plus the append-only SQLite event log that makes
//! ingestion idempotent: a row whose exact `(source, row index, fingerprint)`
//! key has been decided before is never processed again.

mod error;
mod fingerprint;
mod store;

pub use error::{AuditError, Result};
pub use fingerprint::{fingerprint, RowFingerprint};
pub use store::{AuditEvent, AuditStore, EventAction, EventSummary};
