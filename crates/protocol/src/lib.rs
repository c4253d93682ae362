//! Wire types shared by the SheetBridge server, watcher and CLI.
//!
//! ```text
//! watcher ──IngestRequest──▶ server ──▶ pipeline ──IngestReply──▶ watcher
//! ```
//!
//! Everything here is plain serde data: the ingest request a watcher submits
//! for one spreadsheet row, the replies the server answers with, and the
//! canonical contact model rows are mapped into. Request field names on the
//! wire are camelCase; canonical contact fields use their CRM property names.

mod contact;

pub use contact::{
    normalize_header, CanonicalContact, ContactField, ExplicitMapping, MappingError,
};

use serde::{Deserialize, Serialize};

/// Identity of the spreadsheet a row came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedSource {
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

impl WatchedSource {
    #[must_use]
    pub fn new(spreadsheet_id: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
        }
    }
}

/// One spreadsheet row submitted for ingestion.
///
/// `headers` and `values` are positional; a `null` value cell and an absent
/// index both mean "no value here" and are treated as empty strings by
/// mapping and fingerprinting. `mapping` is optional on the wire; when
/// present and non-empty it replaces header heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(flatten)]
    pub source: WatchedSource,
    pub row_index: u32,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub values: Vec<Option<String>>,
    #[serde(default)]
    pub mapping: Option<ExplicitMapping>,
}

impl IngestRequest {
    /// The mapping to apply, treating an absent or empty mapping object as
    /// "use header heuristics".
    #[must_use]
    pub fn effective_mapping(&self) -> Option<&ExplicitMapping> {
        self.mapping.as_ref().filter(|m| !m.is_empty())
    }
}

/// Result of one CRM upsert, nested under `upsert` in the ingest reply.
/// Exactly one of the flags is set; unset fields are omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UpsertReply {
    #[must_use]
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            created: Some(true),
            id: Some(id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn updated(id: impl Into<String>) -> Self {
        Self {
            updated: Some(true),
            id: Some(id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped: Some(true),
            reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Reply for a single ingested row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert: Option<UpsertReply>,
}

impl IngestReply {
    #[must_use]
    pub fn duplicate() -> Self {
        Self {
            ok: true,
            duplicate: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            ok: true,
            skipped: Some(true),
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn upserted(upsert: UpsertReply) -> Self {
        Self {
            ok: true,
            upsert: Some(upsert),
            ..Self::default()
        }
    }
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

impl ErrorDetail {
    #[must_use]
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
