//! Decision flow for one submitted row.
//!
//! ```text
//! request ──▶ fingerprint ──▶ seen? ──yes──▶ Duplicate
//!                               │no
//!                               ▼
//!                           map to contact ──no email──▶ Skipped
//!                               │
//!                               ▼
//!                           CRM upsert ──ok──▶ Created / Updated
//!                               │err
//!                               ▼
//!                           error event, then the error propagates
//! ```
//!
//! Every terminal arrow writes exactly one audit event first, which is what
//! makes the whole call idempotent: the next identical request short-circuits
//! at `seen`.

use crate::error::Result;
use log::{error, info};
use sheetbridge_audit::{fingerprint, AuditEvent, AuditStore, EventAction};
use sheetbridge_crm::{CrmClient, UpsertOutcome};
use sheetbridge_mapper::map_row;
use sheetbridge_protocol::{CanonicalContact, IngestReply, IngestRequest, UpsertReply};

/// Terminal decision for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Duplicate,
    Skipped { reason: String },
    Upserted(UpsertOutcome),
}

impl IngestOutcome {
    /// Wire rendering of the decision.
    #[must_use]
    pub fn into_reply(self) -> IngestReply {
        match self {
            Self::Duplicate => IngestReply::duplicate(),
            Self::Skipped { reason } => IngestReply::skipped(reason),
            Self::Upserted(outcome) => IngestReply::upserted(match outcome {
                UpsertOutcome::Created { id } => UpsertReply::created(id),
                UpsertOutcome::Updated { id } => UpsertReply::updated(id),
                UpsertOutcome::Skipped { reason } => UpsertReply::skipped(reason),
            }),
        }
    }
}

/// Context object tying the idempotency store to the CRM client. One
/// instance is shared by the HTTP server and the in-process sink.
#[derive(Clone)]
pub struct IngestPipeline {
    store: AuditStore,
    crm: CrmClient,
}

impl IngestPipeline {
    #[must_use]
    pub fn new(store: AuditStore, crm: CrmClient) -> Self {
        Self { store, crm }
    }

    #[must_use]
    pub fn store(&self) -> &AuditStore {
        &self.store
    }

    /// Run one row to a terminal decision, recording exactly one audit event.
    ///
    /// A CRM failure records an `error` event before propagating, so the
    /// identical row is not retried on resubmission.
    pub async fn ingest_row(&self, request: &IngestRequest) -> Result<IngestOutcome> {
        let row_hash = fingerprint(&request.headers, &request.values);

        if self
            .store
            .seen(&request.source, request.row_index, &row_hash)
            .await?
        {
            self.store
                .record(&AuditEvent {
                    source: request.source.clone(),
                    row_index: request.row_index,
                    row_hash,
                    crm_id: None,
                    action: EventAction::Duplicate,
                    detail: String::new(),
                })
                .await?;
            info!(
                "duplicate row {}#{} from {}",
                request.source.sheet_name, request.row_index, request.source.spreadsheet_id
            );
            return Ok(IngestOutcome::Duplicate);
        }

        let contact = map_row(
            &request.headers,
            &request.values,
            request.effective_mapping(),
        );
        if !contact.has_email() {
            self.store
                .record(&AuditEvent {
                    source: request.source.clone(),
                    row_index: request.row_index,
                    row_hash,
                    crm_id: None,
                    action: EventAction::Skipped,
                    detail: "missing email".to_string(),
                })
                .await?;
            return Ok(IngestOutcome::Skipped {
                reason: "missing email".to_string(),
            });
        }

        match self.crm.upsert_contact(&contact).await {
            Ok(outcome) => {
                let (action, crm_id) = match &outcome {
                    UpsertOutcome::Created { id } => (EventAction::Created, Some(id.clone())),
                    UpsertOutcome::Updated { id } => (EventAction::Updated, Some(id.clone())),
                    UpsertOutcome::Skipped { .. } => (EventAction::Unknown, None),
                };
                self.store
                    .record(&AuditEvent {
                        source: request.source.clone(),
                        row_index: request.row_index,
                        row_hash,
                        crm_id,
                        action,
                        detail: property_bag_json(&contact),
                    })
                    .await?;
                info!(
                    "{action} row {}#{} from {}",
                    request.source.sheet_name, request.row_index, request.source.spreadsheet_id
                );
                Ok(IngestOutcome::Upserted(outcome))
            }
            Err(err) => {
                let event = AuditEvent {
                    source: request.source.clone(),
                    row_index: request.row_index,
                    row_hash,
                    crm_id: None,
                    action: EventAction::Error,
                    detail: err.to_string(),
                };
                if let Err(record_err) = self.store.record(&event).await {
                    error!("could not record error event: {record_err}");
                }
                Err(err.into())
            }
        }
    }
}

fn property_bag_json(contact: &CanonicalContact) -> String {
    serde_json::to_string(&contact.property_bag()).unwrap_or_default()
}
