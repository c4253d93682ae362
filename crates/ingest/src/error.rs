use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Crm(#[from] sheetbridge_crm::CrmError),

    #[error("audit store error: {0}")]
    Audit(#[from] sheetbridge_audit::AuditError),
}
