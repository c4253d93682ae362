use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrmError>;

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("HUBSPOT_ACCESS_TOKEN missing")]
    MissingCredential,

    #[error("CRM {operation} error: {body}")]
    Upstream {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("CRM {operation} transport error: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl CrmError {
    /// True for failures of the CRM itself rather than of this deployment's
    /// configuration. The server maps these onto 502, the rest onto 400.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        !matches!(self, Self::MissingCredential)
    }
}
