//! # SheetBridge CRM
//!
//! The outbound half of the pipeline: a retrying HubSpot-compatible contacts
//! client that searches by email, then creates or patches, returning a typed
//! [`UpsertOutcome`].

mod client;
mod error;
mod retry;

pub use client::{CrmClient, CrmConfig, UpsertOutcome, DEFAULT_API_BASE};
pub use error::{CrmError, Result};
pub use retry::RetryPolicy;
