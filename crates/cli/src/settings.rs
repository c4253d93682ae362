//! Process configuration resolved from environment variables.
//!
//! Every knob has a default so a bare `sheetbridge serve` works out of the
//! box against a local SQLite file; production deployments override via
//! `.env` or the real environment.

use std::env;
use std::path::PathBuf;

use log::warn;
use sheetbridge_crm::{CrmConfig, DEFAULT_API_BASE};

pub(crate) const BRIDGE_SECRET_ENV: &str = "BRIDGE_SECRET";
pub(crate) const HUBSPOT_TOKEN_ENV: &str = "HUBSPOT_ACCESS_TOKEN";
pub(crate) const HUBSPOT_API_BASE_ENV: &str = "HUBSPOT_API_BASE";
pub(crate) const DB_PATH_ENV: &str = "SHEETBRIDGE_DB";
pub(crate) const API_URL_ENV: &str = "API_URL";

pub(crate) const DEFAULT_BRIDGE_SECRET: &str = "change-me";
pub(crate) const DEFAULT_DB_PATH: &str = "sheetbridge.db";
pub(crate) const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/ingest/rows";

/// Resolved runtime settings shared by the server and the file bridge.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Shared secret expected in the `x-bridge-secret` header.
    pub bridge_secret: String,
    /// HubSpot private-app token, absent until the operator configures one.
    pub hubspot_token: Option<String>,
    /// Base URL for the HubSpot-compatible API.
    pub hubspot_api_base: String,
    /// SQLite file backing the audit log and idempotency index.
    pub db_path: PathBuf,
    /// Ingest endpoint the file bridge posts rows to.
    pub api_url: String,
}

impl Settings {
    /// Reads all settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let bridge_secret = env_non_empty(BRIDGE_SECRET_ENV)
            .unwrap_or_else(|| DEFAULT_BRIDGE_SECRET.to_string());
        if bridge_secret == DEFAULT_BRIDGE_SECRET {
            warn!("{BRIDGE_SECRET_ENV} is unset; using the insecure default secret");
        }
        Self {
            bridge_secret,
            hubspot_token: env_non_empty(HUBSPOT_TOKEN_ENV),
            hubspot_api_base: env_non_empty(HUBSPOT_API_BASE_ENV)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            db_path: env_non_empty(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            api_url: env_non_empty(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }

    /// True once the operator replaced the shipped placeholder secret.
    pub fn has_real_secret(&self) -> bool {
        self.bridge_secret != DEFAULT_BRIDGE_SECRET
    }

    /// CRM client configuration derived from these settings.
    pub fn crm_config(&self) -> CrmConfig {
        CrmConfig {
            base_url: self.hubspot_api_base.clone(),
            access_token: self.hubspot_token.clone(),
            ..CrmConfig::default()
        }
    }
}

/// Reads an environment variable, treating unset and whitespace-only as absent.
fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
