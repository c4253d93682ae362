//! HubSpot-compatible v3 contacts client.
//!
//! Upsert flow, one logical call from the orchestrator's point of view:
//!
//! ```text
//! email ──▶ POST /crm/v3/objects/contacts/search ──┬─ hit ──▶ PATCH /contacts/{id}
//!                                                  └─ miss ─▶ POST  /contacts
//! ```
//!
//! Every request runs through the retrying transport: 5xx and 429 responses
//! and transport failures are retried on the [`RetryPolicy`] schedule, other
//! 4xx responses fail immediately with the upstream body preserved. A
//! missing access token fails before any network I/O.

use crate::error::{CrmError, Result};
use crate::retry::RetryPolicy;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sheetbridge_protocol::CanonicalContact;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.hubapi.com";

#[derive(Debug, Clone)]
pub struct CrmConfig {
    /// Origin of the contacts API, overridable for proxies and tests.
    pub base_url: String,
    pub access_token: Option<String>,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            access_token: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// What the upsert did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created { id: String },
    Updated { id: String },
    Skipped { reason: String },
}

#[derive(Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    config: CrmConfig,
}

impl CrmClient {
    #[must_use]
    pub fn new(config: CrmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Create the contact or update the existing one with the same email.
    /// Properties sent are the contact's resolved, non-empty fields only.
    pub async fn upsert_contact(&self, contact: &CanonicalContact) -> Result<UpsertOutcome> {
        let email = contact
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_default();
        if email.is_empty() {
            return Ok(UpsertOutcome::Skipped {
                reason: "missing email".to_string(),
            });
        }

        let properties = contact.property_bag();
        match self.find_contact_by_email(&email).await? {
            Some(id) => {
                self.update_contact(&id, &properties).await?;
                debug!("updated contact {id} for {email}");
                Ok(UpsertOutcome::Updated { id })
            }
            None => {
                let id = self.create_contact(&properties).await?;
                debug!("created contact {id} for {email}");
                Ok(UpsertOutcome::Created { id })
            }
        }
    }

    /// Exact-match search on the email property. Returns the first hit's id;
    /// a hit without a usable id counts as a miss.
    pub async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>> {
        let token = self.token()?;
        let url = format!("{}/crm/v3/objects/contacts/search", self.config.base_url);
        let body = SearchRequest::exact_email(email);

        let response = self
            .send_retrying("search", || {
                self.http
                    .post(&url)
                    .timeout(self.config.timeout)
                    .bearer_auth(token)
                    .json(&body)
            })
            .await?;
        let response = Self::check_status("search", response).await?;

        let parsed: SearchResponse = response.json().await.map_err(|source| {
            CrmError::Transport {
                operation: "search",
                source,
            }
        })?;
        Ok(parsed
            .results
            .into_iter()
            .next()
            .and_then(|hit| hit.id)
            .filter(|id| !id.is_empty()))
    }

    pub async fn create_contact(&self, properties: &BTreeMap<&'static str, &str>) -> Result<String> {
        let token = self.token()?;
        let url = format!("{}/crm/v3/objects/contacts", self.config.base_url);
        let body = PropertiesBody { properties };

        let response = self
            .send_retrying("create", || {
                self.http
                    .post(&url)
                    .timeout(self.config.timeout)
                    .bearer_auth(token)
                    .json(&body)
            })
            .await?;
        let response = Self::check_status("create", response).await?;

        let parsed: ObjectResponse = response.json().await.map_err(|source| {
            CrmError::Transport {
                operation: "create",
                source,
            }
        })?;
        Ok(parsed.id)
    }

    pub async fn update_contact(
        &self,
        contact_id: &str,
        properties: &BTreeMap<&'static str, &str>,
    ) -> Result<()> {
        let token = self.token()?;
        let url = format!(
            "{}/crm/v3/objects/contacts/{contact_id}",
            self.config.base_url
        );
        let body = PropertiesBody { properties };

        let response = self
            .send_retrying("update", || {
                self.http
                    .patch(&url)
                    .timeout(self.config.timeout)
                    .bearer_auth(token)
                    .json(&body)
            })
            .await?;
        Self::check_status("update", response).await?;
        Ok(())
    }

    fn token(&self) -> Result<&str> {
        match self.config.access_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(CrmError::MissingCredential),
        }
    }

    /// Send with retries. The last response is returned even when its status
    /// is retryable, so the caller reports the real upstream status after
    /// exhaustion.
    async fn send_retrying<F>(
        &self,
        operation: &'static str,
        build: F,
    ) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            let result = build().send().await;
            let retryable = match &result {
                Ok(response) => is_retryable_status(response.status().as_u16()),
                Err(_) => true,
            };
            attempt += 1;

            if !retryable || attempt >= max_attempts {
                return result.map_err(|source| CrmError::Transport { operation, source });
            }

            let delay = self.config.retry.delay_after(attempt - 1);
            match &result {
                Ok(response) => warn!(
                    "CRM {operation} got {}, retrying in {delay:?} (attempt {attempt}/{max_attempts})",
                    response.status()
                ),
                Err(err) => warn!(
                    "CRM {operation} transport failure: {err}, retrying in {delay:?} (attempt {attempt}/{max_attempts})"
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }

    async fn check_status(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Upstream {
                operation,
                status,
                body,
            });
        }
        Ok(response)
    }
}

fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 429
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    filter_groups: Vec<FilterGroup>,
    properties: Vec<&'static str>,
}

impl SearchRequest {
    fn exact_email(email: &str) -> Self {
        Self {
            filter_groups: vec![FilterGroup {
                filters: vec![Filter {
                    property_name: "email",
                    operator: "EQ",
                    value: email.to_string(),
                }],
            }],
            properties: vec!["email"],
        }
    }
}

#[derive(Serialize)]
struct FilterGroup {
    filters: Vec<Filter>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Filter {
    property_name: &'static str,
    operator: &'static str,
    value: String,
}

#[derive(Serialize)]
struct PropertiesBody<'a> {
    properties: &'a BTreeMap<&'static str, &'a str>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct ObjectResponse {
    #[serde(default)]
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn search_request_shape_matches_the_v3_api() {
        let body = serde_json::to_value(SearchRequest::exact_email("a@b.com")).expect("json");
        assert_eq!(
            body,
            serde_json::json!({
                "filterGroups": [
                    {"filters": [{"propertyName": "email", "operator": "EQ", "value": "a@b.com"}]}
                ],
                "properties": ["email"],
            })
        );
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_network_io() {
        let client = CrmClient::new(CrmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..CrmConfig::default()
        });
        let err = client
            .find_contact_by_email("a@b.com")
            .await
            .expect_err("must fail");
        assert!(matches!(err, CrmError::MissingCredential));

        let empty_token = CrmClient::new(CrmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            access_token: Some(String::new()),
            ..CrmConfig::default()
        });
        let err = empty_token
            .find_contact_by_email("a@b.com")
            .await
            .expect_err("must fail");
        assert!(matches!(err, CrmError::MissingCredential));
    }
}
