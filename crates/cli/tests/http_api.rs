use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use sheetbridge_audit::AuditStore;
use sheetbridge_cli::{router, AppState, Settings};
use sheetbridge_crm::{CrmClient, CrmConfig, RetryPolicy};
use sheetbridge_ingest::IngestPipeline;
use sheetbridge_protocol::{IngestRequest, WatchedSource};

const SECRET: &str = "test-secret";

fn test_settings() -> Settings {
    Settings {
        bridge_secret: SECRET.to_string(),
        hubspot_token: None,
        // Unused by most tests; overridden where a CRM is involved.
        hubspot_api_base: "http://127.0.0.1:9".to_string(),
        db_path: PathBuf::from("unused.db"),
        api_url: String::new(),
    }
}

/// Serves the API over an in-memory store on an ephemeral port.
async fn start_api(settings: Settings) -> String {
    let store = AuditStore::open_in_memory().await.expect("store");
    let crm = CrmClient::new(CrmConfig {
        base_url: settings.hubspot_api_base.clone(),
        access_token: settings.hubspot_token.clone(),
        timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
    });
    let pipeline = IngestPipeline::new(store, crm);
    let app = router(Arc::new(AppState::new(settings, pipeline)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

/// Canned CRM that misses every search and creates contact 9001.
async fn start_crm_stub() -> String {
    let app = Router::new()
        .route(
            "/crm/v3/objects/contacts/search",
            post(|| async { Json(json!({"results": []})) }),
        )
        .route(
            "/crm/v3/objects/contacts",
            post(|| async { Json(json!({"id": "9001"})) }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

fn plain_row(headers: &[&str], values: &[&str], row_index: u32) -> IngestRequest {
    IngestRequest {
        source: WatchedSource::new("book.xlsx", "Sheet1"),
        row_index,
        headers: headers.iter().map(|h| h.to_string()).collect(),
        values: values.iter().map(|v| Some(v.to_string())).collect(),
        mapping: None,
    }
}

async fn post_row(
    client: &reqwest::Client,
    base: &str,
    request: &IngestRequest,
) -> reqwest::Response {
    client
        .post(format!("{base}/ingest/rows"))
        .header("x-bridge-secret", SECRET)
        .json(request)
        .send()
        .await
        .expect("post row")
}

async fn recent_events(client: &reqwest::Client, base: &str) -> Vec<Value> {
    let body: Value = client
        .get(format!("{base}/logs/recent"))
        .send()
        .await
        .expect("get logs")
        .json()
        .await
        .expect("logs json");
    assert_eq!(body["ok"], json!(true));
    body["events"].as_array().expect("events array").clone()
}

#[tokio::test]
async fn root_announces_the_service() {
    let base = start_api(test_settings()).await;
    let body: Value = reqwest::get(&base).await.expect("get").json().await.expect("json");
    assert_eq!(body, json!({"message": "sheetbridge API running"}));
}

#[tokio::test]
async fn health_answers_ok() {
    let base = start_api(test_settings()).await;
    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .expect("get")
        .json()
        .await
        .expect("json");
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn env_check_reports_configured_credentials() {
    let mut settings = test_settings();
    settings.hubspot_token = Some("pat-123".to_string());
    let base = start_api(settings).await;
    let body: Value = reqwest::get(format!("{base}/env-check"))
        .await
        .expect("get")
        .json()
        .await
        .expect("json");
    assert_eq!(
        body,
        json!({"has_hubspot_token": true, "has_bridge_secret": true})
    );
}

#[tokio::test]
async fn env_check_flags_the_placeholder_secret() {
    let mut settings = test_settings();
    settings.bridge_secret = "change-me".to_string();
    let base = start_api(settings).await;
    let body: Value = reqwest::get(format!("{base}/env-check"))
        .await
        .expect("get")
        .json()
        .await
        .expect("json");
    assert_eq!(
        body,
        json!({"has_hubspot_token": false, "has_bridge_secret": false})
    );
}

#[tokio::test]
async fn wrong_secret_is_rejected_without_touching_the_store() {
    let base = start_api(test_settings()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/ingest/rows"))
        .header("x-bridge-secret", "nope")
        .json(&plain_row(&["Email"], &["a@b.com"], 0))
        .send()
        .await
        .expect("post");
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body, json!({"detail": "Invalid secret"}));

    // Missing header fails the same way.
    let response = client
        .post(format!("{base}/ingest/rows"))
        .json(&plain_row(&["Email"], &["a@b.com"], 0))
        .send()
        .await
        .expect("post");
    assert_eq!(response.status().as_u16(), 401);

    assert!(recent_events(&client, &base).await.is_empty());
}

#[tokio::test]
async fn malformed_body_is_a_client_error() {
    let base = start_api(test_settings()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/ingest/rows"))
        .header("x-bridge-secret", SECRET)
        .body("not json")
        .send()
        .await
        .expect("post");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json");
    let detail = body["detail"].as_str().expect("detail");
    assert!(detail.starts_with("Invalid request body"), "got: {detail}");
}

#[tokio::test]
async fn a_row_without_email_is_skipped_and_logged() {
    let base = start_api(test_settings()).await;
    let client = reqwest::Client::new();

    let response = post_row(&client, &base, &plain_row(&["Name"], &["Bob"], 3)).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(
        body,
        json!({"ok": true, "skipped": true, "reason": "missing email"})
    );

    let events = recent_events(&client, &base).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["action"], json!("skipped"));
    assert_eq!(events[0]["detail"], json!("missing email"));
    assert_eq!(events[0]["spreadsheet_id"], json!("book.xlsx"));
    assert_eq!(events[0]["sheet_name"], json!("Sheet1"));
    assert_eq!(events[0]["row_index"], json!(3));
    assert_eq!(events[0]["crm_id"], json!(null));
}

#[tokio::test]
async fn resubmitting_the_identical_row_is_a_duplicate() {
    let base = start_api(test_settings()).await;
    let client = reqwest::Client::new();
    let row = plain_row(&["Name"], &["Bob"], 0);

    post_row(&client, &base, &row).await;
    let response = post_row(&client, &base, &row).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body, json!({"ok": true, "duplicate": true}));

    let events = recent_events(&client, &base).await;
    assert_eq!(events.len(), 2);
    // Newest first.
    assert_eq!(events[0]["action"], json!("duplicate"));
    assert_eq!(events[1]["action"], json!("skipped"));
}

#[tokio::test]
async fn a_missing_token_fails_while_recording_the_error() {
    let base = start_api(test_settings()).await;
    let client = reqwest::Client::new();

    let response = post_row(
        &client,
        &base,
        &plain_row(&["Email", "Name"], &["ada@example.com", "Ada"], 1),
    )
    .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body, json!({"detail": "HUBSPOT_ACCESS_TOKEN missing"}));

    let events = recent_events(&client, &base).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["action"], json!("error"));
    assert_eq!(events[0]["detail"], json!("HUBSPOT_ACCESS_TOKEN missing"));
}

#[tokio::test]
async fn a_new_contact_row_is_created_in_the_crm() {
    let crm_base = start_crm_stub().await;
    let mut settings = test_settings();
    settings.hubspot_token = Some("pat-123".to_string());
    settings.hubspot_api_base = crm_base;
    let base = start_api(settings).await;
    let client = reqwest::Client::new();

    let response = post_row(
        &client,
        &base,
        &plain_row(&["Email", "First Name"], &["ada@example.com", "Ada"], 2),
    )
    .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(
        body,
        json!({"ok": true, "upsert": {"created": true, "id": "9001"}})
    );

    let events = recent_events(&client, &base).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["action"], json!("created"));
    assert_eq!(events[0]["crm_id"], json!("9001"));
    let detail = events[0]["detail"].as_str().expect("detail");
    assert!(detail.contains("ada@example.com"), "got: {detail}");
}

#[tokio::test]
async fn an_unreachable_crm_maps_onto_bad_gateway() {
    // Bind and immediately drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut settings = test_settings();
    settings.hubspot_token = Some("pat-123".to_string());
    settings.hubspot_api_base = format!("http://{addr}");
    let base = start_api(settings).await;
    let client = reqwest::Client::new();

    let response = post_row(&client, &base, &plain_row(&["Email"], &["a@b.com"], 0)).await;
    assert_eq!(response.status().as_u16(), 502);
    let body: Value = response.json().await.expect("json");
    let detail = body["detail"].as_str().expect("detail");
    assert!(detail.contains("CRM search transport error"), "got: {detail}");
}

#[tokio::test]
async fn preview_reports_upload_metadata() {
    let base = start_api(test_settings()).await;
    let client = reqwest::Client::new();

    let mapping = "m".repeat(150);
    let form = Form::new()
        .part(
            "file",
            Part::bytes(b"Email,Name\n".to_vec()).file_name("contacts.csv"),
        )
        .text("mapping", mapping.clone());
    let response = client
        .post(format!("{base}/preview"))
        .multipart(form)
        .send()
        .await
        .expect("post");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    let sample = &mapping[..120];
    assert_eq!(
        body,
        json!({
            "ok": true,
            "filename": "contacts.csv",
            "bytes": 11,
            "mapping_sample": sample,
        })
    );
}

#[tokio::test]
async fn upload_parses_supported_files() {
    let base = start_api(test_settings()).await;
    let client = reqwest::Client::new();

    let form = Form::new().part(
        "file",
        Part::bytes(b"Email,First Name\na@b.com,Ada\n".to_vec()).file_name("contacts.csv"),
    );
    let response = client
        .post(format!("{base}/upload"))
        .multipart(form)
        .send()
        .await
        .expect("post");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(
        body,
        json!({
            "filename": "contacts.csv",
            "preview": {"columns": ["Email", "First Name"]},
        })
    );
}

#[tokio::test]
async fn upload_rejects_unknown_extensions() {
    let base = start_api(test_settings()).await;
    let client = reqwest::Client::new();

    let form = Form::new().part(
        "file",
        Part::bytes(b"hello".to_vec()).file_name("notes.txt"),
    );
    let response = client
        .post(format!("{base}/upload"))
        .multipart(form)
        .send()
        .await
        .expect("post");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body, json!({"error": "Unsupported file type"}));
}

#[tokio::test]
async fn upload_reports_unreadable_files() {
    let base = start_api(test_settings()).await;
    let client = reqwest::Client::new();

    let form = Form::new().part(
        "file",
        Part::bytes(b"not a workbook".to_vec()).file_name("broken.xlsx"),
    );
    let response = client
        .post(format!("{base}/upload"))
        .multipart(form)
        .send()
        .await
        .expect("post");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json");
    let error = body["error"].as_str().expect("error");
    assert!(error.starts_with("Error reading file:"), "got: {error}");
}

#[tokio::test]
async fn upload_without_a_file_part_is_rejected() {
    let base = start_api(test_settings()).await;
    let client = reqwest::Client::new();

    let form = Form::new().text("mapping", "{}");
    let response = client
        .post(format!("{base}/upload"))
        .multipart(form)
        .send()
        .await
        .expect("post");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body, json!({"error": "Missing file field"}));
}
