// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end tests for the identity webhook endpoint.

use std::sync::Arc;

use axum::{
	body::Body,
	http::{Request, StatusCode},
	Router,
};
use gala_common_config::SecretString;
use gala_identity_core::{FixedClock, LedgerOutcome};
use gala_server::{create_app_state, create_router};
use gala_server_config::{
	DatabaseConfig, HttpConfig, LoggingConfig, ServerConfig, WebhookConfig,
};
use gala_server_db::{LedgerStore, SqliteLedgerRepository, SqliteUserRepository, UserStore};
use gala_server_identity::{compute_signature, IDENTITY_WEBHOOK_PATH};
use sqlx::SqlitePool;
use tempfile::tempdir;
use tower::ServiceExt;

const NOW: i64 = 1_735_689_600;
const SIGNING_KEY: &[u8] = b"integration-signing-key";
// base64("integration-signing-key")
const SIGNING_SECRET: &str = "whsec_aW50ZWdyYXRpb24tc2lnbmluZy1rZXk=";

const EXT_42_CREATED: &str = r#"{"type":"user.created","data":{"id":"ext_42","email_addresses":[{"email_address":"a@b.com"}],"first_name":"Ada","last_name":"Lovelace"}}"#;

fn test_config() -> ServerConfig {
	ServerConfig {
		environment: "test".to_string(),
		http: HttpConfig::default(),
		database: DatabaseConfig::default(),
		webhook: WebhookConfig::with_secret(SecretString::new(SIGNING_SECRET.to_string())),
		logging: LoggingConfig::default(),
	}
}

/// Creates a test app backed by a file database in a temp dir.
async fn setup_test_app() -> (Router, SqlitePool, tempfile::TempDir) {
	let dir = tempdir().unwrap();
	let db_path = dir.path().join("test_webhooks.db");
	let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
	let pool = gala_server_db::create_pool(&db_url).await.unwrap();
	gala_server_db::run_migrations(&pool).await.unwrap();

	let state = create_app_state(
		pool.clone(),
		&test_config(),
		Arc::new(FixedClock::at_unix(NOW)),
	)
	.unwrap();
	(create_router(state), pool, dir)
}

fn webhook_request(event_id: &str, timestamp: i64, body: &str) -> Request<Body> {
	let ts = timestamp.to_string();
	let signature = compute_signature(SIGNING_KEY, event_id, &ts, body.as_bytes());
	Request::builder()
		.method("POST")
		.uri(IDENTITY_WEBHOOK_PATH)
		.header("content-type", "application/json")
		.header("svix-id", event_id)
		.header("svix-timestamp", ts)
		.header("svix-signature", signature)
		.body(Body::from(body.to_string()))
		.unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
	let response = app.clone().oneshot(request).await.unwrap();
	let status = response.status();
	let body = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
	(status, json)
}

// ============================================================================
// Provisioning
// ============================================================================

#[tokio::test]
async fn test_user_created_then_replayed_under_new_id() {
	let (app, pool, _dir) = setup_test_app().await;
	let users = SqliteUserRepository::new(pool.clone());
	let ledger = SqliteLedgerRepository::new(pool);

	let (status, body) = send(&app, webhook_request("evt_1", NOW, EXT_42_CREATED)).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, serde_json::json!({"message": "ok"}));

	let user = users.get_by_external_id("ext_42").await.unwrap().unwrap();
	assert_eq!(user.email, "a@b.com");
	assert_eq!(user.first_name, "Ada");
	assert_eq!(user.last_name, "Lovelace");

	let (status, _) = send(&app, webhook_request("evt_2", NOW, EXT_42_CREATED)).await;
	assert_eq!(status, StatusCode::OK);

	assert_eq!(users.count().await.unwrap(), 1);
	assert_eq!(
		ledger.get("evt_1").await.unwrap().unwrap().outcome,
		LedgerOutcome::Created
	);
	assert_eq!(
		ledger.get("evt_2").await.unwrap().unwrap().outcome,
		LedgerOutcome::AlreadyExisted
	);
}

#[tokio::test]
async fn test_same_event_redelivered_is_acknowledged_once() {
	let (app, pool, _dir) = setup_test_app().await;

	for _ in 0..3 {
		let (status, _) = send(&app, webhook_request("evt_1", NOW, EXT_42_CREATED)).await;
		assert_eq!(status, StatusCode::OK);
	}

	assert_eq!(SqliteUserRepository::new(pool.clone()).count().await.unwrap(), 1);
	let entry = SqliteLedgerRepository::new(pool)
		.get("evt_1")
		.await
		.unwrap()
		.unwrap();
	assert_eq!(entry.outcome, LedgerOutcome::Created);
	assert_eq!(entry.attempts, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_deliveries_provision_once() {
	let (app, pool, _dir) = setup_test_app().await;

	let mut handles = Vec::new();
	for _ in 0..6 {
		let app = app.clone();
		handles.push(tokio::spawn(async move {
			send(&app, webhook_request("evt_race", NOW, EXT_42_CREATED)).await.0
		}));
	}
	for handle in handles {
		assert_eq!(handle.await.unwrap(), StatusCode::OK);
	}

	let ledger = SqliteLedgerRepository::new(pool.clone());
	assert_eq!(SqliteUserRepository::new(pool).count().await.unwrap(), 1);
	assert_eq!(ledger.count().await.unwrap(), 1);
	let entry = ledger.get("evt_race").await.unwrap().unwrap();
	assert_eq!(entry.outcome, LedgerOutcome::Created);
	assert_eq!(entry.attempts, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_redeliveries_and_new_ids_provision_once() {
	let (app, pool, _dir) = setup_test_app().await;

	let mut handles = Vec::new();
	for i in 0..40 {
		let app = app.clone();
		let event_id = if i % 2 == 0 {
			"evt_same".to_string()
		} else {
			format!("evt_{i}")
		};
		handles.push(tokio::spawn(async move {
			send(&app, webhook_request(&event_id, NOW, EXT_42_CREATED)).await.0
		}));
	}
	for handle in handles {
		assert_eq!(handle.await.unwrap(), StatusCode::OK);
	}

	let ledger = SqliteLedgerRepository::new(pool.clone());
	assert_eq!(SqliteUserRepository::new(pool).count().await.unwrap(), 1);
	assert_eq!(ledger.count().await.unwrap(), 21);
	let entry = ledger.get("evt_same").await.unwrap().unwrap();
	assert!(entry.outcome.is_success());
	assert_eq!(entry.attempts, 1);
}

#[tokio::test]
async fn test_non_string_names_provision_with_empty_names() {
	let (app, pool, _dir) = setup_test_app().await;
	let body = r#"{"type":"user.created","data":{"id":"ext_7","email_addresses":[{"email_address":"g@h.io"}],"first_name":5}}"#;

	let (status, _) = send(&app, webhook_request("evt_names", NOW, body)).await;
	assert_eq!(status, StatusCode::OK);

	let user = SqliteUserRepository::new(pool)
		.get_by_external_id("ext_7")
		.await
		.unwrap()
		.unwrap();
	assert_eq!(user.first_name, "");
	assert_eq!(user.last_name, "");
}

#[tokio::test]
async fn test_distinct_events_for_same_identity_yield_one_user() {
	let (app, pool, _dir) = setup_test_app().await;

	for event_id in ["evt_a", "evt_b", "evt_c"] {
		let (status, _) = send(&app, webhook_request(event_id, NOW, EXT_42_CREATED)).await;
		assert_eq!(status, StatusCode::OK);
	}

	assert_eq!(SqliteUserRepository::new(pool.clone()).count().await.unwrap(), 1);
	assert_eq!(SqliteLedgerRepository::new(pool).count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_unhandled_event_type_writes_nothing() {
	let (app, pool, _dir) = setup_test_app().await;
	let body = r#"{"type":"session.revoked","data":{"id":"sess_1","user_id":"ext_42"}}"#;

	let (status, json) = send(&app, webhook_request("evt_s", NOW, body)).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(json, serde_json::json!({"message": "ok"}));

	assert_eq!(SqliteLedgerRepository::new(pool.clone()).count().await.unwrap(), 0);
	assert_eq!(SqliteUserRepository::new(pool).count().await.unwrap(), 0);
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn test_stale_timestamp_rejected_without_ledger_row() {
	let (app, pool, _dir) = setup_test_app().await;

	let (status, json) = send(&app, webhook_request("evt_old", NOW - 600, EXT_42_CREATED)).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json, serde_json::json!({"error": "stale_timestamp"}));
	assert_eq!(SqliteLedgerRepository::new(pool).count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_tampered_body_rejected() {
	let (app, pool, _dir) = setup_test_app().await;
	let mut request = webhook_request("evt_1", NOW, EXT_42_CREATED);
	*request.body_mut() = Body::from(EXT_42_CREATED.replace("a@b.com", "evil@b.com"));

	let (status, json) = send(&app, request).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json, serde_json::json!({"error": "invalid_signature"}));
	assert_eq!(SqliteUserRepository::new(pool).count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_integer_timestamp_rejected() {
	let (app, _pool, _dir) = setup_test_app().await;
	let request = Request::builder()
		.method("POST")
		.uri(IDENTITY_WEBHOOK_PATH)
		.header("svix-id", "evt_1")
		.header("svix-timestamp", "soon")
		.header("svix-signature", "v1,AAAA")
		.body(Body::from(EXT_42_CREATED))
		.unwrap();

	let (status, json) = send(&app, request).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json, serde_json::json!({"error": "invalid_timestamp"}));
}

#[tokio::test]
async fn test_malformed_payload_rejected() {
	let (app, pool, _dir) = setup_test_app().await;

	let (status, json) = send(&app, webhook_request("evt_1", NOW, r#"{"type":42}"#)).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json, serde_json::json!({"error": "malformed_payload"}));
	assert_eq!(SqliteLedgerRepository::new(pool).count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_field_marks_failed_and_corrected_redelivery_succeeds() {
	let (app, pool, _dir) = setup_test_app().await;
	let ledger = SqliteLedgerRepository::new(pool.clone());
	let broken = r#"{"type":"user.created","data":{"id":"ext_42","email_addresses":[]}}"#;

	let (status, json) = send(&app, webhook_request("evt_1", NOW, broken)).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json, serde_json::json!({"error": "missing_required_field"}));
	assert_eq!(
		ledger.get("evt_1").await.unwrap().unwrap().outcome,
		LedgerOutcome::Failed
	);

	let (status, _) = send(&app, webhook_request("evt_1", NOW, EXT_42_CREATED)).await;
	assert_eq!(status, StatusCode::OK);
	let entry = ledger.get("evt_1").await.unwrap().unwrap();
	assert_eq!(entry.outcome, LedgerOutcome::Created);
	assert_eq!(entry.attempts, 2);
	assert_eq!(SqliteUserRepository::new(pool).count().await.unwrap(), 1);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_database_ok() {
	let (app, _pool, _dir) = setup_test_app().await;
	let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

	let (status, json) = send(&app, request).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(json, serde_json::json!({"status": "ok", "database": "ok"}));
}

#[tokio::test]
async fn test_health_reports_closed_database() {
	let (app, pool, _dir) = setup_test_app().await;
	pool.close().await;
	let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

	let (status, json) = send(&app, request).await;
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(
		json,
		serde_json::json!({"status": "unhealthy", "database": "error"})
	);
}
