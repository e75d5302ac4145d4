// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ingestion pipeline for identity provider webhooks.
//!
//! A delivery moves through:
//!
//! ```text
//! Received -> Verified -> Parsed -> Claimed | AlreadyClaimed
//!          -> Provisioned | Skipped | Failed -> Acknowledged
//! ```
//!
//! Verification and parsing never touch the store. Event types without a
//! handler are acknowledged without writing a ledger row. Everything else is
//! deduplicated through the ledger before the provisioner runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use gala_identity_core::{parse_event, Claim, Clock, EventKind, LedgerOutcome, UserId, VerifiedEvent};
use gala_server_db::LedgerStore;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IngestError, ProvisionError};
use crate::provisioner::UserProvisioner;
use crate::verifier::SignatureVerifier;

/// What happened to an accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
	/// This delivery ran the provisioner.
	Provisioned { user_id: UserId, created: bool },
	/// Another delivery with the same id owns or finished the event.
	Duplicate { outcome: LedgerOutcome },
	/// No handler for this event type; nothing written.
	Skipped { event_type: String },
}

/// Timing knobs for the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
	/// Upper bound on every durable-store call.
	pub store_timeout: Duration,
	/// How long a `processing` claim is honored before it can be taken over.
	pub claim_lease: Duration,
}

impl Default for IngestSettings {
	fn default() -> Self {
		Self {
			store_timeout: Duration::from_millis(5000),
			claim_lease: Duration::from_secs(60),
		}
	}
}

pub struct IngestionService {
	verifier: SignatureVerifier,
	ledger: Arc<dyn LedgerStore>,
	provisioner: UserProvisioner,
	clock: Arc<dyn Clock>,
	settings: IngestSettings,
}

impl IngestionService {
	pub fn new(
		verifier: SignatureVerifier,
		ledger: Arc<dyn LedgerStore>,
		provisioner: UserProvisioner,
		clock: Arc<dyn Clock>,
		settings: IngestSettings,
	) -> Self {
		Self {
			verifier,
			ledger,
			provisioner,
			clock,
			settings,
		}
	}

	/// Run one delivery through the pipeline.
	#[instrument(skip(self, headers, raw_body), fields(body_len = raw_body.len()))]
	pub async fn ingest(
		&self,
		headers: &HeaderMap,
		raw_body: &[u8],
	) -> Result<IngestOutcome, IngestError> {
		let envelope = self.verifier.verify_request(headers, raw_body)?;

		let event = parse_event(envelope.event_id, envelope.raw_body).map_err(|e| {
			warn!(event_id = envelope.event_id, error = %e, "rejecting malformed webhook payload");
			e
		})?;

		self.dispatch(event).await
	}

	/// Route a verified event to its handler.
	pub async fn dispatch(&self, event: VerifiedEvent) -> Result<IngestOutcome, IngestError> {
		match event.kind() {
			EventKind::UserCreated => self.handle_user_created(&event).await,
			EventKind::Other(event_type) => {
				info!(event_id = event.event_id(), %event_type, "ignoring unhandled webhook event type");
				Ok(IngestOutcome::Skipped { event_type })
			}
		}
	}

	#[instrument(skip(self, event), fields(event_id = %event.event_id()))]
	async fn handle_user_created(&self, event: &VerifiedEvent) -> Result<IngestOutcome, IngestError> {
		let claim = self
			.with_timeout(
				"ledger claim",
				self.ledger.try_claim(
					event.event_id(),
					event.event_type(),
					self.clock.now(),
					self.settings.claim_lease,
				),
			)
			.await?;

		let attempt = match claim {
			Claim::Claimed { attempt } => attempt,
			Claim::AlreadyClaimed { outcome } => {
				debug!(%outcome, "duplicate webhook delivery");
				return Ok(IngestOutcome::Duplicate { outcome });
			}
		};

		match self.provisioner.provision(event).await {
			Ok(provisioned) => {
				let ledger_outcome = if provisioned.was_created() {
					LedgerOutcome::Created
				} else {
					LedgerOutcome::AlreadyExisted
				};
				// The user row is durable at this point. A failed completion leaves
				// the claim in `processing` until its lease expires.
				if let Err(e) = self.complete(event, attempt, ledger_outcome, None).await {
					error!(error = %e, %ledger_outcome, "failed to record ledger outcome");
				}

				Ok(IngestOutcome::Provisioned {
					user_id: provisioned.record().id,
					created: provisioned.was_created(),
				})
			}
			Err(e) => {
				let reason = failure_reason(&e);
				if let Err(ledger_err) = self
					.complete(event, attempt, LedgerOutcome::Failed, Some(&reason))
					.await
				{
					error!(error = %ledger_err, "failed to mark ledger entry failed");
				}
				Err(e.into())
			}
		}
	}

	async fn complete(
		&self,
		event: &VerifiedEvent,
		attempt: u32,
		outcome: LedgerOutcome,
		reason: Option<&str>,
	) -> Result<bool, IngestError> {
		self
			.with_timeout(
				"ledger completion",
				self
					.ledger
					.complete(event.event_id(), attempt, outcome, reason, self.clock.now()),
			)
			.await
	}

	async fn with_timeout<T, F>(&self, operation: &'static str, fut: F) -> Result<T, IngestError>
	where
		F: Future<Output = gala_server_db::Result<T>>,
	{
		match tokio::time::timeout(self.settings.store_timeout, fut).await {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(e)) => {
				error!(operation, error = %e, "ledger store error");
				Err(IngestError::Ledger(e))
			}
			Err(_) => {
				error!(operation, timeout_ms = self.settings.store_timeout.as_millis() as u64, "store call timed out");
				Err(IngestError::Timeout(operation))
			}
		}
	}
}

fn failure_reason(err: &ProvisionError) -> String {
	match err {
		ProvisionError::MissingRequiredField(field) => format!("missing_required_field: {field}"),
		ProvisionError::ProvisioningFailure(_) => "provisioning_failed".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::verifier::compute_signature;
	use async_trait::async_trait;
	use axum::http::HeaderValue;
	use chrono::{DateTime, Utc};
	use gala_common_config::SecretString;
	use gala_identity_core::{FixedClock, LedgerEntry};
	use gala_server_db::testing::create_test_pool;
	use gala_server_db::{DbError, SqliteLedgerRepository, SqliteUserRepository, UserStore};

	const NOW: i64 = 1_700_000_000;
	const SECRET: &str = "ingest-test-secret";
	const USER_CREATED: &str = r#"{"type":"user.created","data":{"id":"ext_42","email_addresses":[{"email_address":"a@b.com"}],"first_name":"Ada","last_name":"Lovelace"}}"#;

	struct Harness {
		service: IngestionService,
		ledger: Arc<SqliteLedgerRepository>,
		users: Arc<SqliteUserRepository>,
	}

	async fn harness() -> Harness {
		let pool = create_test_pool().await;
		let ledger = Arc::new(SqliteLedgerRepository::new(pool.clone()));
		let users = Arc::new(SqliteUserRepository::new(pool));
		let service = service_with(ledger.clone(), users.clone());
		Harness {
			service,
			ledger,
			users,
		}
	}

	fn service_with(ledger: Arc<dyn LedgerStore>, users: Arc<dyn UserStore>) -> IngestionService {
		let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_unix(NOW));
		let settings = IngestSettings {
			store_timeout: Duration::from_millis(500),
			claim_lease: Duration::from_secs(60),
		};
		let verifier = SignatureVerifier::new(
			&SecretString::new(SECRET.to_string()),
			"svix",
			Duration::from_secs(300),
			clock.clone(),
		)
		.unwrap();
		let provisioner = UserProvisioner::new(users, clock.clone(), settings.store_timeout);
		IngestionService::new(verifier, ledger, provisioner, clock, settings)
	}

	fn signed_headers(event_id: &str, timestamp: i64, body: &str) -> HeaderMap {
		let ts = timestamp.to_string();
		let signature = compute_signature(SECRET.as_bytes(), event_id, &ts, body.as_bytes());
		let mut headers = HeaderMap::new();
		headers.insert("svix-id", HeaderValue::from_str(event_id).unwrap());
		headers.insert("svix-timestamp", HeaderValue::from_str(&ts).unwrap());
		headers.insert("svix-signature", HeaderValue::from_str(&signature).unwrap());
		headers
	}

	async fn deliver(h: &Harness, event_id: &str, body: &str) -> Result<IngestOutcome, IngestError> {
		h.service
			.ingest(&signed_headers(event_id, NOW, body), body.as_bytes())
			.await
	}

	#[tokio::test]
	async fn test_user_created_provisions_and_records() {
		let h = harness().await;

		let outcome = deliver(&h, "evt_1", USER_CREATED).await.unwrap();
		assert!(matches!(outcome, IngestOutcome::Provisioned { created: true, .. }));

		let user = h.users.get_by_external_id("ext_42").await.unwrap().unwrap();
		assert_eq!(user.email, "a@b.com");
		assert_eq!(user.first_name, "Ada");
		assert_eq!(user.last_name, "Lovelace");

		let entry = h.ledger.get("evt_1").await.unwrap().unwrap();
		assert_eq!(entry.outcome, LedgerOutcome::Created);
		assert!(entry.processed_at.is_some());
	}

	#[tokio::test]
	async fn test_same_event_id_is_duplicate() {
		let h = harness().await;
		deliver(&h, "evt_1", USER_CREATED).await.unwrap();

		let outcome = deliver(&h, "evt_1", USER_CREATED).await.unwrap();
		assert_eq!(
			outcome,
			IngestOutcome::Duplicate {
				outcome: LedgerOutcome::Created
			}
		);
		assert_eq!(h.users.count().await.unwrap(), 1);
		assert_eq!(h.ledger.count().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_new_event_id_for_existing_user() {
		let h = harness().await;
		deliver(&h, "evt_1", USER_CREATED).await.unwrap();

		let outcome = deliver(&h, "evt_2", USER_CREATED).await.unwrap();
		assert!(matches!(outcome, IngestOutcome::Provisioned { created: false, .. }));
		assert_eq!(h.users.count().await.unwrap(), 1);
		assert_eq!(
			h.ledger.get("evt_2").await.unwrap().unwrap().outcome,
			LedgerOutcome::AlreadyExisted
		);
	}

	#[tokio::test]
	async fn test_unhandled_type_writes_nothing() {
		let h = harness().await;
		let body = r#"{"type":"session.revoked","data":{"id":"sess_1"}}"#;

		let outcome = deliver(&h, "evt_9", body).await.unwrap();
		assert_eq!(
			outcome,
			IngestOutcome::Skipped {
				event_type: "session.revoked".to_string()
			}
		);
		assert_eq!(h.ledger.count().await.unwrap(), 0);
		assert_eq!(h.users.count().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_stale_delivery_never_reaches_store() {
		let h = harness().await;
		let headers = signed_headers("evt_1", NOW - 600, USER_CREATED);

		let err = h.service.ingest(&headers, USER_CREATED.as_bytes()).await.unwrap_err();
		assert_eq!(err.error_code(), "stale_timestamp");
		assert_eq!(h.ledger.count().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_malformed_payload_never_reaches_store() {
		let h = harness().await;
		let err = deliver(&h, "evt_1", "{not json").await.unwrap_err();
		assert_eq!(err.error_code(), "malformed_payload");
		assert_eq!(h.ledger.count().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_missing_field_marks_failed_then_redelivery_reclaims() {
		let h = harness().await;
		let broken = r#"{"type":"user.created","data":{"first_name":"Ada"}}"#;

		let err = deliver(&h, "evt_1", broken).await.unwrap_err();
		assert_eq!(err.error_code(), "missing_required_field");
		assert!(!err.is_retryable());

		let entry = h.ledger.get("evt_1").await.unwrap().unwrap();
		assert_eq!(entry.outcome, LedgerOutcome::Failed);
		assert_eq!(entry.error.as_deref(), Some("missing_required_field: data.id"));

		let outcome = deliver(&h, "evt_1", USER_CREATED).await.unwrap();
		assert!(matches!(outcome, IngestOutcome::Provisioned { created: true, .. }));
		let entry = h.ledger.get("evt_1").await.unwrap().unwrap();
		assert_eq!(entry.outcome, LedgerOutcome::Created);
		assert_eq!(entry.attempts, 2);
	}

	struct FlakyUsers {
		inner: Arc<SqliteUserRepository>,
		fail: std::sync::atomic::AtomicBool,
	}

	#[async_trait]
	impl UserStore for FlakyUsers {
		async fn upsert_by_external_id(
			&self,
			user: &gala_identity_core::NewUser,
		) -> gala_server_db::Result<gala_server_db::UpsertOutcome> {
			if self.fail.swap(false, std::sync::atomic::Ordering::SeqCst) {
				return Err(DbError::Internal("database is locked".to_string()));
			}
			self.inner.upsert_by_external_id(user).await
		}

		async fn get_by_external_id(
			&self,
			external_id: &str,
		) -> gala_server_db::Result<Option<gala_identity_core::UserRecord>> {
			self.inner.get_by_external_id(external_id).await
		}

		async fn count(&self) -> gala_server_db::Result<i64> {
			self.inner.count().await
		}
	}

	#[tokio::test]
	async fn test_storage_failure_then_retry_succeeds() {
		let pool = create_test_pool().await;
		let ledger = Arc::new(SqliteLedgerRepository::new(pool.clone()));
		let inner = Arc::new(SqliteUserRepository::new(pool));
		let users = Arc::new(FlakyUsers {
			inner: inner.clone(),
			fail: std::sync::atomic::AtomicBool::new(true),
		});
		let service = service_with(ledger.clone(), users);
		let headers = signed_headers("evt_1", NOW, USER_CREATED);

		let err = service.ingest(&headers, USER_CREATED.as_bytes()).await.unwrap_err();
		assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
		assert!(err.is_retryable());
		let failed = ledger.get("evt_1").await.unwrap().unwrap();
		assert_eq!(failed.outcome, LedgerOutcome::Failed);
		assert_eq!(failed.error.as_deref(), Some("provisioning_failed"));

		let outcome = service.ingest(&headers, USER_CREATED.as_bytes()).await.unwrap();
		assert!(matches!(outcome, IngestOutcome::Provisioned { created: true, .. }));
		assert_eq!(inner.count().await.unwrap(), 1);
	}

	struct StalledLedger;

	#[async_trait]
	impl LedgerStore for StalledLedger {
		async fn try_claim(
			&self,
			_event_id: &str,
			_event_type: &str,
			_now: DateTime<Utc>,
			_lease: Duration,
		) -> gala_server_db::Result<Claim> {
			std::future::pending().await
		}

		async fn complete(
			&self,
			_event_id: &str,
			_attempt: u32,
			_outcome: LedgerOutcome,
			_error: Option<&str>,
			_now: DateTime<Utc>,
		) -> gala_server_db::Result<bool> {
			Ok(true)
		}

		async fn get(&self, _event_id: &str) -> gala_server_db::Result<Option<LedgerEntry>> {
			Ok(None)
		}

		async fn count(&self) -> gala_server_db::Result<i64> {
			Ok(0)
		}
	}

	#[tokio::test]
	async fn test_ledger_timeout_is_retryable_failure() {
		let users = Arc::new(SqliteUserRepository::new(create_test_pool().await));
		let service = service_with(Arc::new(StalledLedger), users.clone());
		let headers = signed_headers("evt_1", NOW, USER_CREATED);

		let err = service.ingest(&headers, USER_CREATED.as_bytes()).await.unwrap_err();
		assert!(matches!(err, IngestError::Timeout("ledger claim")));
		assert_eq!(err.error_code(), "provisioning_failed");
		assert_eq!(users.count().await.unwrap(), 0);
	}
}
