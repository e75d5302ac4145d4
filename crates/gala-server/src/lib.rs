// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gala HTTP server: router, shared state and health.

pub mod health;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use gala_identity_core::Clock;
use gala_server_config::ServerConfig;
use gala_server_db::{SqliteLedgerRepository, SqliteUserRepository};
use gala_server_identity::{
	identity_webhook_routes, IngestSettings, IngestionService, InvalidSigningSecret,
	SignatureVerifier, UserProvisioner,
};
use sqlx::SqlitePool;

pub use gala_server_config::{load_config, load_config_with_file};

/// Handles shared by every request.
#[derive(Clone)]
pub struct AppState {
	pub pool: SqlitePool,
	pub ingestion: Arc<IngestionService>,
	pub store_timeout: Duration,
}

/// Wire repositories, verifier and provisioner into the application state.
pub fn create_app_state(
	pool: SqlitePool,
	config: &ServerConfig,
	clock: Arc<dyn Clock>,
) -> Result<AppState, InvalidSigningSecret> {
	let webhook = &config.webhook;
	let settings = IngestSettings {
		store_timeout: webhook.store_timeout(),
		claim_lease: webhook.claim_lease(),
	};

	let verifier = SignatureVerifier::new(
		&webhook.signing_secret,
		&webhook.header_prefix,
		webhook.tolerance(),
		Arc::clone(&clock),
	)?;
	let provisioner = UserProvisioner::new(
		Arc::new(SqliteUserRepository::new(pool.clone())),
		Arc::clone(&clock),
		settings.store_timeout,
	);
	let ingestion = IngestionService::new(
		verifier,
		Arc::new(SqliteLedgerRepository::new(pool.clone())),
		provisioner,
		clock,
		settings,
	);

	Ok(AppState {
		pool,
		ingestion: Arc::new(ingestion),
		store_timeout: settings.store_timeout,
	})
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health::health_check))
		.with_state(state.clone())
		.merge(identity_webhook_routes(state.ingestion))
}
