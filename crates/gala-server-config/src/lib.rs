// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Gala server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`GALA_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use gala_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}:{}", config.http.host, config.http.port);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

const DEFAULT_ENVIRONMENT: &str = "development";

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	/// Deployment environment name (`development`, `production`, ...).
	pub environment: String,
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub webhook: WebhookConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}

	pub fn is_production(&self) -> bool {
		self.environment == "production"
	}

	/// Log the resolved configuration. The signing secret is never emitted.
	///
	/// Call after tracing is initialised.
	pub fn log_summary(&self) {
		info!(
			environment = %self.environment,
			host = %self.http.host,
			port = self.http.port,
			database = %self.database.url,
			max_connections = self.database.max_connections,
			header_prefix = %self.webhook.header_prefix,
			tolerance_secs = self.webhook.tolerance_secs,
			store_timeout_ms = self.webhook.store_timeout_ms,
			claim_lease_secs = self.webhook.claim_lease_secs,
			log_format = ?self.logging.format,
			"Server configuration loaded"
		);
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`GALA_SERVER_*`)
/// 2. Config file (`/etc/gala/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let environment = layer
		.environment
		.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
	let is_production = environment == "production";

	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize(is_production);
	let webhook = layer.webhook.unwrap_or_default().finalize()?;

	validate_config(&database)?;

	Ok(ServerConfig {
		environment,
		http,
		database,
		webhook,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(database: &DatabaseConfig) -> Result<(), ConfigError> {
	if database.max_connections == 0 {
		return Err(ConfigError::Validation(
			"database.max_connections must be at least 1".to_string(),
		));
	}
	if !database.url.starts_with("sqlite:") {
		return Err(ConfigError::InvalidValue {
			key: "database.url".to_string(),
			message: format!("'{}' is not a sqlite: URL", database.url),
		});
	}

	Ok(())
}
