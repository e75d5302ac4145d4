// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity webhook configuration.

use std::time::Duration;

use gala_common_config::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable holding the signing secret.
pub const WEBHOOK_SECRET_ENV: &str = "GALA_SERVER_WEBHOOK_SECRET";

const DEFAULT_HEADER_PREFIX: &str = "svix";
const DEFAULT_TOLERANCE_SECS: u64 = 300;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_CLAIM_LEASE_SECS: u64 = 60;

/// Identity webhook configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct WebhookConfig {
	pub signing_secret: SecretString,
	/// Header name prefix: `<prefix>-id`, `<prefix>-timestamp`, `<prefix>-signature`.
	pub header_prefix: String,
	pub tolerance_secs: u64,
	pub store_timeout_ms: u64,
	pub claim_lease_secs: u64,
}

impl WebhookConfig {
	/// Defaults for everything except the secret.
	pub fn with_secret(signing_secret: SecretString) -> Self {
		Self {
			signing_secret,
			header_prefix: DEFAULT_HEADER_PREFIX.to_string(),
			tolerance_secs: DEFAULT_TOLERANCE_SECS,
			store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
			claim_lease_secs: DEFAULT_CLAIM_LEASE_SECS,
		}
	}

	pub fn tolerance(&self) -> Duration {
		Duration::from_secs(self.tolerance_secs)
	}

	pub fn store_timeout(&self) -> Duration {
		Duration::from_millis(self.store_timeout_ms)
	}

	pub fn claim_lease(&self) -> Duration {
		Duration::from_secs(self.claim_lease_secs)
	}
}

/// Identity webhook configuration layer (partial, for merging).
///
/// The secret is only ever read from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfigLayer {
	#[serde(skip)]
	pub signing_secret: Option<SecretString>,
	#[serde(default)]
	pub header_prefix: Option<String>,
	#[serde(default)]
	pub tolerance_secs: Option<u64>,
	#[serde(default)]
	pub store_timeout_ms: Option<u64>,
	#[serde(default)]
	pub claim_lease_secs: Option<u64>,
}

impl WebhookConfigLayer {
	pub fn merge(&mut self, other: WebhookConfigLayer) {
		if other.signing_secret.is_some() {
			self.signing_secret = other.signing_secret;
		}
		if other.header_prefix.is_some() {
			self.header_prefix = other.header_prefix;
		}
		if other.tolerance_secs.is_some() {
			self.tolerance_secs = other.tolerance_secs;
		}
		if other.store_timeout_ms.is_some() {
			self.store_timeout_ms = other.store_timeout_ms;
		}
		if other.claim_lease_secs.is_some() {
			self.claim_lease_secs = other.claim_lease_secs;
		}
	}

	pub fn finalize(self) -> Result<WebhookConfig, ConfigError> {
		let signing_secret = self
			.signing_secret
			.ok_or(ConfigError::MissingSecret(WEBHOOK_SECRET_ENV))?;

		let config = WebhookConfig {
			signing_secret,
			header_prefix: self
				.header_prefix
				.unwrap_or_else(|| DEFAULT_HEADER_PREFIX.to_string()),
			tolerance_secs: self.tolerance_secs.unwrap_or(DEFAULT_TOLERANCE_SECS),
			store_timeout_ms: self.store_timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT_MS),
			claim_lease_secs: self.claim_lease_secs.unwrap_or(DEFAULT_CLAIM_LEASE_SECS),
		};
		validate(&config)?;
		Ok(config)
	}
}

fn validate(config: &WebhookConfig) -> Result<(), ConfigError> {
	if config.signing_secret.expose().trim().is_empty() {
		return Err(ConfigError::MissingSecret(WEBHOOK_SECRET_ENV));
	}

	gala_common_webhook::decode_signing_secret(config.signing_secret.expose()).map_err(|e| {
		ConfigError::InvalidValue {
			key: WEBHOOK_SECRET_ENV.to_string(),
			message: format!("'whsec_' secret is not valid base64: {e}"),
		}
	})?;

	let prefix_ok = !config.header_prefix.is_empty()
		&& config
			.header_prefix
			.bytes()
			.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
	if !prefix_ok {
		return Err(ConfigError::InvalidValue {
			key: "webhook.header_prefix".to_string(),
			message: format!("'{}' is not a valid header name prefix", config.header_prefix),
		});
	}

	if config.tolerance_secs == 0 {
		return Err(ConfigError::Validation(
			"webhook.tolerance_secs must be greater than zero".to_string(),
		));
	}
	if config.store_timeout_ms == 0 {
		return Err(ConfigError::Validation(
			"webhook.store_timeout_ms must be greater than zero".to_string(),
		));
	}
	if config.claim_lease_secs == 0 {
		return Err(ConfigError::Validation(
			"webhook.claim_lease_secs must be greater than zero".to_string(),
		));
	}
	if config.store_timeout() >= config.claim_lease() {
		return Err(ConfigError::Validation(format!(
			"webhook.store_timeout_ms ({}) must be shorter than webhook.claim_lease_secs ({}s)",
			config.store_timeout_ms, config.claim_lease_secs
		)));
	}

	Ok(())
}
