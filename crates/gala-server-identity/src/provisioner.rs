// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Materializes `user.created` events into user records.

use std::sync::Arc;
use std::time::Duration;

use gala_identity_core::{Clock, NewUser, UserCreatedData, UserRecord, VerifiedEvent};
use gala_server_db::{DbError, UpsertOutcome, UserStore};
use tracing::{error, info, instrument};

use crate::error::ProvisionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
	Created(UserRecord),
	AlreadyExisted(UserRecord),
}

impl ProvisionOutcome {
	pub fn record(&self) -> &UserRecord {
		match self {
			Self::Created(record) | Self::AlreadyExisted(record) => record,
		}
	}

	pub fn was_created(&self) -> bool {
		matches!(self, Self::Created(_))
	}
}

impl From<UpsertOutcome> for ProvisionOutcome {
	fn from(outcome: UpsertOutcome) -> Self {
		match outcome {
			UpsertOutcome::Created(record) => Self::Created(record),
			UpsertOutcome::AlreadyExisted(record) => Self::AlreadyExisted(record),
		}
	}
}

pub struct UserProvisioner {
	users: Arc<dyn UserStore>,
	clock: Arc<dyn Clock>,
	store_timeout: Duration,
}

impl UserProvisioner {
	pub fn new(users: Arc<dyn UserStore>, clock: Arc<dyn Clock>, store_timeout: Duration) -> Self {
		Self {
			users,
			clock,
			store_timeout,
		}
	}

	/// Write the user named by a `user.created` event, once per external id.
	///
	/// An existing user is not an error. Missing fields are permanent
	/// failures; storage errors and timeouts are retryable.
	#[instrument(skip(self, event), fields(event_id = %event.event_id()))]
	pub async fn provision(&self, event: &VerifiedEvent) -> Result<ProvisionOutcome, ProvisionError> {
		let data = UserCreatedData::from_event(event)?;
		let user = NewUser::from_event_data(data, self.clock.now());

		let upsert = tokio::time::timeout(self.store_timeout, self.users.upsert_by_external_id(&user))
			.await
			.map_err(|_| {
				error!(external_id = %user.external_id, "user upsert timed out");
				ProvisionError::ProvisioningFailure("user store timed out".to_string())
			})?;

		let outcome: ProvisionOutcome = match upsert {
			Ok(outcome) => outcome.into(),
			Err(DbError::Conflict(msg)) => {
				error!(external_id = %user.external_id, %msg, "unexpected unique violation provisioning user");
				return Err(ProvisionError::ProvisioningFailure(msg));
			}
			Err(e) => {
				error!(external_id = %user.external_id, error = %e, "failed to provision user");
				return Err(e.into());
			}
		};

		let record = outcome.record();
		if outcome.was_created() {
			info!(user_id = %record.id, external_id = %record.external_id, "user provisioned");
		} else {
			info!(user_id = %record.id, external_id = %record.external_id, "user already provisioned");
		}

		Ok(outcome)
	}
}
