// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canonical user records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::event::UserCreatedData;

/// Internal identifier of a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
	pub fn new(id: Uuid) -> Self {
		Self(id)
	}

	pub fn generate() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn into_inner(self) -> Uuid {
		self.0
	}
}

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for UserId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// The one canonical record per external identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
	pub id: UserId,
	/// Identity provider's user id. Unique.
	pub external_id: String,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
	pub created_at: DateTime<Utc>,
}

/// A user record that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
	pub id: UserId,
	pub external_id: String,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
	pub created_at: DateTime<Utc>,
}

impl NewUser {
	pub fn from_event_data(data: UserCreatedData, created_at: DateTime<Utc>) -> Self {
		Self {
			id: UserId::generate(),
			external_id: data.external_id,
			email: data.email,
			first_name: data.first_name,
			last_name: data.last_name,
			created_at,
		}
	}

	pub fn into_record(self) -> UserRecord {
		UserRecord {
			id: self.id,
			external_id: self.external_id,
			email: self.email,
			first_name: self.first_name,
			last_name: self.last_name,
			created_at: self.created_at,
		}
	}
}
