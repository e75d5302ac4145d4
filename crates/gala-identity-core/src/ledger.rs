// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Idempotency ledger types.
//!
//! One ledger row exists per delivered event id. The row is written by the
//! first delivery to claim the id, starts as [`LedgerOutcome::Processing`]
//! and moves exactly once to a terminal outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOutcome {
	/// Claimed; provisioning in flight.
	Processing,
	/// Provisioning wrote a new user.
	Created,
	/// The user already existed; nothing written.
	AlreadyExisted,
	/// Provisioning failed. A redelivery may re-claim the row.
	Failed,
}

impl LedgerOutcome {
	pub fn is_terminal(self) -> bool {
		!matches!(self, Self::Processing)
	}

	pub fn is_success(self) -> bool {
		matches!(self, Self::Created | Self::AlreadyExisted)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Processing => "processing",
			Self::Created => "created",
			Self::AlreadyExisted => "already_existed",
			Self::Failed => "failed",
		}
	}
}

impl fmt::Display for LedgerOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for LedgerOutcome {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"processing" => Ok(Self::Processing),
			"created" => Ok(Self::Created),
			"already_existed" => Ok(Self::AlreadyExisted),
			"failed" => Ok(Self::Failed),
			_ => Err(format!("unknown ledger outcome: {s}")),
		}
	}
}

/// A durable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
	pub event_id: String,
	pub event_type: String,
	pub outcome: LedgerOutcome,
	/// Number of times the row has been claimed (1 on first delivery).
	pub attempts: u32,
	pub claimed_at: DateTime<Utc>,
	pub processed_at: Option<DateTime<Utc>>,
	pub error: Option<String>,
}

/// Result of trying to claim an event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
	/// This caller owns the event and must process it.
	Claimed { attempt: u32 },
	/// Another delivery owns or already finished the event.
	AlreadyClaimed { outcome: LedgerOutcome },
}

impl Claim {
	pub fn is_claimed(&self) -> bool {
		matches!(self, Self::Claimed { .. })
	}
}
