// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Time source abstraction.
//!
//! Timestamp freshness checks take the current time from a [`Clock`] so
//! tests can pin it.

use chrono::{DateTime, TimeZone, Utc};

pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
	instant: DateTime<Utc>,
}

impl FixedClock {
	pub fn new(instant: DateTime<Utc>) -> Self {
		Self { instant }
	}

	/// Clock frozen at `secs` seconds after the Unix epoch.
	///
	/// Out-of-range values clamp to the epoch.
	pub fn at_unix(secs: i64) -> Self {
		let instant = Utc
			.timestamp_opt(secs, 0)
			.single()
			.unwrap_or_default();
		Self { instant }
	}
}

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		self.instant
	}
}
