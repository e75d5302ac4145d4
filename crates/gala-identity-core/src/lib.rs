// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for identity event ingestion.
//!
//! This crate holds the pure, I/O-free half of the pipeline:
//!
//! - `event` - [`VerifiedEvent`] and the envelope parser ([`parse_event`])
//! - `user` - the canonical [`UserRecord`] and the fields a `user.created`
//!   event contributes to it
//! - `ledger` - idempotency ledger rows and claim results
//! - `clock` - injectable time source for timestamp checks

pub mod clock;
pub mod error;
pub mod event;
pub mod ledger;
pub mod user;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{EventDataError, ParseError};
pub use event::{parse_event, EventKind, UserCreatedData, VerifiedEvent, USER_CREATED};
pub use ledger::{Claim, LedgerEntry, LedgerOutcome};
pub use user::{NewUser, UserId, UserRecord};
