// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Failed-login lockout.
//!
//! After `max_attempts` consecutive failures the account is locked for
//! `lock_duration`. While locked every attempt is refused, including one with
//! the correct password. Once the window has passed the counter starts over.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCK_DURATION_SECS: i64 = 2 * 60 * 60;

/// Persisted lockout counters of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
	pub login_attempts: u32,
	pub lock_until: Option<DateTime<Utc>>,
}

impl LockState {
	pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
		self.lock_until.is_some_and(|until| until > now)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
	pub max_attempts: u32,
	pub lock_duration: Duration,
}

impl Default for LockoutPolicy {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			lock_duration: Duration::seconds(DEFAULT_LOCK_DURATION_SECS),
		}
	}
}

impl LockoutPolicy {
	pub fn new(max_attempts: u32, lock_duration: std::time::Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			lock_duration: Duration::from_std(lock_duration)
				.unwrap_or_else(|_| Duration::seconds(DEFAULT_LOCK_DURATION_SECS)),
		}
	}

	/// State to evaluate an attempt against: an expired lock is cleared.
	pub fn current(&self, state: LockState, now: DateTime<Utc>) -> LockState {
		match state.lock_until {
			Some(until) if until <= now => LockState::default(),
			_ => state,
		}
	}

	/// State after one more failed attempt.
	pub fn register_failure(&self, state: LockState, now: DateTime<Utc>) -> LockState {
		let state = self.current(state, now);
		if state.is_locked(now) {
			return state;
		}
		let login_attempts = state.login_attempts.saturating_add(1);
		let lock_until = (login_attempts >= self.max_attempts).then(|| now + self.lock_duration);
		LockState {
			login_attempts,
			lock_until,
		}
	}
}
