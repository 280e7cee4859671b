// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication and authorization error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
	// =========================================================================
	// Authentication Errors
	// =========================================================================
	/// No credential was presented.
	#[error("authentication required")]
	MissingCredentials,

	/// Unknown email, wrong password, or unknown session token.
	#[error("invalid credentials")]
	InvalidCredentials,

	#[error("session expired")]
	SessionExpired,

	/// Too many consecutive failures; attempts are refused until `until`.
	#[error("account locked until {until}")]
	AccountLocked { until: DateTime<Utc> },

	#[error("account disabled")]
	AccountDisabled,

	/// Credential validation did not finish within the configured bound.
	#[error("authentication timed out")]
	Timeout,

	// =========================================================================
	// Authorization Errors
	// =========================================================================
	#[error("{0}")]
	Forbidden(String),

	/// The principal's role data is missing or unreadable. Handled as a denial.
	#[error("integrity error: {0}")]
	Integrity(String),

	// =========================================================================
	// Internal Errors
	// =========================================================================
	#[error("database error: {0}")]
	Database(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl AuthError {
	/// Internal errors must be logged and never shown to the caller verbatim.
	pub fn is_internal(&self) -> bool {
		matches!(self, AuthError::Database(_) | AuthError::Internal(_))
	}

	pub fn status_code(&self) -> u16 {
		match self {
			AuthError::MissingCredentials
			| AuthError::InvalidCredentials
			| AuthError::SessionExpired
			| AuthError::AccountLocked { .. }
			| AuthError::AccountDisabled
			| AuthError::Timeout => 401,
			AuthError::Forbidden(_) | AuthError::Integrity(_) => 403,
			AuthError::Database(_) | AuthError::Internal(_) => 500,
		}
	}
}

pub type Result<T> = std::result::Result<T, AuthError>;
