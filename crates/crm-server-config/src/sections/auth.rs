// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication and lockout configuration.

use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_AUTH_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCK_DURATION_SECS: u64 = 2 * 60 * 60;
pub const DEFAULT_SESSION_CLEANUP_INTERVAL_SECS: u64 = 60 * 60;

#[derive(Debug, Clone)]
pub struct AuthConfig {
	pub environment: String,
	pub session_ttl_secs: u64,
	/// Upper bound on credential validation for a single request.
	pub auth_timeout_ms: u64,
	pub max_login_attempts: u32,
	pub lock_duration_secs: u64,
	pub session_cleanup_interval_secs: u64,
}

impl AuthConfig {
	pub fn auth_timeout(&self) -> Duration {
		Duration::from_millis(self.auth_timeout_ms)
	}

	pub fn session_ttl(&self) -> Duration {
		Duration::from_secs(self.session_ttl_secs)
	}

	pub fn lock_duration(&self) -> Duration {
		Duration::from_secs(self.lock_duration_secs)
	}

	pub fn is_production(&self) -> bool {
		self.environment == "production"
	}
}

impl Default for AuthConfig {
	fn default() -> Self {
		AuthConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigLayer {
	#[serde(default)]
	pub environment: Option<String>,
	#[serde(default)]
	pub session_ttl_secs: Option<u64>,
	#[serde(default)]
	pub auth_timeout_ms: Option<u64>,
	#[serde(default)]
	pub max_login_attempts: Option<u32>,
	#[serde(default)]
	pub lock_duration_secs: Option<u64>,
	#[serde(default)]
	pub session_cleanup_interval_secs: Option<u64>,
}

impl AuthConfigLayer {
	pub fn merge(&mut self, other: AuthConfigLayer) {
		if other.environment.is_some() {
			self.environment = other.environment;
		}
		if other.session_ttl_secs.is_some() {
			self.session_ttl_secs = other.session_ttl_secs;
		}
		if other.auth_timeout_ms.is_some() {
			self.auth_timeout_ms = other.auth_timeout_ms;
		}
		if other.max_login_attempts.is_some() {
			self.max_login_attempts = other.max_login_attempts;
		}
		if other.lock_duration_secs.is_some() {
			self.lock_duration_secs = other.lock_duration_secs;
		}
		if other.session_cleanup_interval_secs.is_some() {
			self.session_cleanup_interval_secs = other.session_cleanup_interval_secs;
		}
	}

	pub fn finalize(self) -> AuthConfig {
		AuthConfig {
			environment: self
				.environment
				.unwrap_or_else(|| "development".to_string()),
			session_ttl_secs: self.session_ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS),
			auth_timeout_ms: self.auth_timeout_ms.unwrap_or(DEFAULT_AUTH_TIMEOUT_MS),
			max_login_attempts: self
				.max_login_attempts
				.unwrap_or(DEFAULT_MAX_LOGIN_ATTEMPTS),
			lock_duration_secs: self
				.lock_duration_secs
				.unwrap_or(DEFAULT_LOCK_DURATION_SECS),
			session_cleanup_interval_secs: self
				.session_cleanup_interval_secs
				.unwrap_or(DEFAULT_SESSION_CLEANUP_INTERVAL_SECS),
		}
	}
}
