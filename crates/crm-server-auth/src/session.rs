// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Login sessions.
//!
//! A session records a snapshot of the principal's role and flattened
//! permissions at login. The snapshot is informational: request handling
//! always re-derives permissions from the persisted role.
//!
//! - Tokens are 32 bytes of OS randomness, hex-encoded
//! - Only the SHA-256 of a token is stored ([`crate::hash_token`])

use chrono::{DateTime, Duration, Utc};
use crm_rbac_core::{PermissionSet, Principal, RoleName, SessionId, UserId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

pub const SESSION_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
	pub id: SessionId,
	pub user_id: UserId,
	#[serde(skip_serializing, default)]
	pub token_hash: String,
	pub role_snapshot: Option<RoleName>,
	pub permissions_snapshot: PermissionSet,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl Session {
	#[instrument(level = "debug", skip(token_hash, principal), fields(user_id = %principal.id))]
	pub fn new(token_hash: String, principal: &Principal, ttl: std::time::Duration) -> Self {
		let now = Utc::now();
		let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::hours(24));
		Self {
			id: SessionId::generate(),
			user_id: principal.id,
			token_hash,
			role_snapshot: principal.role,
			permissions_snapshot: principal.permissions.clone(),
			created_at: now,
			expires_at: now + ttl,
		}
	}

	pub fn is_expired(&self) -> bool {
		self.is_expired_at(Utc::now())
	}

	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at
	}
}

pub fn generate_session_token() -> String {
	use rand::Rng;
	let bytes: [u8; SESSION_TOKEN_BYTES] = rand::thread_rng().gen();
	hex::encode(bytes)
}
