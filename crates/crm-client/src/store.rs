// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory permission snapshot shared by the client and its subscriber.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crm_rbac_core::Principal;
use tokio::sync::RwLock;

use crate::permissions::Permissions;

#[derive(Debug, Default)]
struct StoreState {
	principal: Option<Principal>,
	/// Bumped on every write, including writes that change nothing.
	version: u64,
	refreshed_at: Option<DateTime<Utc>>,
}

/// Thread-safe holder of the latest permission set fetched from the server.
///
/// Writes always overwrite; applying the same fetch twice leaves the same
/// permissions behind.
#[derive(Debug, Clone, Default)]
pub struct PermissionStore {
	inner: Arc<RwLock<StoreState>>,
}

impl PermissionStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Overwrite the snapshot. Returns the new version.
	pub async fn replace(&self, principal: Principal) -> u64 {
		let mut state = self.inner.write().await;
		let changed = state.principal.as_ref() != Some(&principal);
		state.principal = Some(principal);
		state.version += 1;
		state.refreshed_at = Some(Utc::now());
		tracing::debug!(version = state.version, changed, "Permission snapshot replaced");
		state.version
	}

	/// Drop the snapshot, e.g. after the session was revoked.
	pub async fn clear(&self) -> u64 {
		let mut state = self.inner.write().await;
		state.principal = None;
		state.version += 1;
		state.refreshed_at = Some(Utc::now());
		state.version
	}

	pub async fn permissions(&self) -> Permissions {
		let state = self.inner.read().await;
		state
			.principal
			.clone()
			.map(Permissions::new)
			.unwrap_or_default()
	}

	pub async fn version(&self) -> u64 {
		self.inner.read().await.version
	}

	pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
		self.inner.read().await.refreshed_at
	}

	pub async fn is_loaded(&self) -> bool {
		self.inner.read().await.principal.is_some()
	}
}
