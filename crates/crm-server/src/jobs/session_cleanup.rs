// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use crm_server_db::{DbError, SessionStore};
use tracing::instrument;

use crate::broadcaster::PermissionsBroadcaster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupReport {
	pub sessions_deleted: u64,
	pub channels_removed: usize,
}

/// Deletes expired sessions and drops broadcast channels nobody listens to.
pub struct SessionCleanupJob {
	session_repo: Arc<dyn SessionStore>,
	broadcaster: Arc<PermissionsBroadcaster>,
}

impl SessionCleanupJob {
	pub fn new(session_repo: Arc<dyn SessionStore>, broadcaster: Arc<PermissionsBroadcaster>) -> Self {
		Self {
			session_repo,
			broadcaster,
		}
	}

	#[instrument(skip(self), fields(job_id = "session-cleanup"))]
	pub async fn run(&self) -> Result<CleanupReport, DbError> {
		let sessions_deleted = self.session_repo.delete_expired_sessions().await?;
		let channels_removed = self.broadcaster.cleanup_empty_channels().await;

		if sessions_deleted > 0 || channels_removed > 0 {
			tracing::info!(sessions_deleted, channels_removed, "Session cleanup completed");
		}

		Ok(CleanupReport {
			sessions_deleted,
			channels_removed,
		})
	}
}
