// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic background work.

pub mod session_cleanup;

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::AppState;
pub use session_cleanup::{CleanupReport, SessionCleanupJob};

/// Run session cleanup and the propagation heartbeat until the task is aborted.
pub fn spawn_background_jobs(state: AppState, cleanup_interval: Duration) -> JoinHandle<()> {
	let job = SessionCleanupJob::new(state.session_repo.clone(), state.broadcaster.clone());
	let broadcaster = state.broadcaster.clone();

	tokio::spawn(async move {
		let mut cleanup = tokio::time::interval(cleanup_interval.max(Duration::from_secs(1)));
		cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
		let mut heartbeat = tokio::time::interval(broadcaster.heartbeat_interval().max(Duration::from_secs(1)));
		heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

		tracing::info!(
			cleanup_interval_secs = cleanup_interval.as_secs(),
			"Background jobs started"
		);

		loop {
			tokio::select! {
				_ = cleanup.tick() => {
					if let Err(e) = job.run().await {
						tracing::warn!(error = %e, "Session cleanup failed");
					}
				}
				_ = heartbeat.tick() => {
					broadcaster.broadcast_heartbeat().await;
				}
			}
		}
	})
}
