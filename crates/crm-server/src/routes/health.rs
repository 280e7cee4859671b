// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health check handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tokio::time::Instant;

use crate::api::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub version: &'static str,
	pub database: ComponentHealth,
	pub propagation: PropagationHealth,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
	pub status: HealthStatus,
	pub latency_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PropagationHealth {
	pub channels: usize,
	pub subscribers: usize,
}

/// GET /health - Database reachability and propagation channel counts.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let start = Instant::now();
	let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
		Ok(_) => ComponentHealth {
			status: HealthStatus::Healthy,
			latency_ms: start.elapsed().as_millis() as u64,
			error: None,
		},
		Err(e) => {
			tracing::warn!(error = %e, "Database health check failed");
			ComponentHealth {
				status: HealthStatus::Unhealthy,
				latency_ms: start.elapsed().as_millis() as u64,
				error: Some("database unreachable".to_string()),
			}
		}
	};

	let stats = state.broadcaster.stats().await;
	let status = database.status;
	let response = HealthResponse {
		status,
		version: env!("CARGO_PKG_VERSION"),
		database,
		propagation: PropagationHealth {
			channels: stats.channel_count,
			subscribers: stats.total_receivers,
		},
	};

	let code = match status {
		HealthStatus::Healthy => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};
	(code, Json(response))
}
