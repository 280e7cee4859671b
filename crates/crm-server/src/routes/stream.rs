// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-sent permission change notices.
//!
//! Each stream is subscribed to the caller's role channel and user channel.
//! Events carry identifiers only; a client refetches its permissions on
//! receipt. Delivery is best effort: a lagging receiver skips what it missed.

use std::convert::Infallible;

use axum::{
	extract::State,
	response::sse::{Event, KeepAlive, Sse},
};
use crm_rbac_core::PermissionEvent;
use futures::{
	stream::{self, Stream},
	StreamExt,
};
use tokio_stream::wrappers::BroadcastStream;

use crate::{api::AppState, auth_middleware::RequireAuth};

/// GET /api/permissions/stream - SSE stream of [`PermissionEvent`]s for the caller.
#[tracing::instrument(skip(state, current_user), fields(user_id = %current_user.principal.id))]
pub async fn permissions_stream(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
	let user_id = current_user.principal.id;
	let role_id = current_user.account.role.as_ref().map(|role| role.id);

	let mut receivers = vec![BroadcastStream::new(
		state.broadcaster.subscribe_user(user_id).await,
	)];
	if let Some(role_id) = role_id {
		receivers.push(BroadcastStream::new(
			state.broadcaster.subscribe_role(role_id).await,
		));
	}

	tracing::debug!(role_id = ?role_id, "Permission stream opened");

	let connected = stream::once(async move {
		Ok::<_, Infallible>(to_sse_event(&PermissionEvent::connected(user_id, role_id)))
	});

	let updates = stream::select_all(receivers).filter_map(move |result| async move {
		match result {
			Ok(event) => Some(Ok(to_sse_event(&event))),
			Err(e) => {
				tracing::warn!(%user_id, error = %e, "Permission stream lagged; events skipped");
				None
			}
		}
	});

	Sse::new(connected.chain(updates)).keep_alive(
		KeepAlive::new()
			.interval(state.broadcaster.heartbeat_interval())
			.text("heartbeat"),
	)
}

/// Render an event as an SSE frame named after its type.
pub fn to_sse_event(event: &PermissionEvent) -> Event {
	let base = Event::default().event(event.event_type());
	match serde_json::to_string(event) {
		Ok(json) => base.data(json),
		Err(e) => {
			tracing::warn!(event_type = event.event_type(), error = %e, "Failed to serialize permission event");
			base.data("{}")
		}
	}
}
