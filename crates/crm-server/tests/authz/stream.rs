// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-sent permission change stream.

use std::time::Duration;

use axum::{
	body::{Body, BodyDataStream},
	http::{header::CONTENT_TYPE, StatusCode},
};
use crm_rbac_core::{Action, RoleName};
use futures::StreamExt;
use serde_json::json;

use super::support::{agent_matrix_with, TestApp};

/// Read the stream until a frame naming `event_type` arrives and return the
/// text read so far.
async fn read_until(stream: &mut BodyDataStream, event_type: &str) -> String {
	let needle = format!("event: {event_type}");
	let mut text = String::new();
	tokio::time::timeout(Duration::from_secs(5), async {
		while !text.contains(&needle) {
			let chunk = stream
				.next()
				.await
				.expect("stream ended")
				.expect("stream errored");
			text.push_str(&String::from_utf8_lossy(&chunk));
		}
	})
	.await
	.unwrap_or_else(|_| panic!("no '{event_type}' frame within 5s, got: {text:?}"));
	text
}

fn data_stream(body: Body) -> BodyDataStream {
	body.into_data_stream()
}

#[tokio::test]
async fn stream_requires_authentication() {
	let app = TestApp::new().await;
	let response = app.get("/api/permissions/stream", None).await;
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stream_opens_with_connected_frame() {
	let app = TestApp::new().await;
	let response = app
		.get("/api/permissions/stream", Some(&app.fixtures.agent))
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	assert!(response
		.headers()
		.get(CONTENT_TYPE)
		.unwrap()
		.to_str()
		.unwrap()
		.starts_with("text/event-stream"));

	let mut stream = data_stream(response.into_body());
	let text = read_until(&mut stream, "connected").await;
	assert!(text.contains(&app.fixtures.agent.user.id.to_string()));
	assert!(text.contains(&app.fixtures.roles.agent.id.to_string()));
}

#[tokio::test]
async fn role_save_reaches_open_streams() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let response = app.get("/api/permissions/stream", Some(&f.agent)).await;
	let mut stream = data_stream(response.into_body());
	read_until(&mut stream, "connected").await;

	let matrix = agent_matrix_with(&f.roles.agent, &[Action::Delete]);
	let saved = app
		.put(
			&format!("/api/roles/{}/permissions", f.roles.agent.id),
			Some(&f.admin),
			json!({ "permissions": matrix }),
		)
		.await;
	assert_eq!(saved.status(), StatusCode::OK);

	let text = read_until(&mut stream, "permissions-updated").await;
	assert!(text.contains(&format!(r#""role_id":"{}""#, f.roles.agent.id)));
	read_until(&mut stream, "role-updated").await;
}

#[tokio::test]
async fn role_save_does_not_reach_other_roles() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let response = app.get("/api/permissions/stream", Some(&f.manager)).await;
	let mut stream = data_stream(response.into_body());
	read_until(&mut stream, "connected").await;

	let matrix = agent_matrix_with(&f.roles.agent, &[Action::Delete]);
	app
		.put(
			&format!("/api/roles/{}/permissions", f.roles.agent.id),
			Some(&f.admin),
			json!({ "permissions": matrix }),
		)
		.await;

	// Nothing but keep-alives may arrive within a short window.
	let next = tokio::time::timeout(Duration::from_millis(300), stream.next()).await;
	if let Ok(Some(Ok(chunk))) = next {
		let text = String::from_utf8_lossy(&chunk);
		assert!(!text.contains("permissions-updated"), "{text}");
	}
}

#[tokio::test]
async fn user_reassignment_reaches_that_users_stream() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let response = app.get("/api/permissions/stream", Some(&f.agent)).await;
	let mut stream = data_stream(response.into_body());
	read_until(&mut stream, "connected").await;

	let changed = app
		.put(
			&format!("/api/users/{}/role", f.agent.user.id),
			Some(&f.admin),
			json!({ "role_id": f.roles.manager.id }),
		)
		.await;
	assert_eq!(changed.status(), StatusCode::OK);

	let text = read_until(&mut stream, "user-role-changed").await;
	assert!(text.contains(RoleName::Manager.as_str()));
}
