// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization tests for client record routes.

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use super::support::{body_json, run_authz_cases, AuthzCase, TestApp};

// ============================================================================
// Permission Guards
// ============================================================================

#[tokio::test]
async fn agent_cannot_delete_client() {
	let app = TestApp::new().await;
	let agent = &app.fixtures.agent;
	let path = format!("/api/clients/{}", app.fixtures.agent_client.id);

	let response = app.delete(&path, Some(agent)).await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);

	let json = body_json(response).await;
	assert_eq!(json["success"], false);
	assert_eq!(
		json["message"],
		"Access denied. Required permission: clients:delete"
	);

	// The record is untouched.
	let still_there = app
		.state
		.client_repo
		.get_client(app.fixtures.agent_client.id)
		.await
		.unwrap();
	assert!(still_there.is_some());
}

#[tokio::test]
async fn client_route_authz_table() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let own = format!("/api/clients/{}", f.agent_client.id);
	let others = format!("/api/clients/{}", f.other_agent_client.id);
	let south = format!("/api/clients/{}", f.south_client.id);

	let cases = vec![
		AuthzCase {
			name: "anonymous list",
			method: Method::GET,
			path: "/api/clients".to_string(),
			user: None,
			body: None,
			expected_status: StatusCode::UNAUTHORIZED,
		},
		AuthzCase {
			name: "agent list",
			method: Method::GET,
			path: "/api/clients".to_string(),
			user: Some(f.agent.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "roleless list",
			method: Method::GET,
			path: "/api/clients".to_string(),
			user: Some(f.roleless.clone()),
			body: None,
			expected_status: StatusCode::FORBIDDEN,
		},
		AuthzCase {
			name: "agent create",
			method: Method::POST,
			path: "/api/clients".to_string(),
			user: Some(f.agent.clone()),
			body: Some(json!({"name": "Umbrella"})),
			expected_status: StatusCode::CREATED,
		},
		AuthzCase {
			name: "agent reads own record",
			method: Method::GET,
			path: own.clone(),
			user: Some(f.agent.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "agent reads another agent's record",
			method: Method::GET,
			path: others.clone(),
			user: Some(f.agent.clone()),
			body: None,
			expected_status: StatusCode::FORBIDDEN,
		},
		AuthzCase {
			name: "agent edits own record",
			method: Method::PUT,
			path: own.clone(),
			user: Some(f.agent.clone()),
			body: Some(json!({"name": "Acme Mutual"})),
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "agent edits another agent's record",
			method: Method::PUT,
			path: others.clone(),
			user: Some(f.agent.clone()),
			body: Some(json!({"name": "Hijacked"})),
			expected_status: StatusCode::FORBIDDEN,
		},
		AuthzCase {
			name: "manager reads any record",
			method: Method::GET,
			path: own.clone(),
			user: Some(f.manager.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "admin overrides ownership",
			method: Method::GET,
			path: others.clone(),
			user: Some(f.admin.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "super_admin overrides ownership",
			method: Method::PUT,
			path: south.clone(),
			user: Some(f.super_admin.clone()),
			body: Some(json!({"name": "Initech Holdings"})),
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "unknown record",
			method: Method::GET,
			path: format!("/api/clients/{}", Uuid::new_v4()),
			user: Some(f.admin.clone()),
			body: None,
			expected_status: StatusCode::NOT_FOUND,
		},
		AuthzCase {
			name: "manager deletes",
			method: Method::DELETE,
			path: south.clone(),
			user: Some(f.manager.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "manager deletes unknown record",
			method: Method::DELETE,
			path: format!("/api/clients/{}", Uuid::new_v4()),
			user: Some(f.manager.clone()),
			body: None,
			expected_status: StatusCode::NOT_FOUND,
		},
	];

	run_authz_cases(&app, &cases).await;
}

// ============================================================================
// Ownership
// ============================================================================

#[tokio::test]
async fn ownership_denial_message() {
	let app = TestApp::new().await;
	let path = format!("/api/clients/{}", app.fixtures.other_agent_client.id);

	let response = app.get(&path, Some(&app.fixtures.agent)).await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let json = body_json(response).await;
	assert_eq!(
		json["message"],
		"Access denied. You can only access your own resources"
	);
}

#[tokio::test]
async fn permission_is_checked_before_ownership() {
	let app = TestApp::new().await;
	// Own record, but no clients:view.
	let path = format!("/api/clients/{}", app.fixtures.agent_client.id);
	let response = app.get(&path, Some(&app.fixtures.roleless)).await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let json = body_json(response).await;
	assert_eq!(json["message"], "Access denied. Required permission: clients:view");
}

// ============================================================================
// Record Visibility
// ============================================================================

#[tokio::test]
async fn agent_lists_only_own_records() {
	let app = TestApp::new().await;
	let response = app.get("/api/clients", Some(&app.fixtures.agent)).await;
	assert_eq!(response.status(), StatusCode::OK);

	let json = body_json(response).await;
	let ids: Vec<&str> = json["clients"]
		.as_array()
		.unwrap()
		.iter()
		.map(|c| c["id"].as_str().unwrap())
		.collect();
	let expected = app.fixtures.agent_client.id.to_string();
	assert_eq!(ids, vec![expected.as_str()]);
}

#[tokio::test]
async fn manager_lists_every_record() {
	let app = TestApp::new().await;
	let response = app.get("/api/clients", Some(&app.fixtures.manager)).await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert_eq!(json["clients"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn every_listed_record_is_readable() {
	let app = TestApp::new().await;
	let f = &app.fixtures;

	for user in [&f.agent, &f.other_agent, &f.manager, &f.admin, &f.super_admin] {
		let response = app.get("/api/clients", Some(user)).await;
		assert_eq!(response.status(), StatusCode::OK);
		let json = body_json(response).await;
		let ids: Vec<String> = json["clients"]
			.as_array()
			.unwrap()
			.iter()
			.map(|c| c["id"].as_str().unwrap().to_string())
			.collect();
		assert!(!ids.is_empty(), "{}", user.user.email);

		for id in ids {
			let response = app.get(&format!("/api/clients/{id}"), Some(user)).await;
			assert_eq!(response.status(), StatusCode::OK, "{} reading {id}", user.user.email);
		}
	}
}

#[tokio::test]
async fn agent_cannot_create_in_another_branch() {
	let app = TestApp::new().await;
	let response = app
		.post(
			"/api/clients",
			Some(&app.fixtures.agent),
			json!({"name": "Elsewhere", "branch": "south"}),
		)
		.await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);

	let json = body_json(response).await;
	assert!(json["message"].as_str().unwrap().contains("your own branch"));
}

#[tokio::test]
async fn admin_creates_in_any_branch() {
	let app = TestApp::new().await;
	let response = app
		.post(
			"/api/clients",
			Some(&app.fixtures.admin),
			json!({"name": "Far Away", "branch": "west"}),
		)
		.await;
	assert_eq!(response.status(), StatusCode::CREATED);
	let json = body_json(response).await;
	assert_eq!(json["client"]["branch"], "west");
	assert_eq!(json["client"]["owner_id"], app.fixtures.admin.user.id.to_string());
}

#[tokio::test]
async fn created_record_defaults_to_callers_branch() {
	let app = TestApp::new().await;
	let response = app
		.post("/api/clients", Some(&app.fixtures.agent), json!({"name": "Hooli"}))
		.await;
	assert_eq!(response.status(), StatusCode::CREATED);
	let json = body_json(response).await;
	assert_eq!(json["client"]["branch"], "north");
}

#[tokio::test]
async fn blank_name_is_rejected() {
	let app = TestApp::new().await;
	let response = app
		.post("/api/clients", Some(&app.fixtures.agent), json!({"name": "   "}))
		.await;
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let json = body_json(response).await;
	assert_eq!(json["success"], false);
}
