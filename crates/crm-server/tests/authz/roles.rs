// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization and propagation tests for role administration.

use std::time::Duration;

use axum::{
	body::Body,
	http::{Method, Request, StatusCode},
};
use crm_rbac_core::{Action, Module, Permission, PermissionEvent, RoleId};
use serde_json::json;

use super::support::{
	agent_matrix_with, body_json, permission_strings, run_authz_cases, AuthzCase, TestApp,
};

#[tokio::test]
async fn role_route_authz_table() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let agent_role = format!("/api/roles/{}", f.roles.agent.id);
	let agent_perms = format!("/api/roles/{}/permissions", f.roles.agent.id);
	let unchanged = json!({ "permissions": f.roles.agent.permissions });

	let cases = vec![
		AuthzCase {
			name: "agent lacks settings:view",
			method: Method::GET,
			path: "/api/roles".to_string(),
			user: Some(f.agent.clone()),
			body: None,
			expected_status: StatusCode::FORBIDDEN,
		},
		AuthzCase {
			name: "manager lacks settings:view",
			method: Method::GET,
			path: agent_role.clone(),
			user: Some(f.manager.clone()),
			body: None,
			expected_status: StatusCode::FORBIDDEN,
		},
		AuthzCase {
			name: "admin lists roles",
			method: Method::GET,
			path: "/api/roles".to_string(),
			user: Some(f.admin.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "super_admin reads a role without holding settings:view",
			method: Method::GET,
			path: agent_role.clone(),
			user: Some(f.super_admin.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "unknown role",
			method: Method::GET,
			path: format!("/api/roles/{}", RoleId::generate()),
			user: Some(f.admin.clone()),
			body: None,
			expected_status: StatusCode::NOT_FOUND,
		},
		AuthzCase {
			name: "malformed role id",
			method: Method::GET,
			path: "/api/roles/not-a-uuid".to_string(),
			user: Some(f.admin.clone()),
			body: None,
			expected_status: StatusCode::BAD_REQUEST,
		},
		AuthzCase {
			name: "manager cannot edit permissions",
			method: Method::PUT,
			path: agent_perms.clone(),
			user: Some(f.manager.clone()),
			body: Some(unchanged.clone()),
			expected_status: StatusCode::FORBIDDEN,
		},
		AuthzCase {
			name: "admin edits permissions",
			method: Method::PUT,
			path: agent_perms.clone(),
			user: Some(f.admin.clone()),
			body: Some(unchanged.clone()),
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "admin cannot delete roles",
			method: Method::DELETE,
			path: agent_role.clone(),
			user: Some(f.admin.clone()),
			body: None,
			expected_status: StatusCode::FORBIDDEN,
		},
		AuthzCase {
			name: "referenced role cannot be deleted",
			method: Method::DELETE,
			path: agent_role.clone(),
			user: Some(f.super_admin.clone()),
			body: None,
			expected_status: StatusCode::CONFLICT,
		},
		AuthzCase {
			name: "delete unknown role",
			method: Method::DELETE,
			path: format!("/api/roles/{}", RoleId::generate()),
			user: Some(f.super_admin.clone()),
			body: None,
			expected_status: StatusCode::NOT_FOUND,
		},
	];

	run_authz_cases(&app, &cases).await;
}

#[tokio::test]
async fn role_guard_names_allowed_roles() {
	let app = TestApp::new().await;
	let path = format!("/api/roles/{}/permissions", app.fixtures.roles.agent.id);
	let response = app
		.put(
			&path,
			Some(&app.fixtures.manager),
			json!({ "permissions": [] }),
		)
		.await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let json = body_json(response).await;
	assert_eq!(json["message"], "Access denied. Required role: admin, super_admin");
}

// ============================================================================
// Propagation
// ============================================================================

/// An admin grants clients:delete to agents. A live agent session is told,
/// refetches its permissions and can then delete.
#[tokio::test]
async fn granting_a_permission_reaches_live_agents() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let delete_path = format!("/api/clients/{}", f.agent_client.id);

	assert_eq!(
		app.delete(&delete_path, Some(&f.agent)).await.status(),
		StatusCode::FORBIDDEN
	);

	let mut notices = app.state.broadcaster.subscribe_role(f.roles.agent.id).await;

	let matrix = agent_matrix_with(&f.roles.agent, &[Action::Delete]);
	let response = app
		.put(
			&format!("/api/roles/{}/permissions", f.roles.agent.id),
			Some(&f.admin),
			json!({ "permissions": matrix }),
		)
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert_eq!(json["notified"], 1);

	let first = tokio::time::timeout(Duration::from_secs(5), notices.recv())
		.await
		.unwrap()
		.unwrap();
	match first {
		PermissionEvent::PermissionsUpdated(data) => assert_eq!(data.role_id, f.roles.agent.id),
		other => panic!("expected permissions-updated, got {other:?}"),
	}
	let second = notices.recv().await.unwrap();
	assert_eq!(second.event_type(), "role-updated");

	// Refetch: the same session now carries the new permission.
	let permissions = permission_strings(&app, &f.agent).await;
	assert!(permissions.contains(&"clients:delete".to_string()));

	let response = app.delete(&delete_path, Some(&f.agent)).await;
	assert_eq!(response.status(), StatusCode::OK);
}

/// Without any notification the server still enforces the stored role: a
/// session created while the role granted clients:view is refused once the
/// grant is gone.
#[tokio::test]
async fn stale_session_snapshot_is_not_authoritative() {
	let app = TestApp::new().await;
	let f = &app.fixtures;

	assert_eq!(
		app.get("/api/clients", Some(&f.agent)).await.status(),
		StatusCode::OK
	);

	let without_clients: Vec<Permission> = f
		.roles
		.agent
		.permissions
		.iter()
		.filter(|p| p.module != Module::Clients)
		.cloned()
		.collect();
	app
		.state
		.role_repo
		.save_role_permissions(&f.roles.agent.id, &without_clients)
		.await
		.unwrap();

	let response = app.get("/api/clients", Some(&f.agent)).await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let json = body_json(response).await;
	assert_eq!(json["message"], "Access denied. Required permission: clients:view");

	assert!(!permission_strings(&app, &f.agent)
		.await
		.contains(&"clients:view".to_string()));
}

#[tokio::test]
async fn saving_without_listeners_still_succeeds() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let response = app
		.put(
			&format!("/api/roles/{}/permissions", f.roles.manager.id),
			Some(&f.super_admin),
			json!({ "permissions": [{"module": "reports", "actions": ["view"]}] }),
		)
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert_eq!(json["notified"], 0);
	assert_eq!(json["role"]["permissions"][0]["module"], "reports");
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn duplicate_module_is_rejected() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let response = app
		.put(
			&format!("/api/roles/{}/permissions", f.roles.agent.id),
			Some(&f.admin),
			json!({ "permissions": [
				{"module": "clients", "actions": ["view"]},
				{"module": "clients", "actions": ["edit"]},
			]}),
		)
		.await;
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let json = body_json(response).await;
	assert!(json["message"].as_str().unwrap().contains("clients"));

	// Nothing was written.
	let stored = app
		.state
		.role_repo
		.load_role(&f.roles.agent.id)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(stored.permissions, f.roles.agent.permissions);
}

#[tokio::test]
async fn unknown_action_is_rejected() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let (name, value) = f.admin.auth_header();
	let request = Request::builder()
		.method(Method::PUT)
		.uri(format!("/api/roles/{}/permissions", f.roles.agent.id))
		.header(name, value)
		.header("content-type", "application/json")
		.body(Body::from(
			r#"{"permissions":[{"module":"clients","actions":["destroy"]}]}"#,
		))
		.unwrap();

	let response = app.send(request).await;
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let json = body_json(response).await;
	assert_eq!(json["success"], false);
}
