// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User administration: role assignment and deactivation.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use crm_rbac_core::{PermissionEvent, UserId};
use serde_json::json;

use super::support::{body_json, permission_strings, run_authz_cases, AuthzCase, TestApp};

#[tokio::test]
async fn user_route_authz_table() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let agent_role_path = format!("/api/users/{}/role", f.agent.user.id);

	let cases = vec![
		AuthzCase {
			name: "agent cannot list users",
			method: Method::GET,
			path: "/api/users".to_string(),
			user: Some(f.agent.clone()),
			body: None,
			expected_status: StatusCode::FORBIDDEN,
		},
		AuthzCase {
			name: "manager cannot list users",
			method: Method::GET,
			path: "/api/users".to_string(),
			user: Some(f.manager.clone()),
			body: None,
			expected_status: StatusCode::FORBIDDEN,
		},
		AuthzCase {
			name: "admin lists users",
			method: Method::GET,
			path: "/api/users".to_string(),
			user: Some(f.admin.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "agent cannot reassign itself",
			method: Method::PUT,
			path: agent_role_path.clone(),
			user: Some(f.agent.clone()),
			body: Some(json!({ "role_id": f.roles.admin.id })),
			expected_status: StatusCode::FORBIDDEN,
		},
		AuthzCase {
			name: "unknown user",
			method: Method::PUT,
			path: format!("/api/users/{}/role", UserId::generate()),
			user: Some(f.admin.clone()),
			body: Some(json!({ "role_id": f.roles.agent.id })),
			expected_status: StatusCode::NOT_FOUND,
		},
		AuthzCase {
			name: "unknown role",
			method: Method::PUT,
			path: agent_role_path.clone(),
			user: Some(f.admin.clone()),
			body: Some(json!({ "role_id": crm_rbac_core::RoleId::generate() })),
			expected_status: StatusCode::NOT_FOUND,
		},
		AuthzCase {
			name: "agent cannot deactivate others",
			method: Method::PUT,
			path: format!("/api/users/{}/active", f.other_agent.user.id),
			user: Some(f.agent.clone()),
			body: Some(json!({ "is_active": false })),
			expected_status: StatusCode::FORBIDDEN,
		},
	];

	run_authz_cases(&app, &cases).await;
}

#[tokio::test]
async fn reassignment_changes_permissions_and_notifies_the_user() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let mut notices = app.state.broadcaster.subscribe_user(f.agent.user.id).await;

	let response = app
		.put(
			&format!("/api/users/{}/role", f.agent.user.id),
			Some(&f.admin),
			json!({ "role_id": f.roles.manager.id }),
		)
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert_eq!(json["user"]["role_id"], f.roles.manager.id.to_string());

	let event = tokio::time::timeout(Duration::from_secs(5), notices.recv())
		.await
		.unwrap()
		.unwrap();
	match event {
		PermissionEvent::UserRoleChanged(data) => {
			assert_eq!(data.user_id, f.agent.user.id);
			assert_eq!(data.role_id, f.roles.manager.id);
		}
		other => panic!("expected user-role-changed, got {other:?}"),
	}

	// The existing session picks up the new role on its next request.
	let permissions = permission_strings(&app, &f.agent).await;
	assert!(permissions.contains(&"clients:delete".to_string()));
}

#[tokio::test]
async fn only_super_admin_grants_super_admin() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let path = format!("/api/users/{}/role", f.manager.user.id);
	let body = json!({ "role_id": f.roles.super_admin.id });

	let response = app.put(&path, Some(&f.admin), body.clone()).await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let json = body_json(response).await;
	assert_eq!(
		json["message"],
		"Access denied. Only a super_admin can grant or revoke the super_admin role"
	);

	let response = app.put(&path, Some(&f.super_admin), body).await;
	assert_eq!(response.status(), StatusCode::OK);

	// Demoting a super_admin is equally reserved.
	let response = app
		.put(
			&path,
			Some(&f.admin),
			json!({ "role_id": f.roles.agent.id }),
		)
		.await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_super_admin_changes_super_admin_status() {
	let app = TestApp::new().await;
	let f = &app.fixtures;

	let response = app
		.put(
			&format!("/api/users/{}/active", f.super_admin.user.id),
			Some(&f.admin),
			json!({ "is_active": false }),
		)
		.await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let json = body_json(response).await;
	assert_eq!(
		json["message"],
		"Access denied. Only a super_admin can activate or deactivate a super_admin"
	);

	let response = app.get("/api/auth/me", Some(&f.super_admin)).await;
	assert_eq!(response.status(), StatusCode::OK);
	let stored = app
		.state
		.user_repo
		.get_user_by_id(&f.super_admin.user.id)
		.await
		.unwrap()
		.unwrap();
	assert!(stored.is_active);

	// A second super_admin may be deactivated by a super_admin.
	let response = app
		.put(
			&format!("/api/users/{}/role", f.manager.user.id),
			Some(&f.super_admin),
			json!({ "role_id": f.roles.super_admin.id }),
		)
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let path = format!("/api/users/{}/active", f.manager.user.id);

	let response = app.put(&path, Some(&f.admin), json!({ "is_active": false })).await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);

	let response = app
		.put(&path, Some(&f.super_admin), json!({ "is_active": false }))
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let response = app.get("/api/auth/me", Some(&f.manager)).await;
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivation_revokes_every_session() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let second = app
		.new_session(&f.other_agent, Duration::from_secs(600))
		.await;
	let mut notices = app
		.state
		.broadcaster
		.subscribe_user(f.other_agent.user.id)
		.await;

	let response = app
		.put(
			&format!("/api/users/{}/active", f.other_agent.user.id),
			Some(&f.admin),
			json!({ "is_active": false }),
		)
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert_eq!(json["user"]["is_active"], false);

	let event = tokio::time::timeout(Duration::from_secs(5), notices.recv())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(event.event_type(), "session-revoked");

	for session in [&f.other_agent, &second] {
		let response = app.get("/api/auth/me", Some(session)).await;
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	}

	// Reactivation does not bring old sessions back.
	let response = app
		.put(
			&format!("/api/users/{}/active", f.other_agent.user.id),
			Some(&f.admin),
			json!({ "is_active": true }),
		)
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		app.get("/api/auth/me", Some(&f.other_agent)).await.status(),
		StatusCode::UNAUTHORIZED
	);
}

#[tokio::test]
async fn admins_cannot_deactivate_themselves() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let response = app
		.put(
			&format!("/api/users/{}/active", f.admin.user.id),
			Some(&f.admin),
			json!({ "is_active": false }),
		)
		.await;
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let json = body_json(response).await;
	assert_eq!(json["message"], "You cannot deactivate your own account");
}
