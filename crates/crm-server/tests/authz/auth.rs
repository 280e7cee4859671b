// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Login, lockout and session lifecycle.

use std::time::Duration;

use axum::{
	body::Body,
	http::{header::SET_COOKIE, Method, Request, StatusCode},
};
use chrono::Utc;
use crm_server_auth::LockState;
use serde_json::json;

use super::support::{body_json, run_authz_cases, AuthzCase, TestApp};

const PASSWORD: &str = "correct horse battery staple";

async fn login(app: &TestApp, email: &str, password: &str) -> axum::response::Response {
	app
		.post(
			"/api/auth/login",
			None,
			json!({ "email": email, "password": password }),
		)
		.await
}

#[tokio::test]
async fn health_is_public() {
	let app = TestApp::new().await;
	let response = app.get("/health", None).await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn login_returns_token_cookie_and_permissions() {
	let app = TestApp::new().await;
	let agent_role = app.fixtures.roles.agent.clone();
	app
		.create_login_user("sam@example.com", PASSWORD, &agent_role)
		.await;

	let response = login(&app, "Sam@Example.com", PASSWORD).await;
	assert_eq!(response.status(), StatusCode::OK);

	let cookie = response
		.headers()
		.get(SET_COOKIE)
		.unwrap()
		.to_str()
		.unwrap()
		.to_string();
	assert!(cookie.starts_with("crm_session="));
	assert!(cookie.contains("HttpOnly"));

	let json = body_json(response).await;
	assert_eq!(json["success"], true);
	assert_eq!(json["user"]["email"], "sam@example.com");
	assert_eq!(json["user"]["role"], "agent");
	let permissions: Vec<&str> = json["permissions"]
		.as_array()
		.unwrap()
		.iter()
		.map(|p| p.as_str().unwrap())
		.collect();
	assert!(permissions.contains(&"clients:edit"));
	assert!(!permissions.contains(&"clients:delete"));

	// The bearer form of the token works too.
	let token = json["token"].as_str().unwrap();
	let request = Request::builder()
		.method(Method::GET)
		.uri("/api/auth/me")
		.header("authorization", format!("Bearer {token}"))
		.body(Body::empty())
		.unwrap();
	assert_eq!(app.send(request).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
	let app = TestApp::new().await;
	let agent_role = app.fixtures.roles.agent.clone();
	app
		.create_login_user("sam@example.com", PASSWORD, &agent_role)
		.await;

	let unknown = body_json(login(&app, "nobody@example.com", PASSWORD).await).await;
	let wrong = body_json(login(&app, "sam@example.com", "nope").await).await;
	assert_eq!(unknown["message"], "Invalid email or password");
	assert_eq!(unknown, wrong);
}

#[tokio::test]
async fn missing_credentials_are_rejected() {
	let app = TestApp::new().await;

	let response = login(&app, "", "").await;
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let json = body_json(response).await;
	assert_eq!(json["message"], "Email and password are required");

	let response = app
		.post("/api/auth/login", None, json!({ "email": "a@b.c" }))
		.await;
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Five failures lock the account; the sixth attempt is refused even with the
/// right password. Once the lock window has passed the correct password works.
#[tokio::test]
async fn repeated_failures_lock_the_account() {
	let app = TestApp::new().await;
	let agent_role = app.fixtures.roles.agent.clone();
	let user = app
		.create_login_user("sam@example.com", PASSWORD, &agent_role)
		.await;

	for attempt in 1..=4 {
		let response = login(&app, "sam@example.com", "wrong").await;
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "attempt {attempt}");
		let json = body_json(response).await;
		assert_eq!(json["message"], "Invalid email or password");
	}

	let response = login(&app, "sam@example.com", "wrong").await;
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	let json = body_json(response).await;
	assert!(json["message"]
		.as_str()
		.unwrap()
		.starts_with("Account is locked"));

	let response = login(&app, "sam@example.com", PASSWORD).await;
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	let json = body_json(response).await;
	assert!(json["message"]
		.as_str()
		.unwrap()
		.starts_with("Account is locked"));

	// Let the lock lapse.
	app
		.state
		.user_repo
		.update_lock_state(
			&user.id,
			LockState {
				login_attempts: 5,
				lock_until: Some(Utc::now() - chrono::Duration::minutes(1)),
			},
		)
		.await
		.unwrap();

	let response = login(&app, "sam@example.com", PASSWORD).await;
	assert_eq!(response.status(), StatusCode::OK);

	let stored = app
		.state
		.user_repo
		.get_user_by_id(&user.id)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(stored.login_attempts, 0);
	assert!(stored.lock_until.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_all_count_towards_the_lock() {
	let app = TestApp::new().await;
	let agent_role = app.fixtures.roles.agent.clone();
	let user = app
		.create_login_user("sam@example.com", PASSWORD, &agent_role)
		.await;

	let attempts = (0..10).map(|_| login(&app, "sam@example.com", "wrong"));
	let responses = futures::future::join_all(attempts).await;

	let mut invalid = 0;
	for response in responses {
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		let json = body_json(response).await;
		let message = json["message"].as_str().unwrap().to_string();
		if message == "Invalid email or password" {
			invalid += 1;
		} else {
			assert!(message.starts_with("Account is locked"), "{message}");
		}
	}
	assert_eq!(invalid, 4);

	let stored = app
		.state
		.user_repo
		.get_user_by_id(&user.id)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(stored.login_attempts, 5);
	assert!(stored.lock_state().is_locked(Utc::now()));

	let response = login(&app, "sam@example.com", PASSWORD).await;
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	let json = body_json(response).await;
	assert!(json["message"]
		.as_str()
		.unwrap()
		.starts_with("Account is locked"));
}

#[tokio::test]
async fn deactivated_user_cannot_log_in() {
	let app = TestApp::new().await;
	let agent_role = app.fixtures.roles.agent.clone();
	let user = app
		.create_login_user("sam@example.com", PASSWORD, &agent_role)
		.await;
	app
		.state
		.user_repo
		.set_user_active(&user.id, false)
		.await
		.unwrap();

	let response = login(&app, "sam@example.com", PASSWORD).await;
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	let json = body_json(response).await;
	assert_eq!(json["message"], "Account is disabled");
}

#[tokio::test]
async fn logout_ends_the_session() {
	let app = TestApp::new().await;
	let agent = app
		.new_session(&app.fixtures.agent, Duration::from_secs(600))
		.await;

	let response = app.post("/api/auth/logout", Some(&agent), json!({})).await;
	assert_eq!(response.status(), StatusCode::OK);
	let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
	assert!(cookie.contains("Max-Age=0"));

	assert_eq!(
		app.get("/api/auth/me", Some(&agent)).await.status(),
		StatusCode::UNAUTHORIZED
	);
	// Other sessions of the same user are untouched.
	assert_eq!(
		app.get("/api/auth/me", Some(&app.fixtures.agent)).await.status(),
		StatusCode::OK
	);
}

#[tokio::test]
async fn expired_session_is_rejected() {
	let app = TestApp::new().await;
	let expired = app.new_session(&app.fixtures.agent, Duration::ZERO).await;

	let response = app.get("/api/auth/me", Some(&expired)).await;
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	let json = body_json(response).await;
	assert_eq!(json["success"], false);
	assert_eq!(json["message"], "Authentication required");
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
	let app = TestApp::new().await;
	let f = &app.fixtures;
	let cases = vec![
		AuthzCase {
			name: "me without a session",
			method: Method::GET,
			path: "/api/auth/me".to_string(),
			user: None,
			body: None,
			expected_status: StatusCode::UNAUTHORIZED,
		},
		AuthzCase {
			name: "permissions without a session",
			method: Method::GET,
			path: "/api/auth/permissions".to_string(),
			user: None,
			body: None,
			expected_status: StatusCode::UNAUTHORIZED,
		},
		AuthzCase {
			name: "clients without a session",
			method: Method::GET,
			path: "/api/clients".to_string(),
			user: None,
			body: None,
			expected_status: StatusCode::UNAUTHORIZED,
		},
		AuthzCase {
			name: "role edit without a session",
			method: Method::PUT,
			path: format!("/api/roles/{}/permissions", f.roles.agent.id),
			user: None,
			body: Some(json!({ "permissions": [] })),
			expected_status: StatusCode::UNAUTHORIZED,
		},
	];
	run_authz_cases(&app, &cases).await;
}

#[tokio::test]
async fn permissions_endpoint_reflects_the_role() {
	let app = TestApp::new().await;
	let response = app
		.get("/api/auth/permissions", Some(&app.fixtures.manager))
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert_eq!(json["success"], true);
	assert_eq!(json["role"], "manager");
	assert_eq!(json["branch"], "south");
	assert_eq!(json["id"], app.fixtures.manager.user.id.to_string());
	let permissions = json["permissions"].as_array().unwrap();
	assert!(permissions.contains(&json!("clients:delete")));
	assert!(!permissions.contains(&json!("settings:view")));
}

/// super_admin holds an empty matrix but is allowed through every guard.
#[tokio::test]
async fn super_admin_is_authorized_everywhere() {
	let app = TestApp::new().await;
	let f = &app.fixtures;

	let response = app.get("/api/auth/permissions", Some(&f.super_admin)).await;
	let json = body_json(response).await;
	assert_eq!(json["role"], "super_admin");
	assert_eq!(json["permissions"], json!([]));

	let cases = vec![
		AuthzCase {
			name: "list clients",
			method: Method::GET,
			path: "/api/clients".to_string(),
			user: Some(f.super_admin.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "read an agent's client",
			method: Method::GET,
			path: format!("/api/clients/{}", f.agent_client.id),
			user: Some(f.super_admin.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "edit a client in another branch",
			method: Method::PUT,
			path: format!("/api/clients/{}", f.south_client.id),
			user: Some(f.super_admin.clone()),
			body: Some(json!({ "name": "Initech Holdings" })),
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "list roles",
			method: Method::GET,
			path: "/api/roles".to_string(),
			user: Some(f.super_admin.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "list users",
			method: Method::GET,
			path: "/api/users".to_string(),
			user: Some(f.super_admin.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
		AuthzCase {
			name: "delete a client",
			method: Method::DELETE,
			path: format!("/api/clients/{}", f.other_agent_client.id),
			user: Some(f.super_admin.clone()),
			body: None,
			expected_status: StatusCode::OK,
		},
	];
	run_authz_cases(&app, &cases).await;
}

/// A user whose role reference is empty can authenticate but every guarded
/// route is refused.
#[tokio::test]
async fn roleless_user_is_denied_everything() {
	let app = TestApp::new().await;
	let f = &app.fixtures;

	let response = app.get("/api/auth/me", Some(&f.roleless)).await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert!(json["user"]["role"].is_null());
	assert_eq!(json["user"]["permissions"], json!([]));

	for path in ["/api/clients", "/api/roles", "/api/users"] {
		let response = app.get(path, Some(&f.roleless)).await;
		assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
	}
}
