// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use axum::{
	body::Body,
	http::{header::HeaderName, header::HeaderValue, Method, Request, StatusCode},
	response::Response,
	Router,
};
use crm_rbac_core::{Branch, Module, Permission, Role, RoleName};
use crm_server_auth::{generate_session_token, hash_token, Session, User, UserWithRole};
use crm_server_db::{ClientRecord, NewUser};
use serde::Serialize;
use tempfile::TempDir;
use tower::ServiceExt;

use crm_server::{
	api::{create_app_state, create_router, AppState},
	ServerConfig,
};

#[derive(Clone)]
pub struct TestUser {
	pub user: User,
	pub role: Option<Role>,
	pub session_token: String,
}

impl TestUser {
	pub fn auth_header(&self) -> (HeaderName, HeaderValue) {
		(
			HeaderName::from_static("cookie"),
			HeaderValue::from_str(&format!("crm_session={}", self.session_token)).unwrap(),
		)
	}

	pub fn bearer_header(&self) -> (HeaderName, HeaderValue) {
		(
			HeaderName::from_static("authorization"),
			HeaderValue::from_str(&format!("Bearer {}", self.session_token)).unwrap(),
		)
	}
}

#[derive(Clone)]
pub struct Roles {
	pub agent: Role,
	pub manager: Role,
	pub admin: Role,
	pub super_admin: Role,
}

#[derive(Clone)]
pub struct Fixtures {
	pub roles: Roles,
	/// Agent in the north branch.
	pub agent: TestUser,
	/// Second agent in the north branch.
	pub other_agent: TestUser,
	/// Manager in the south branch.
	pub manager: TestUser,
	pub admin: TestUser,
	pub super_admin: TestUser,
	/// A user whose role reference is empty.
	pub roleless: TestUser,
	pub agent_client: ClientRecord,
	pub other_agent_client: ClientRecord,
	pub south_client: ClientRecord,
}

pub struct TestApp {
	pub router: Router,
	pub fixtures: Fixtures,
	pub state: AppState,
	_temp_dir: TempDir,
}

impl TestApp {
	pub async fn new() -> Self {
		let temp_dir = tempfile::tempdir().unwrap();
		let db_path = temp_dir.path().join("test_authz.db");
		let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
		let pool = crm_server_db::create_pool(&db_url).await.unwrap();
		crm_server_db::run_migrations(&pool).await.unwrap();

		let config = ServerConfig::default();
		let state = create_app_state(pool, &config);
		let fixtures = create_fixtures(&state).await;
		let router = create_router(state.clone());

		Self {
			router,
			fixtures,
			state,
			_temp_dir: temp_dir,
		}
	}

	pub async fn get(&self, path: &str, user: Option<&TestUser>) -> Response<Body> {
		self
			.request(Method::GET, path, user, Option::<()>::None)
			.await
	}

	pub async fn post(
		&self,
		path: &str,
		user: Option<&TestUser>,
		body: impl Serialize,
	) -> Response<Body> {
		self.request(Method::POST, path, user, Some(body)).await
	}

	pub async fn put(
		&self,
		path: &str,
		user: Option<&TestUser>,
		body: impl Serialize,
	) -> Response<Body> {
		self.request(Method::PUT, path, user, Some(body)).await
	}

	pub async fn delete(&self, path: &str, user: Option<&TestUser>) -> Response<Body> {
		self
			.request(Method::DELETE, path, user, Option::<()>::None)
			.await
	}

	/// Send a raw request, e.g. with a malformed body.
	pub async fn send(&self, request: Request<Body>) -> Response<Body> {
		self.router.clone().oneshot(request).await.unwrap()
	}

	async fn request<T: Serialize>(
		&self,
		method: Method,
		path: &str,
		user: Option<&TestUser>,
		body: Option<T>,
	) -> Response<Body> {
		let mut builder = Request::builder().method(method).uri(path);

		if let Some(test_user) = user {
			let (name, value) = test_user.auth_header();
			builder = builder.header(name, value);
		}

		let request_body = match body {
			Some(b) => {
				builder = builder.header("content-type", "application/json");
				Body::from(serde_json::to_string(&b).unwrap())
			}
			None => Body::empty(),
		};

		let request = builder.body(request_body).unwrap();

		self.router.clone().oneshot(request).await.unwrap()
	}

	/// Create a user with a real password hash and no session.
	pub async fn create_login_user(&self, email: &str, password: &str, role: &Role) -> User {
		self
			.state
			.user_repo
			.create_user(&NewUser {
				email: email.to_string(),
				password_hash: crm_server_auth::hash_password(password).unwrap(),
				name: "Login User".to_string(),
				role_id: Some(role.id),
				branch: Branch::Main,
			})
			.await
			.unwrap()
	}

	/// Open an additional session for an existing user and return the user
	/// holding it.
	pub async fn new_session(&self, user: &TestUser, ttl: Duration) -> TestUser {
		let token = generate_session_token();
		let account = UserWithRole {
			user: user.user.clone(),
			role: user.role.clone(),
		};
		let session = Session::new(hash_token(&token), &account.principal(), ttl);
		self.state.session_repo.create_session(&session).await.unwrap();
		TestUser {
			session_token: token,
			..user.clone()
		}
	}
}

pub struct AuthzCase {
	pub name: &'static str,
	pub method: Method,
	pub path: String,
	pub user: Option<TestUser>,
	pub body: Option<serde_json::Value>,
	pub expected_status: StatusCode,
}

pub async fn run_authz_cases(app: &TestApp, cases: &[AuthzCase]) {
	for case in cases {
		let response = match (&case.method, &case.body) {
			(m, Some(body)) if *m == Method::POST => {
				app.post(&case.path, case.user.as_ref(), body.clone()).await
			}
			(m, Some(body)) if *m == Method::PUT => {
				app.put(&case.path, case.user.as_ref(), body.clone()).await
			}
			(m, _) if *m == Method::DELETE => app.delete(&case.path, case.user.as_ref()).await,
			_ => app.get(&case.path, case.user.as_ref()).await,
		};

		if response.status() != case.expected_status {
			let (parts, body) = response.into_parts();
			let body_bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
			let body_str = String::from_utf8_lossy(&body_bytes);
			panic!(
				"Case '{}': {} {} - expected {}, got {}\nResponse body: {}",
				case.name, case.method, case.path, case.expected_status, parts.status, body_str
			);
		}
	}
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	serde_json::from_slice(&bytes).unwrap()
}

/// Permission strings from a `/api/auth/permissions` response.
pub async fn permission_strings(app: &TestApp, user: &TestUser) -> Vec<String> {
	let response = app.get("/api/auth/permissions", Some(user)).await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	json["permissions"]
		.as_array()
		.unwrap()
		.iter()
		.map(|p| p.as_str().unwrap().to_string())
		.collect()
}

/// The agent matrix with `extra` appended to the clients entry.
pub fn agent_matrix_with(role: &Role, extra: &[crm_rbac_core::Action]) -> Vec<Permission> {
	role
		.permissions
		.iter()
		.map(|p| {
			if p.module == Module::Clients {
				Permission::new(p.module, p.actions.iter().copied().chain(extra.iter().copied()))
			} else {
				p.clone()
			}
		})
		.collect()
}

async fn create_fixtures(state: &AppState) -> Fixtures {
	let seeded = state.role_repo.seed_default_roles().await.unwrap();
	let find = |name: RoleName| {
		seeded
			.iter()
			.find(|r| r.name == name)
			.cloned()
			.unwrap()
	};
	let roles = Roles {
		agent: find(RoleName::Agent),
		manager: find(RoleName::Manager),
		admin: find(RoleName::Admin),
		super_admin: find(RoleName::SuperAdmin),
	};

	let agent = create_test_user(state, "agent@test.com", Some(&roles.agent), Branch::North).await;
	let other_agent =
		create_test_user(state, "agent2@test.com", Some(&roles.agent), Branch::North).await;
	let manager =
		create_test_user(state, "manager@test.com", Some(&roles.manager), Branch::South).await;
	let admin = create_test_user(state, "admin@test.com", Some(&roles.admin), Branch::Main).await;
	let super_admin = create_test_user(
		state,
		"root@test.com",
		Some(&roles.super_admin),
		Branch::Main,
	)
	.await;
	let roleless = create_test_user(state, "nobody@test.com", None, Branch::Main).await;

	let agent_client = create_client(state, "Acme Insurance", &agent, Branch::North).await;
	let other_agent_client = create_client(state, "Globex", &other_agent, Branch::North).await;
	let south_client = create_client(state, "Initech", &manager, Branch::South).await;

	Fixtures {
		roles,
		agent,
		other_agent,
		manager,
		admin,
		super_admin,
		roleless,
		agent_client,
		other_agent_client,
		south_client,
	}
}

async fn create_test_user(
	state: &AppState,
	email: &str,
	role: Option<&Role>,
	branch: Branch,
) -> TestUser {
	let user = state
		.user_repo
		.create_user(&NewUser {
			email: email.to_string(),
			// Never verifies; fixtures authenticate with sessions.
			password_hash: "!".to_string(),
			name: email.split('@').next().unwrap_or(email).to_string(),
			role_id: role.map(|r| r.id),
			branch,
		})
		.await
		.unwrap();

	let token = generate_session_token();
	let account = UserWithRole {
		user: user.clone(),
		role: role.cloned(),
	};
	let session = Session::new(
		hash_token(&token),
		&account.principal(),
		Duration::from_secs(3600),
	);
	state.session_repo.create_session(&session).await.unwrap();

	TestUser {
		user,
		role: role.cloned(),
		session_token: token,
	}
}

async fn create_client(state: &AppState, name: &str, owner: &TestUser, branch: Branch) -> ClientRecord {
	let record = ClientRecord::new(name, owner.user.id, branch);
	state.client_repo.create_client(&record).await.unwrap();
	record
}
