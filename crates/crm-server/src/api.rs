// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and route table.

use std::sync::Arc;
use std::time::Duration;

use axum::{
	middleware::{from_fn, from_fn_with_state},
	routing::{delete, get, post, put},
	Router,
};
use crm_rbac_core::{Action, Module, RoleName, UNRESTRICTED_RECORD_ROLES};
use crm_server_auth::LockoutPolicy;
use crm_server_config::ServerConfig;
use crm_server_db::{
	ClientRecordRepository, ClientRecordStore, RoleRepository, RoleStore, SessionRepository,
	SessionStore, UserRepository, UserStore,
};
use sqlx::SqlitePool;

use crate::{
	auth_middleware::{auth_layer, require_auth_layer},
	broadcaster::{BroadcasterConfig, PermissionsBroadcaster},
	guards::{require_admin, require_permission, require_role, RequireOwnershipLayer},
	routes::{self, clients::ClientOwnerLookup},
};

/// Authentication settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct AuthSettings {
	/// Upper bound on resolving a credential for one request.
	pub timeout: Duration,
	pub session_ttl: Duration,
	pub lockout: LockoutPolicy,
	/// Mark the session cookie `Secure`.
	pub secure_cookies: bool,
	/// Grace period clients are told to wait before reloading after a change.
	pub reload_grace: Duration,
}

impl AuthSettings {
	pub fn from_config(config: &ServerConfig) -> Self {
		Self {
			timeout: config.auth.auth_timeout(),
			session_ttl: config.auth.session_ttl(),
			lockout: LockoutPolicy::new(config.auth.max_login_attempts, config.auth.lock_duration()),
			secure_cookies: config.auth.is_production(),
			reload_grace: Duration::from_millis(config.propagation.reload_grace_ms),
		}
	}
}

/// Application state shared across handlers.
///
/// Stores are held as trait objects; [`create_app_state`] wires the SQLite
/// repositories.
#[derive(Clone)]
pub struct AppState {
	pub pool: SqlitePool,
	pub role_repo: Arc<dyn RoleStore>,
	pub user_repo: Arc<dyn UserStore>,
	pub session_repo: Arc<dyn SessionStore>,
	pub client_repo: Arc<dyn ClientRecordStore>,
	pub broadcaster: Arc<PermissionsBroadcaster>,
	pub auth: AuthSettings,
}

pub fn create_app_state(pool: SqlitePool, config: &ServerConfig) -> AppState {
	let broadcaster = Arc::new(PermissionsBroadcaster::new(BroadcasterConfig::from(
		&config.propagation,
	)));

	AppState {
		role_repo: Arc::new(RoleRepository::new(pool.clone())),
		user_repo: Arc::new(UserRepository::new(pool.clone())),
		session_repo: Arc::new(SessionRepository::new(pool.clone())),
		client_repo: Arc::new(ClientRecordRepository::new(pool.clone())),
		pool,
		broadcaster,
		auth: AuthSettings::from_config(config),
	}
}

/// Build the HTTP router.
///
/// Layers run outermost first: `auth_layer` resolves the principal,
/// `require_auth_layer` rejects anonymous requests, then each route's guards
/// run before the handler.
pub fn create_router(state: AppState) -> Router {
	let client_owner = Arc::new(ClientOwnerLookup::new(state.client_repo.clone()));

	// Public routes - no authentication required
	let public = Router::new()
		.route("/health", get(routes::health::health_check))
		.route("/api/auth/login", post(routes::auth::login));

	let auth_routes = Router::new()
		.route("/api/auth/logout", post(routes::auth::logout))
		.route("/api/auth/me", get(routes::auth::me))
		.route("/api/auth/permissions", get(routes::auth::permissions))
		.route(
			"/api/permissions/stream",
			get(routes::stream::permissions_stream),
		);

	let role_routes = Router::new()
		.route(
			"/api/roles",
			get(routes::roles::list_roles)
				.route_layer(require_permission(Module::Settings, Action::View)),
		)
		.route(
			"/api/roles/{id}",
			get(routes::roles::get_role)
				.route_layer(require_permission(Module::Settings, Action::View))
				.merge(
					delete(routes::roles::delete_role).route_layer(require_role([RoleName::SuperAdmin])),
				),
		)
		.route(
			"/api/roles/{id}/permissions",
			put(routes::roles::update_role_permissions).route_layer(require_admin()),
		);

	let user_routes = Router::new()
		.route("/api/users", get(routes::users::list_users))
		.route("/api/users/{id}/role", put(routes::users::update_user_role))
		.route(
			"/api/users/{id}/active",
			put(routes::users::set_user_active),
		)
		.route_layer(require_admin());

	let client_routes = Router::new()
		.route(
			"/api/clients",
			get(routes::clients::list_clients)
				.route_layer(require_permission(Module::Clients, Action::View))
				.merge(
					post(routes::clients::create_client)
						.route_layer(require_permission(Module::Clients, Action::Create)),
				),
		)
		.route(
			"/api/clients/{id}",
			get(routes::clients::get_client)
				.route_layer(
					RequireOwnershipLayer::lookup("id", client_owner.clone())
						.override_roles(UNRESTRICTED_RECORD_ROLES),
				)
				.route_layer(require_permission(Module::Clients, Action::View))
				.merge(
					put(routes::clients::update_client)
						.route_layer(
							RequireOwnershipLayer::lookup("id", client_owner)
								.override_roles(UNRESTRICTED_RECORD_ROLES),
						)
						.route_layer(require_permission(Module::Clients, Action::Edit)),
				)
				.merge(
					delete(routes::clients::delete_client)
						.route_layer(require_permission(Module::Clients, Action::Delete)),
				),
		);

	let authed = Router::new()
		.merge(auth_routes)
		.merge(role_routes)
		.merge(user_routes)
		.merge(client_routes)
		.layer(from_fn(require_auth_layer))
		.layer(from_fn_with_state(state.clone(), auth_layer));

	Router::new()
		.merge(public)
		.merge(authed)
		.with_state(state)
}
