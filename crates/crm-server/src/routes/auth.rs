// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Login, logout and the authenticated user's permission view.

use std::time::Duration;

use axum::{
	extract::{rejection::JsonRejection, State},
	http::{header::SET_COOKIE, HeaderValue},
	response::IntoResponse,
	Json,
};
use chrono::{DateTime, Utc};
use crm_rbac_core::{PermissionSet, Principal};
use crm_server_auth::{
	generate_session_token, hash_token, normalize_email, verify_password, AuditEvent,
	AuditEventType, AuthError, Session, UserProfile, SESSION_COOKIE_NAME,
};
use serde::{Deserialize, Serialize};

use super::json_body;
use crate::{
	api::AppState,
	auth_middleware::RequireAuth,
	error::{Result, ServerError},
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	pub email: String,
	pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
	pub success: bool,
	pub token: String,
	pub expires_at: DateTime<Utc>,
	pub user: UserProfile,
	pub permissions: PermissionSet,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
	pub success: bool,
	pub user: UserProfile,
}

/// Fresh permission view of the caller; the client refetch target.
#[derive(Debug, Serialize, Deserialize)]
pub struct PermissionsResponse {
	pub success: bool,
	#[serde(flatten)]
	pub principal: Principal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
	pub success: bool,
	pub message: String,
}

/// POST /api/auth/login - Exchange email and password for a session token.
///
/// Consecutive failures lock the account; while locked every attempt is
/// refused, including one with the correct password.
#[tracing::instrument(skip_all)]
pub async fn login(
	State(state): State<AppState>,
	payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
	let body = json_body(payload)?;
	let email = normalize_email(&body.email);
	if email.is_empty() || body.password.is_empty() {
		return Err(ServerError::BadRequest(
			"Email and password are required".to_string(),
		));
	}

	let Some(user) = state.user_repo.get_user_by_email(&email).await? else {
		AuditEvent::new(AuditEventType::LoginFailed)
			.resource(email.as_str())
			.detail("unknown email")
			.emit();
		return Err(AuthError::InvalidCredentials.into());
	};

	let now = Utc::now();
	let policy = state.auth.lockout;
	let lock_state = policy.current(user.lock_state(), now);

	if let Some(until) = lock_state.lock_until.filter(|_| lock_state.is_locked(now)) {
		AuditEvent::new(AuditEventType::LoginFailed)
			.actor(user.id)
			.detail("account locked")
			.emit();
		return Err(AuthError::AccountLocked { until }.into());
	}

	let password = body.password;
	let password_hash = user.password_hash.clone();
	let verified = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
		.await
		.map_err(|e| ServerError::Internal(format!("password verification task failed: {e}")))?;

	if !verified {
		let next = state
			.user_repo
			.register_failed_login(&user.id, policy, now)
			.await?;

		AuditEvent::new(AuditEventType::LoginFailed)
			.actor(user.id)
			.detail(format!("attempt {}", next.login_attempts))
			.emit();

		if let Some(until) = next.lock_until.filter(|_| next.is_locked(now)) {
			AuditEvent::new(AuditEventType::AccountLocked)
				.actor(user.id)
				.detail(format!("locked until {}", until.to_rfc3339()))
				.emit();
			return Err(AuthError::AccountLocked { until }.into());
		}
		return Err(AuthError::InvalidCredentials.into());
	}

	if !user.is_active {
		AuditEvent::new(AuditEventType::LoginFailed)
			.actor(user.id)
			.detail("account disabled")
			.emit();
		return Err(AuthError::AccountDisabled.into());
	}

	if user.login_attempts > 0 || user.lock_until.is_some() {
		state.user_repo.reset_login_attempts(&user.id).await?;
	}

	let account = state
		.user_repo
		.load_user_with_role(&user.id)
		.await?
		.ok_or_else(|| ServerError::Internal(format!("user {} vanished during login", user.id)))?;
	let principal = account.principal();

	let token = generate_session_token();
	let session = Session::new(hash_token(&token), &principal, state.auth.session_ttl);
	state.session_repo.create_session(&session).await?;

	AuditEvent::new(AuditEventType::LoginSucceeded)
		.actor(user.id)
		.detail(format!("session {}", session.id))
		.emit();
	tracing::info!(user_id = %user.id, role = ?principal.role, "User logged in");

	let cookie = session_cookie(&token, state.auth.session_ttl, state.auth.secure_cookies)?;
	let response = LoginResponse {
		success: true,
		token,
		expires_at: session.expires_at,
		user: account.profile(),
		permissions: principal.permissions,
	};

	Ok(([(SET_COOKIE, cookie)], Json(response)))
}

/// POST /api/auth/logout - End the current session.
#[tracing::instrument(skip(state, current_user), fields(user_id = %current_user.principal.id))]
pub async fn logout(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
) -> Result<impl IntoResponse> {
	state.session_repo.delete_session(&current_user.session_id).await?;

	AuditEvent::new(AuditEventType::Logout)
		.actor(current_user.principal.id)
		.emit();

	let cookie = clear_session_cookie(state.auth.secure_cookies)?;
	Ok((
		[(SET_COOKIE, cookie)],
		Json(MessageResponse {
			success: true,
			message: "Logged out".to_string(),
		}),
	))
}

/// GET /api/auth/me - The caller's profile.
pub async fn me(RequireAuth(current_user): RequireAuth) -> Json<MeResponse> {
	Json(MeResponse {
		success: true,
		user: current_user.account.profile(),
	})
}

/// GET /api/auth/permissions - The caller's permission set, computed from the
/// role as stored right now.
pub async fn permissions(RequireAuth(current_user): RequireAuth) -> Json<PermissionsResponse> {
	Json(PermissionsResponse {
		success: true,
		principal: current_user.principal,
	})
}

fn session_cookie(token: &str, ttl: Duration, secure: bool) -> Result<HeaderValue> {
	cookie_header(token, ttl.as_secs(), secure)
}

fn clear_session_cookie(secure: bool) -> Result<HeaderValue> {
	cookie_header("", 0, secure)
}

fn cookie_header(value: &str, max_age: u64, secure: bool) -> Result<HeaderValue> {
	let mut cookie =
		format!("{SESSION_COOKIE_NAME}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}");
	if secure {
		cookie.push_str("; Secure");
	}
	HeaderValue::from_str(&cookie)
		.map_err(|e| ServerError::Internal(format!("invalid session cookie: {e}")))
}
