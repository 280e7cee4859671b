// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request authentication.
//!
//! [`auth_layer`] resolves the credential on every request and attaches an
//! [`AuthContext`]. The principal's role and permissions are loaded from the
//! database each time; the snapshot stored with the session is never used for
//! a decision. Resolution is bounded by the configured timeout and a timeout is
//! treated as "not authenticated".

use std::future::Future;
use std::time::Duration;

use axum::{
	extract::{FromRequestParts, Request, State},
	http::{request::Parts, HeaderMap},
	middleware::Next,
	response::{IntoResponse, Response},
};
use crm_server_auth::{
	extract_credential, hash_token, AuthContext, AuthError, CurrentUser,
};
use crm_server_db::DbError;
use tracing::instrument;

use crate::api::AppState;
use crate::error::{unauthorized_response, ServerError};

/// Resolve a credential to a user with freshly loaded permissions.
#[instrument(skip_all)]
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, AuthError> {
	let token = extract_credential(headers).ok_or(AuthError::MissingCredentials)?;

	let session = state
		.session_repo
		.get_session_by_token_hash(&hash_token(&token))
		.await
		.map_err(db_to_auth)?
		.ok_or(AuthError::InvalidCredentials)?;

	if session.is_expired() {
		if let Err(e) = state.session_repo.delete_session(&session.id).await {
			tracing::warn!(session_id = %session.id, error = %e, "Failed to delete expired session");
		}
		return Err(AuthError::SessionExpired);
	}

	let account = state
		.user_repo
		.load_user_with_role(&session.user_id)
		.await
		.map_err(db_to_auth)?
		.ok_or(AuthError::InvalidCredentials)?;

	if !account.user.is_active {
		return Err(AuthError::AccountDisabled);
	}

	let current_user = CurrentUser::from_session(account, session.id);

	if current_user.principal.role.is_none() {
		tracing::warn!(
			user_id = %current_user.principal.id,
			"Authenticated user has no usable role; all permission checks will fail"
		);
	} else if current_user.principal.permissions != session.permissions_snapshot {
		tracing::debug!(
			user_id = %current_user.principal.id,
			"Session permission snapshot is stale; using current role"
		);
	}

	Ok(current_user)
}

/// Run `authentication` with an upper bound. Elapsed time counts as a failure.
pub async fn bounded<F>(timeout: Duration, authentication: F) -> Result<CurrentUser, AuthError>
where
	F: Future<Output = Result<CurrentUser, AuthError>>,
{
	match tokio::time::timeout(timeout, authentication).await {
		Ok(result) => result,
		Err(_) => {
			tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Authentication timed out");
			Err(AuthError::Timeout)
		}
	}
}

fn db_to_auth(err: DbError) -> AuthError {
	AuthError::Database(err.to_string())
}

/// Attach an [`AuthContext`] to the request. Never rejects on its own except
/// for internal failures, which are reported as 500.
pub async fn auth_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
	let headers = req.headers().clone();
	let result = bounded(state.auth.timeout, authenticate(&state, &headers)).await;

	let ctx = match result {
		Ok(current_user) => {
			tracing::debug!(
				user_id = %current_user.principal.id,
				role = ?current_user.principal.role,
				"Request authenticated"
			);
			AuthContext::authenticated(current_user)
		}
		Err(e) if e.is_internal() => {
			return ServerError::Auth(e).into_response();
		}
		Err(e) => {
			tracing::debug!(reason = %e, "Request not authenticated");
			AuthContext::unauthenticated()
		}
	};

	req.extensions_mut().insert(ctx);
	next.run(req).await
}

/// Reject requests that [`auth_layer`] could not authenticate.
pub async fn require_auth_layer(req: Request, next: Next) -> Response {
	let authenticated = req
		.extensions()
		.get::<AuthContext>()
		.is_some_and(AuthContext::is_authenticated);

	if !authenticated {
		return unauthorized_response();
	}
	next.run(req).await
}

/// Extractor for the authenticated user.
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
	S: Send + Sync,
{
	type Rejection = ServerError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts
			.extensions
			.get::<AuthContext>()
			.and_then(|ctx| ctx.current_user.clone())
			.map(RequireAuth)
			.ok_or(ServerError::Unauthorized)
	}
}
