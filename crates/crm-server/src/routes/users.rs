// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User administration: role assignment and activation.

use axum::{
	extract::{rejection::JsonRejection, Path, State},
	Json,
};
use crm_rbac_core::{is_super_admin, PermissionEvent, RoleId, RoleName, UserId};
use crm_server_auth::{AuditEvent, AuditEventType, User};
use serde::{Deserialize, Serialize};

use super::{json_body, parse_id};
use crate::{
	api::AppState,
	auth_middleware::RequireAuth,
	error::{Result, ServerError},
};

pub const SUPER_ADMIN_ASSIGNMENT_DENIED: &str =
	"Access denied. Only a super_admin can grant or revoke the super_admin role";

pub const SUPER_ADMIN_STATUS_DENIED: &str =
	"Access denied. Only a super_admin can activate or deactivate a super_admin";

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
	pub success: bool,
	pub users: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateUserRoleRequest {
	pub role_id: RoleId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetUserActiveRequest {
	pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
	pub success: bool,
	pub user: User,
}

/// GET /api/users
#[tracing::instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>> {
	let users = state.user_repo.list_users().await?;
	Ok(Json(UserListResponse {
		success: true,
		users,
	}))
}

/// PUT /api/users/{id}/role - Reassign a user and notify their live sessions.
#[tracing::instrument(skip(state, current_user, payload), fields(actor = %current_user.principal.id))]
pub async fn update_user_role(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
	Path(id): Path<String>,
	payload: std::result::Result<Json<UpdateUserRoleRequest>, JsonRejection>,
) -> Result<Json<UserResponse>> {
	let user_id: UserId = parse_id(&id, "user")?;
	let body = json_body(payload)?;

	let target = state
		.user_repo
		.load_user_with_role(&user_id)
		.await?
		.ok_or_else(|| ServerError::NotFound("User".to_string()))?;
	let new_role = state
		.role_repo
		.load_role(&body.role_id)
		.await?
		.ok_or_else(|| ServerError::NotFound("Role".to_string()))?;

	let touches_super_admin = new_role.name == RoleName::SuperAdmin
		|| target.role.as_ref().is_some_and(|r| r.name == RoleName::SuperAdmin);
	if touches_super_admin && !is_super_admin(&current_user.principal) {
		return Err(ServerError::Forbidden(SUPER_ADMIN_ASSIGNMENT_DENIED.to_string()));
	}

	state.user_repo.set_user_role(&user_id, &new_role.id).await?;

	AuditEvent::new(AuditEventType::UserRoleChanged)
		.actor(current_user.principal.id)
		.resource(format!("user:{user_id}"))
		.detail(format!(
			"{} -> {}",
			target.role.as_ref().map_or("none", |r| r.name.as_str()),
			new_role.name
		))
		.emit();

	let notified = state
		.broadcaster
		.broadcast_to_user(
			user_id,
			PermissionEvent::user_role_changed(user_id, new_role.id, new_role.name),
		)
		.await;
	tracing::info!(%user_id, role = %new_role.name, notified, "User role changed");

	let user = state
		.user_repo
		.get_user_by_id(&user_id)
		.await?
		.ok_or_else(|| ServerError::NotFound("User".to_string()))?;
	Ok(Json(UserResponse {
		success: true,
		user,
	}))
}

/// PUT /api/users/{id}/active - Activate or deactivate a user. Deactivation
/// ends every session of the user.
#[tracing::instrument(skip(state, current_user, payload), fields(actor = %current_user.principal.id))]
pub async fn set_user_active(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
	Path(id): Path<String>,
	payload: std::result::Result<Json<SetUserActiveRequest>, JsonRejection>,
) -> Result<Json<UserResponse>> {
	let user_id: UserId = parse_id(&id, "user")?;
	let body = json_body(payload)?;

	if user_id == current_user.principal.id && !body.is_active {
		return Err(ServerError::BadRequest(
			"You cannot deactivate your own account".to_string(),
		));
	}

	let target = state
		.user_repo
		.load_user_with_role(&user_id)
		.await?
		.ok_or_else(|| ServerError::NotFound("User".to_string()))?;
	let target_is_super_admin = target
		.role
		.as_ref()
		.is_some_and(|r| r.name == RoleName::SuperAdmin);
	if target_is_super_admin && !is_super_admin(&current_user.principal) {
		return Err(ServerError::Forbidden(SUPER_ADMIN_STATUS_DENIED.to_string()));
	}

	state.user_repo.set_user_active(&user_id, body.is_active).await?;

	if body.is_active {
		AuditEvent::new(AuditEventType::UserReactivated)
			.actor(current_user.principal.id)
			.resource(format!("user:{user_id}"))
			.emit();
	} else {
		let revoked = state.session_repo.delete_sessions_for_user(&user_id).await?;
		AuditEvent::new(AuditEventType::UserDeactivated)
			.actor(current_user.principal.id)
			.resource(format!("user:{user_id}"))
			.detail(format!("{revoked} sessions revoked"))
			.emit();
		state
			.broadcaster
			.broadcast_to_user(user_id, PermissionEvent::session_revoked(user_id))
			.await;
	}

	let user = state
		.user_repo
		.get_user_by_id(&user_id)
		.await?
		.ok_or_else(|| ServerError::NotFound("User".to_string()))?;
	Ok(Json(UserResponse {
		success: true,
		user,
	}))
}
