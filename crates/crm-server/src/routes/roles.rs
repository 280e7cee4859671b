// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role administration.
//!
//! Saving a role's permission matrix takes effect on the next request of every
//! holder because permissions are derived per request. The broadcast only
//! shortens how long open clients show stale controls.

use axum::{
	extract::{rejection::JsonRejection, Path, State},
	Json,
};
use crm_rbac_core::{role::validate_permissions, Permission, PermissionEvent, Role, RoleId};
use crm_server_auth::{AuditEvent, AuditEventType};
use serde::{Deserialize, Serialize};

use super::{json_body, parse_id};
use crate::{
	api::AppState,
	auth_middleware::RequireAuth,
	error::{Result, ServerError},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleListResponse {
	pub success: bool,
	pub roles: Vec<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleResponse {
	pub success: bool,
	pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateRolePermissionsRequest {
	pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateRolePermissionsResponse {
	pub success: bool,
	pub role: Role,
	/// Live sessions the change notice reached.
	pub notified: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteRoleResponse {
	pub success: bool,
	pub message: String,
}

/// GET /api/roles - Every role document.
#[tracing::instrument(skip(state))]
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<RoleListResponse>> {
	let roles = state.role_repo.list_roles().await?;
	Ok(Json(RoleListResponse {
		success: true,
		roles,
	}))
}

/// GET /api/roles/{id}
#[tracing::instrument(skip(state))]
pub async fn get_role(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<RoleResponse>> {
	let id: RoleId = parse_id(&id, "role")?;
	let role = state
		.role_repo
		.load_role(&id)
		.await?
		.ok_or_else(|| ServerError::NotFound("Role".to_string()))?;
	Ok(Json(RoleResponse {
		success: true,
		role,
	}))
}

/// PUT /api/roles/{id}/permissions - Replace a role's permission matrix and
/// notify every live session holding the role.
#[tracing::instrument(skip(state, current_user, payload), fields(actor = %current_user.principal.id))]
pub async fn update_role_permissions(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
	Path(id): Path<String>,
	payload: std::result::Result<Json<UpdateRolePermissionsRequest>, JsonRejection>,
) -> Result<Json<UpdateRolePermissionsResponse>> {
	let id: RoleId = parse_id(&id, "role")?;
	let body = json_body(payload)?;

	validate_permissions(&body.permissions).map_err(|e| ServerError::BadRequest(e.to_string()))?;

	let role = state.role_repo.save_role_permissions(&id, &body.permissions).await?;

	AuditEvent::new(AuditEventType::RolePermissionsChanged)
		.actor(current_user.principal.id)
		.resource(format!("role:{}", role.name))
		.detail(format!("{} module entries", role.permissions.len()))
		.emit();

	// Fire-and-forget: the save has already succeeded whatever happens here.
	let notified = state
		.broadcaster
		.broadcast_to_role(role.id, PermissionEvent::permissions_updated(role.id, role.name))
		.await;
	state
		.broadcaster
		.broadcast_to_role(role.id, PermissionEvent::role_updated(role.id, role.name))
		.await;

	tracing::info!(role_id = %role.id, role = %role.name, notified, "Role permissions updated");

	Ok(Json(UpdateRolePermissionsResponse {
		success: true,
		role,
		notified,
	}))
}

/// DELETE /api/roles/{id} - Remove a role no user references.
#[tracing::instrument(skip(state, current_user), fields(actor = %current_user.principal.id))]
pub async fn delete_role(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<DeleteRoleResponse>> {
	let id: RoleId = parse_id(&id, "role")?;
	state.role_repo.delete_role(&id).await?;

	AuditEvent::new(AuditEventType::RoleDeleted)
		.actor(current_user.principal.id)
		.resource(format!("role:{id}"))
		.emit();

	Ok(Json(DeleteRoleResponse {
		success: true,
		message: "Role deleted".to_string(),
	}))
}
