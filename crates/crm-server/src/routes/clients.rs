// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client records.
//!
//! Route guards decide whether the caller may perform the action at all;
//! handlers then apply the record-level rules: agents list only their own
//! records in their own branch and may not create records for another branch.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
	extract::{rejection::JsonRejection, Path, State},
	http::StatusCode,
	Json,
};
use crm_rbac_core::{is_record_visible, is_same_branch, Branch, UserId};
use crm_server_db::{ClientRecord, ClientRecordStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{json_body, parse_id};
use crate::{
	api::AppState,
	auth_middleware::RequireAuth,
	error::{Result, ServerError},
	guards::OwnerLookup,
};

pub const BRANCH_DENIED: &str = "Access denied. You can only access records in your own branch";

/// Resolves client record owners for the ownership guard.
pub struct ClientOwnerLookup {
	repo: Arc<dyn ClientRecordStore>,
}

impl ClientOwnerLookup {
	pub fn new(repo: Arc<dyn ClientRecordStore>) -> Self {
		Self { repo }
	}
}

#[async_trait]
impl OwnerLookup for ClientOwnerLookup {
	async fn owner_of(&self, resource_id: &str) -> Result<Option<UserId>> {
		// A malformed id names no record.
		let Ok(id) = resource_id.parse::<Uuid>() else {
			return Ok(None);
		};
		Ok(self.repo.get_client(id).await?.map(|record| record.owner_id))
	}
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientListResponse {
	pub success: bool,
	pub clients: Vec<ClientRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientResponse {
	pub success: bool,
	pub client: ClientRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateClientRequest {
	pub name: String,
	/// Defaults to the caller's branch.
	#[serde(default)]
	pub branch: Option<Branch>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateClientRequest {
	pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteClientResponse {
	pub success: bool,
	pub message: String,
}

fn validate_name(name: &str) -> Result<String> {
	let name = name.trim();
	if name.is_empty() {
		return Err(ServerError::BadRequest("Client name is required".to_string()));
	}
	Ok(name.to_string())
}

/// GET /api/clients - Records visible to the caller.
#[tracing::instrument(skip(state, current_user), fields(user_id = %current_user.principal.id))]
pub async fn list_clients(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
) -> Result<Json<ClientListResponse>> {
	let principal = &current_user.principal;
	let clients: Vec<ClientRecord> = state
		.client_repo
		.list_clients()
		.await?
		.into_iter()
		.filter(|record| is_record_visible(principal, Some(&record.owner_id), None, Some(record.branch)))
		.collect();

	tracing::debug!(visible = clients.len(), "Listed client records");
	Ok(Json(ClientListResponse {
		success: true,
		clients,
	}))
}

/// POST /api/clients - Create a record owned by the caller.
#[tracing::instrument(skip(state, current_user, payload), fields(user_id = %current_user.principal.id))]
pub async fn create_client(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
	payload: std::result::Result<Json<CreateClientRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ClientResponse>)> {
	let body = json_body(payload)?;
	let principal = &current_user.principal;
	let name = validate_name(&body.name)?;
	let branch = body.branch.unwrap_or(principal.branch);

	if !is_same_branch(principal, branch) {
		return Err(ServerError::Forbidden(BRANCH_DENIED.to_string()));
	}

	let record = ClientRecord::new(name, principal.id, branch);
	state.client_repo.create_client(&record).await?;

	tracing::info!(client_id = %record.id, %branch, "Client record created");
	Ok((
		StatusCode::CREATED,
		Json(ClientResponse {
			success: true,
			client: record,
		}),
	))
}

/// GET /api/clients/{id}
#[tracing::instrument(skip(state))]
pub async fn get_client(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<ClientResponse>> {
	let id: Uuid = parse_id(&id, "client")?;
	let client = state
		.client_repo
		.get_client(id)
		.await?
		.ok_or_else(|| ServerError::NotFound("Client".to_string()))?;
	Ok(Json(ClientResponse {
		success: true,
		client,
	}))
}

/// PUT /api/clients/{id}
#[tracing::instrument(skip(state, payload))]
pub async fn update_client(
	State(state): State<AppState>,
	Path(id): Path<String>,
	payload: std::result::Result<Json<UpdateClientRequest>, JsonRejection>,
) -> Result<Json<ClientResponse>> {
	let id: Uuid = parse_id(&id, "client")?;
	let body = json_body(payload)?;
	let name = validate_name(&body.name)?;

	let client = state.client_repo.update_client_name(id, &name).await?;
	Ok(Json(ClientResponse {
		success: true,
		client,
	}))
}

/// DELETE /api/clients/{id}
#[tracing::instrument(skip(state, current_user), fields(user_id = %current_user.principal.id))]
pub async fn delete_client(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<DeleteClientResponse>> {
	let id: Uuid = parse_id(&id, "client")?;
	state.client_repo.delete_client(id).await?;

	tracing::info!(client_id = %id, "Client record deleted");
	Ok(Json(DeleteClientResponse {
		success: true,
		message: "Client deleted".to_string(),
	}))
}
