// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client for the permission endpoints.

use std::time::Duration;

use crm_rbac_core::Principal;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{ClientError, Result};
use crate::permissions::Permissions;
use crate::store::PermissionStore;

const USER_AGENT: &str = concat!("crm-client/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const PERMISSIONS_PATH: &str = "/api/auth/permissions";
const STREAM_PATH: &str = "/api/permissions/stream";

#[derive(Debug, Deserialize)]
struct PermissionsPayload {
	#[serde(flatten)]
	principal: Principal,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
	message: String,
}

#[derive(Debug, Default)]
pub struct PermissionsClientBuilder {
	base_url: Option<String>,
	token: Option<String>,
	timeout: Option<Duration>,
	store: Option<PermissionStore>,
}

impl PermissionsClientBuilder {
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());
		self
	}

	/// Session token sent as a bearer credential.
	pub fn token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	/// Share an existing store instead of creating a new one.
	pub fn store(mut self, store: PermissionStore) -> Self {
		self.store = Some(store);
		self
	}

	pub fn build(self) -> Result<PermissionsClient> {
		let base_url = self
			.base_url
			.ok_or_else(|| ClientError::InvalidConfig("base_url is required".to_string()))?;
		let base_url = base_url.trim_end_matches('/').to_string();
		if base_url.is_empty() {
			return Err(ClientError::InvalidConfig("base_url is empty".to_string()));
		}

		let token = self
			.token
			.filter(|t| !t.is_empty())
			.ok_or_else(|| ClientError::InvalidConfig("token is required".to_string()))?;

		let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
		let http = Client::builder()
			.user_agent(USER_AGENT)
			.timeout(timeout)
			.build()?;
		// The stream stays open indefinitely; only connecting is bounded.
		let stream_http = Client::builder()
			.user_agent(USER_AGENT)
			.connect_timeout(timeout)
			.build()?;

		Ok(PermissionsClient {
			base_url,
			token,
			http,
			stream_http,
			store: self.store.unwrap_or_default(),
		})
	}
}

/// Fetches the signed-in user's permissions and keeps them in a
/// [`PermissionStore`].
#[derive(Debug, Clone)]
pub struct PermissionsClient {
	base_url: String,
	token: String,
	http: Client,
	stream_http: Client,
	store: PermissionStore,
}

impl PermissionsClient {
	pub fn builder() -> PermissionsClientBuilder {
		PermissionsClientBuilder::default()
	}

	pub fn store(&self) -> &PermissionStore {
		&self.store
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	pub fn stream_url(&self) -> String {
		format!("{}{STREAM_PATH}", self.base_url)
	}

	/// Request opening the permission change stream.
	pub(crate) fn stream_request(&self) -> reqwest::RequestBuilder {
		self
			.stream_http
			.get(self.stream_url())
			.bearer_auth(&self.token)
			.header("Accept", "text/event-stream")
			.header("Cache-Control", "no-cache")
	}

	/// The current snapshot without contacting the server.
	pub async fn permissions(&self) -> Permissions {
		self.store.permissions().await
	}

	/// Fetch the permission set from the server and overwrite the store.
	/// Safe to call any number of times.
	pub async fn fetch_permissions(&self) -> Result<Permissions> {
		self.refresh().await.map(|(permissions, _)| permissions)
	}

	/// Fetch and store, returning the store version the fetch produced.
	#[instrument(skip(self), fields(base_url = %self.base_url))]
	pub(crate) async fn refresh(&self) -> Result<(Permissions, u64)> {
		let response = self
			.http
			.get(format!("{}{PERMISSIONS_PATH}", self.base_url))
			.bearer_auth(&self.token)
			.send()
			.await?;

		let status = response.status();
		if status == StatusCode::UNAUTHORIZED {
			return Err(ClientError::Unauthorized);
		}
		if !status.is_success() {
			let message = match response.json::<ErrorPayload>().await {
				Ok(body) => body.message,
				Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
			};
			return Err(ClientError::ServerError {
				status: status.as_u16(),
				message,
			});
		}

		let payload: PermissionsPayload = response
			.json()
			.await
			.map_err(|e| ClientError::ParseFailed(e.to_string()))?;

		let version = self.store.replace(payload.principal.clone()).await;
		debug!(
			version,
			role = ?payload.principal.role,
			permissions = payload.principal.permissions.len(),
			"Permissions refreshed"
		);
		Ok((Permissions::new(payload.principal), version))
	}
}
