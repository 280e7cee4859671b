// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server error type and the JSON failure body shared by every rejection path.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use crm_server_auth::AuthError;
use crm_server_db::DbError;
use serde::{Deserialize, Serialize};

pub const AUTHENTICATION_REQUIRED: &str = "Authentication required";
pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";

/// Body of every failed response: `{"success": false, "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub success: bool,
	pub message: String,
}

impl ErrorResponse {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			success: false,
			message: message.into(),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("authentication required")]
	Unauthorized,

	#[error("{0}")]
	Forbidden(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("bad request: {0}")]
	BadRequest(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("internal error: {0}")]
	Internal(String),

	#[error(transparent)]
	Auth(#[from] AuthError),

	#[error(transparent)]
	Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
	pub fn status_code(&self) -> StatusCode {
		match self {
			ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
			ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
			ServerError::NotFound(_) => StatusCode::NOT_FOUND,
			ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ServerError::Conflict(_) => StatusCode::CONFLICT,
			ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
			ServerError::Auth(e) => {
				StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
			}
			ServerError::Db(DbError::NotFound(_)) => StatusCode::NOT_FOUND,
			ServerError::Db(DbError::Conflict(_)) => StatusCode::CONFLICT,
			ServerError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// The message shown to the caller. Internal details never leave the server.
	pub fn public_message(&self) -> String {
		match self {
			ServerError::Unauthorized => AUTHENTICATION_REQUIRED.to_string(),
			ServerError::Forbidden(msg) => msg.clone(),
			ServerError::NotFound(what) => format!("{what} not found"),
			ServerError::BadRequest(msg) | ServerError::Conflict(msg) => msg.clone(),
			ServerError::Internal(_) => INTERNAL_SERVER_ERROR.to_string(),
			ServerError::Auth(e) => auth_message(e),
			ServerError::Db(DbError::NotFound(what)) => format!("{what} not found"),
			ServerError::Db(DbError::Conflict(msg)) => msg.clone(),
			ServerError::Db(_) => INTERNAL_SERVER_ERROR.to_string(),
		}
	}
}

fn auth_message(err: &AuthError) -> String {
	match err {
		AuthError::MissingCredentials | AuthError::SessionExpired | AuthError::Timeout => {
			AUTHENTICATION_REQUIRED.to_string()
		}
		AuthError::InvalidCredentials => "Invalid email or password".to_string(),
		AuthError::AccountLocked { until } => format!(
			"Account is locked due to too many failed login attempts. Try again after {}",
			until.to_rfc3339()
		),
		AuthError::AccountDisabled => "Account is disabled".to_string(),
		AuthError::Forbidden(msg) => msg.clone(),
		AuthError::Integrity(_) => "Access denied".to_string(),
		AuthError::Database(_) | AuthError::Internal(_) => INTERNAL_SERVER_ERROR.to_string(),
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		}
		(status, Json(ErrorResponse::new(self.public_message()))).into_response()
	}
}

pub fn unauthorized_response() -> Response {
	ServerError::Unauthorized.into_response()
}

pub fn forbidden_response(message: impl Into<String>) -> Response {
	ServerError::Forbidden(message.into()).into_response()
}

pub fn internal_error_response() -> Response {
	(
		StatusCode::INTERNAL_SERVER_ERROR,
		Json(ErrorResponse::new(INTERNAL_SERVER_ERROR)),
	)
		.into_response()
}
