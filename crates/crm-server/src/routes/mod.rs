// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP handlers.

pub mod auth;
pub mod clients;
pub mod health;
pub mod roles;
pub mod stream;
pub mod users;

use std::str::FromStr;

use axum::{extract::rejection::JsonRejection, Json};

use crate::error::{Result, ServerError};

/// Parse a path identifier, reporting a malformed one as 400.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T> {
	raw
		.parse()
		.map_err(|_| ServerError::BadRequest(format!("Invalid {what} id")))
}

/// Unwrap a JSON body, reporting a rejection in the standard error shape.
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
	payload
		.map(|Json(body)| body)
		.map_err(|rejection| ServerError::BadRequest(rejection.body_text()))
}
