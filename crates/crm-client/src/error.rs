// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
	#[error("invalid client configuration: {0}")]
	InvalidConfig(String),

	#[error("connection failed: {0}")]
	ConnectionFailed(#[from] reqwest::Error),

	/// The session is missing, expired or revoked. Sign in again.
	#[error("not authenticated")]
	Unauthorized,

	#[error("server returned {status}: {message}")]
	ServerError { status: u16, message: String },

	#[error("failed to parse server response: {0}")]
	ParseFailed(String),

	#[error("permission stream error: {0}")]
	SseStreamError(String),
}

impl ClientError {
	/// Whether retrying the same request later could succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			ClientError::ConnectionFailed(_) | ClientError::SseStreamError(_) => true,
			ClientError::ServerError { status, .. } => *status >= 500 || *status == 429,
			ClientError::InvalidConfig(_) | ClientError::Unauthorized | ClientError::ParseFailed(_) => {
				false
			}
		}
	}
}

pub type Result<T> = std::result::Result<T, ClientError>;
