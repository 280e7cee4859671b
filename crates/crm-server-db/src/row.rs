// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Column decoding shared by the repositories.

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::error::DbError;

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("invalid timestamp '{value}': {e}")))
}

pub(crate) fn parse_optional_timestamp(
	value: Option<String>,
) -> Result<Option<DateTime<Utc>>, DbError> {
	value.as_deref().map(parse_timestamp).transpose()
}

/// Parse an id or enum column through its `FromStr` impl.
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, DbError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	value
		.parse()
		.map_err(|e| DbError::Internal(format!("invalid {column} '{value}': {e}")))
}
