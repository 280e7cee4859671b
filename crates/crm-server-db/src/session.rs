// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session repository.
//!
//! Only the SHA-256 hash of a session token is stored. The role and permission
//! snapshots are informational; authorization always re-reads the role.

use async_trait::async_trait;
use chrono::Utc;
use crm_rbac_core::{PermissionSet, SessionId, UserId};
use crm_server_auth::Session;
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};

use crate::error::DbError;
use crate::row::{parse_column, parse_timestamp};

#[async_trait]
pub trait SessionStore: Send + Sync {
	async fn create_session(&self, session: &Session) -> Result<(), DbError>;
	async fn get_session_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, DbError>;
	async fn delete_session(&self, id: &SessionId) -> Result<bool, DbError>;
	async fn delete_sessions_for_user(&self, user_id: &UserId) -> Result<u64, DbError>;
	async fn delete_expired_sessions(&self) -> Result<u64, DbError>;
}

#[async_trait]
impl SessionStore for SessionRepository {
	async fn create_session(&self, session: &Session) -> Result<(), DbError> {
		self.create_session(session).await
	}

	async fn get_session_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, DbError> {
		self.get_session_by_token_hash(token_hash).await
	}

	async fn delete_session(&self, id: &SessionId) -> Result<bool, DbError> {
		self.delete_session(id).await
	}

	async fn delete_sessions_for_user(&self, user_id: &UserId) -> Result<u64, DbError> {
		self.delete_sessions_for_user(user_id).await
	}

	async fn delete_expired_sessions(&self) -> Result<u64, DbError> {
		self.delete_expired_sessions().await
	}
}

#[derive(Clone)]
pub struct SessionRepository {
	pool: SqlitePool,
}

impl SessionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, session), fields(session_id = %session.id, user_id = %session.user_id))]
	pub async fn create_session(&self, session: &Session) -> Result<(), DbError> {
		let snapshot = serde_json::to_string(&session.permissions_snapshot)?;

		sqlx::query(
			r#"
			INSERT INTO sessions (id, user_id, token_hash, role_snapshot, permissions_snapshot, created_at, expires_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(session.id.to_string())
		.bind(session.user_id.to_string())
		.bind(&session.token_hash)
		.bind(session.role_snapshot.map(|r| r.as_str()))
		.bind(&snapshot)
		.bind(session.created_at.to_rfc3339())
		.bind(session.expires_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "session"))?;

		tracing::debug!(session_id = %session.id, "session created");
		Ok(())
	}

	#[tracing::instrument(skip(self, token_hash))]
	pub async fn get_session_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, user_id, token_hash, role_snapshot, permissions_snapshot, created_at, expires_at
			FROM sessions
			WHERE token_hash = ?
			"#,
		)
		.bind(token_hash)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_session_row).transpose()
	}

	#[tracing::instrument(skip(self), fields(session_id = %id))]
	pub async fn delete_session(&self, id: &SessionId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn delete_sessions_for_user(&self, user_id: &UserId) -> Result<u64, DbError> {
		let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
			.bind(user_id.to_string())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected();
		tracing::debug!(user_id = %user_id, deleted, "sessions revoked");
		Ok(deleted)
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_expired_sessions(&self) -> Result<u64, DbError> {
		let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
			.bind(Utc::now().to_rfc3339())
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}
}

fn parse_session_row(row: &SqliteRow) -> Result<Session, DbError> {
	let id: String = row.get("id");
	let user_id: String = row.get("user_id");
	let role_snapshot: Option<String> = row.get("role_snapshot");
	let snapshot: String = row.get("permissions_snapshot");
	let created_at: String = row.get("created_at");
	let expires_at: String = row.get("expires_at");

	// A stale snapshot is not used for decisions, so a bad one is dropped.
	let permissions_snapshot: PermissionSet = serde_json::from_str(&snapshot).unwrap_or_default();

	Ok(Session {
		id: parse_column("session id", &id)?,
		user_id: parse_column("user id", &user_id)?,
		token_hash: row.get("token_hash"),
		role_snapshot: role_snapshot.as_deref().and_then(|r| r.parse().ok()),
		permissions_snapshot,
		created_at: parse_timestamp(&created_at)?,
		expires_at: parse_timestamp(&expires_at)?,
	})
}
