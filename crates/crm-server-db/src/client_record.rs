// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Owned client records, the resource the ownership and branch rules apply to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crm_rbac_core::{Branch, UserId};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::error::DbError;
use crate::row::{parse_column, parse_timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
	pub id: Uuid,
	pub name: String,
	pub owner_id: UserId,
	pub branch: Branch,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl ClientRecord {
	pub fn new(name: impl Into<String>, owner_id: UserId, branch: Branch) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4(),
			name: name.into(),
			owner_id,
			branch,
			created_at: now,
			updated_at: now,
		}
	}
}

#[async_trait]
pub trait ClientRecordStore: Send + Sync {
	async fn create_client(&self, record: &ClientRecord) -> Result<(), DbError>;
	async fn get_client(&self, id: Uuid) -> Result<Option<ClientRecord>, DbError>;
	async fn list_clients(&self) -> Result<Vec<ClientRecord>, DbError>;
	async fn update_client_name(&self, id: Uuid, name: &str) -> Result<ClientRecord, DbError>;
	async fn delete_client(&self, id: Uuid) -> Result<(), DbError>;
}

#[async_trait]
impl ClientRecordStore for ClientRecordRepository {
	async fn create_client(&self, record: &ClientRecord) -> Result<(), DbError> {
		self.create_client(record).await
	}

	async fn get_client(&self, id: Uuid) -> Result<Option<ClientRecord>, DbError> {
		self.get_client(id).await
	}

	async fn list_clients(&self) -> Result<Vec<ClientRecord>, DbError> {
		self.list_clients().await
	}

	async fn update_client_name(&self, id: Uuid, name: &str) -> Result<ClientRecord, DbError> {
		self.update_client_name(id, name).await
	}

	async fn delete_client(&self, id: Uuid) -> Result<(), DbError> {
		self.delete_client(id).await
	}
}

#[derive(Clone)]
pub struct ClientRecordRepository {
	pool: SqlitePool,
}

impl ClientRecordRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, record), fields(client_id = %record.id, owner_id = %record.owner_id))]
	pub async fn create_client(&self, record: &ClientRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO client_records (id, name, owner_id, branch, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(record.id.to_string())
		.bind(&record.name)
		.bind(record.owner_id.to_string())
		.bind(record.branch.as_str())
		.bind(record.created_at.to_rfc3339())
		.bind(record.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "client record"))?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_client(&self, id: Uuid) -> Result<Option<ClientRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, owner_id, branch, created_at, updated_at
			FROM client_records
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_client_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_clients(&self) -> Result<Vec<ClientRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, owner_id, branch, created_at, updated_at
			FROM client_records
			ORDER BY created_at ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_client_row).collect()
	}

	#[tracing::instrument(skip(self, name))]
	pub async fn update_client_name(&self, id: Uuid, name: &str) -> Result<ClientRecord, DbError> {
		let result = sqlx::query("UPDATE client_records SET name = ?, updated_at = ? WHERE id = ?")
			.bind(name)
			.bind(Utc::now().to_rfc3339())
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("client {id}")));
		}
		self
			.get_client(id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("client {id}")))
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_client(&self, id: Uuid) -> Result<(), DbError> {
		let result = sqlx::query("DELETE FROM client_records WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("client {id}")));
		}
		Ok(())
	}
}

fn parse_client_row(row: &SqliteRow) -> Result<ClientRecord, DbError> {
	let id: String = row.get("id");
	let owner_id: String = row.get("owner_id");
	let branch: String = row.get("branch");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(ClientRecord {
		id: parse_column("client id", &id)?,
		name: row.get("name"),
		owner_id: parse_column("owner id", &owner_id)?,
		branch: parse_column("branch", &branch)?,
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
	})
}
