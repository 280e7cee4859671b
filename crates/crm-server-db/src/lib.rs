// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the CRM access-control model.
//!
//! Each aggregate has a store trait and a `*Repository` implementation backed
//! by a shared [`SqlitePool`](sqlx::SqlitePool).

pub mod client_record;
pub mod error;
pub mod pool;
pub mod role;
mod row;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod user;

pub use client_record::{ClientRecord, ClientRecordRepository, ClientRecordStore};
pub use error::{DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use role::{RoleRepository, RoleStore};
pub use session::{SessionRepository, SessionStore};
pub use user::{NewUser, UserRepository, UserStore};
