// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication for the CRM server.
//!
//! - **Passwords**: Argon2id hashing ([`hash_password`], [`verify_password`])
//! - **Sessions**: random bearer tokens stored as SHA-256 digests ([`Session`])
//! - **Lockout**: consecutive-failure lock ([`LockoutPolicy`])
//! - **Request context**: [`AuthContext`] / [`CurrentUser`] carrying a freshly
//!   derived [`crm_rbac_core::Principal`]
//! - **Audit**: structured security events ([`AuditEvent`])

mod argon2_config;
pub mod audit;
pub mod error;
pub mod lockout;
pub mod middleware;
pub mod password;
pub mod session;
pub mod user;

pub use audit::{AuditEvent, AuditEventType, AUDIT_TARGET};
pub use error::{AuthError, Result};
pub use lockout::{LockState, LockoutPolicy};
pub use middleware::{
	extract_bearer_token, extract_credential, extract_session_cookie, AuthContext, AuthRequired,
	CurrentUser, SESSION_COOKIE_NAME,
};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use session::{generate_session_token, Session};
pub use user::{normalize_email, User, UserProfile, UserWithRole};

/// SHA-256 hex digest of a bearer token; the only form in which tokens are stored.
pub fn hash_token(token: &str) -> String {
	use sha2::{Digest, Sha256};
	let mut hasher = Sha256::new();
	hasher.update(token.as_bytes());
	hex::encode(hasher.finalize())
}
