// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! CRM access-control server binary.

use std::path::PathBuf;

use axum::http::{header, HeaderValue, Method};
use clap::{Parser, Subcommand};
use crm_server::{create_app_state, create_router, jobs, seed, version};
use crm_server_config::ServerConfig;
use crm_server_db::{RoleRepository, UserRepository};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CRM server - role-based access control for the CRM API.
#[derive(Parser, Debug)]
#[command(name = "crm-server", about = "CRM access-control server", version)]
struct Args {
	/// Config file to load instead of /etc/crm/server.toml
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the HTTP server (default)
	Serve,
	/// Show version and build information
	Version,
	/// Create the default roles and optionally a super_admin account
	Seed {
		#[arg(long, requires = "admin_password")]
		admin_email: Option<String>,
		#[arg(long, env = "CRM_SEED_ADMIN_PASSWORD", requires = "admin_email")]
		admin_password: Option<String>,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => crm_server_config::load_config_with_file(path.clone())?,
		None => crm_server_config::load_config()?,
	};

	init_tracing(&config);

	let pool = crm_server_db::create_pool(&config.database.url).await?;
	crm_server_db::run_migrations(&pool).await?;

	if let Some(Command::Seed {
		admin_email,
		admin_password,
	}) = &args.command
	{
		let report = seed::seed_installation(
			&RoleRepository::new(pool.clone()),
			&UserRepository::new(pool.clone()),
			admin_email.as_deref(),
			admin_password.as_deref(),
		)
		.await?;
		println!("Roles: {}", report.roles.len());
		if let Some(role) = &report.default_role {
			println!("Default role for new users: {}", role.name);
		}
		if let Some(admin) = report.admin {
			println!("Created super_admin {} ({})", admin.email, admin.id);
		}
		return Ok(());
	}

	// A fresh database gets its roles before the first login.
	RoleRepository::new(pool.clone()).seed_default_roles().await?;

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		"starting crm-server"
	);

	let state = create_app_state(pool, &config);
	let background = jobs::spawn_background_jobs(
		state.clone(),
		std::time::Duration::from_secs(config.auth.session_cleanup_interval_secs),
	);

	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(cors_layer(&config)?);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	background.abort();
	tracing::info!("Server shutdown complete");
	Ok(())
}

fn init_tracing(config: &ServerConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let json = config.logging.json;

	tracing_subscriber::registry()
		.with(filter)
		.with(json.then(|| tracing_subscriber::fmt::layer().json()))
		.with((!json).then(|| tracing_subscriber::fmt::layer()))
		.init();
}

/// A configured origin gets credentialed CORS so the session cookie flows;
/// otherwise any origin may call with a bearer token.
fn cors_layer(config: &ServerConfig) -> Result<CorsLayer, Box<dyn std::error::Error>> {
	let Some(origin) = &config.http.cors_origin else {
		return Ok(CorsLayer::new()
			.allow_origin(Any)
			.allow_methods(Any)
			.allow_headers(Any));
	};

	Ok(CorsLayer::new()
		.allow_origin(origin.parse::<HeaderValue>()?)
		.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
		.allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
		.allow_credentials(true))
}
