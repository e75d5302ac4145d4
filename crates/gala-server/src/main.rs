// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gala server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gala_identity_core::SystemClock;
use gala_server::{create_app_state, create_router};
use gala_server_config::{LogFormat, LoggingConfig};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Gala server - receives identity provider webhooks and provisions users.
#[derive(Parser, Debug)]
#[command(name = "gala-server", about = "Gala identity webhook server", version)]
struct Args {
	/// Path to a TOML config file
	#[arg(long, env = "GALA_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);

	match logging.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stdout))
			.init(),
		LogFormat::Pretty => registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
			.init(),
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	// Fails before binding when the signing secret is missing
	let config = match &args.config {
		Some(path) => gala_server::load_config_with_file(path)?,
		None => gala_server::load_config()?,
	};

	init_tracing(&config.logging);

	config.log_summary();

	let pool =
		gala_server_db::create_pool_with_max_connections(&config.database.url, config.database.max_connections)
			.await?;
	gala_server_db::run_migrations(&pool).await?;

	let state = create_app_state(pool.clone(), &config, Arc::new(SystemClock))?;

	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "failed to listen for shutdown signal");
			}
			tracing::info!("Received shutdown signal");
		})
		.await?;

	pool.close().await;
	tracing::info!("Server shutdown complete");
	Ok(())
}
