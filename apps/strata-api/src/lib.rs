pub mod routes;
pub mod state;

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use color_eyre::eyre;
use tokio::{net::TcpListener, sync::watch};
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = strata_config::load(&args.config)?;

	init_tracing(&config)?;

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let admin_addr: SocketAddr = config.service.admin_bind.parse()?;

	if !admin_addr.ip().is_loopback() {
		return Err(eyre::eyre!("admin_bind must be a loopback address."));
	}

	let state = AppState::new(config).await?;
	let app = routes::router(state.clone());
	let admin_app = routes::admin_router(state.clone());
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	tokio::spawn(async move {
		if let Err(err) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %err, "Failed to listen for the shutdown signal.");

			return;
		}

		tracing::info!("Shutdown requested.");

		let _ = shutdown_tx.send(true);
	});

	state.engine.start();

	let http_listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	let http_server = axum::serve(http_listener, app)
		.with_graceful_shutdown(shutdown_signal(shutdown_rx.clone()));
	let admin_listener = TcpListener::bind(admin_addr).await?;

	tracing::info!(%admin_addr, "Admin server listening.");

	let admin_server =
		axum::serve(admin_listener, admin_app).with_graceful_shutdown(shutdown_signal(shutdown_rx));
	let served = tokio::try_join!(http_server, admin_server);

	state.engine.stop().await;

	tracing::info!("Servers stopped.");

	served?;

	Ok(())
}

fn init_tracing(config: &strata_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}

/// Resolves once shutdown is requested. Never resolves if the sender is dropped first.
async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
	if rx.wait_for(|stop| *stop).await.is_err() {
		std::future::pending::<()>().await;
	}
}
