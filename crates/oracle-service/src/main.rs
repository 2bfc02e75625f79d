use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oracle_config::{Config, ConfigLoader};
use oracle_core::{OracleBuilder, OracleEngine};
use oracle_sources::PriceSourceInterface;
use oracle_types::{Address, EventBus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

#[derive(Parser)]
#[command(name = "price-oracle")]
#[command(about = "Oracle aggregation and fallback price service", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "ORACLE_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the oracle service
	Start,
	/// Validate the configuration file and build every configured component
	Validate,
	/// Resolve the USD price of an asset once and exit
	Price {
		asset: Address,
		/// Query this fallback oracle instead of the master registry
		#[arg(long)]
		oracle: Option<String>,
	},
	/// Print the stable coin currently holding its peg
	Stable,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_service(&cli.config).await,
		Some(Commands::Validate) => validate_config(&cli.config).await,
		Some(Commands::Price { asset, ref oracle }) => {
			print_price(&cli.config, asset, oracle.as_deref()).await
		}
		Some(Commands::Stable) => print_stable_coin(&cli.config).await,
	}
}

async fn load_config(path: &Path) -> Result<Config> {
	info!("Loading configuration from: {:?}", path);
	ConfigLoader::new()
		.with_file(path)
		.load()
		.await
		.context("Failed to load configuration")
}

async fn build_engine(path: &Path) -> Result<OracleEngine> {
	let config = load_config(path).await?;
	OracleBuilder::new(config)
		.build()
		.context("Failed to build oracle engine")
}

async fn start_service(path: &Path) -> Result<()> {
	info!("Starting price oracle service");

	let engine = Arc::new(build_engine(path).await?);
	let config = engine.config().clone();
	info!("Engine name: {}", config.engine.name);

	let events_handle = tokio::spawn(log_governance_events(engine.event_bus().clone()));

	let http_handle = if config.api.enabled {
		let engine = engine.clone();
		let (host, port) = (config.api.host.clone(), config.api.port);
		Some(tokio::spawn(async move {
			if let Err(e) = api::start_http_server(engine, host, port).await {
				error!("HTTP server stopped: {:#}", e);
			}
		}))
	} else {
		info!("HTTP API disabled");
		None
	};

	info!("Price oracle service started successfully");

	setup_shutdown_signal().await;

	info!("Shutdown signal received, stopping services...");

	if let Some(handle) = http_handle {
		handle.abort();
	}
	events_handle.abort();

	info!("Price oracle service stopped");
	Ok(())
}

async fn validate_config(path: &Path) -> Result<()> {
	let engine = build_engine(path).await?;
	let config = engine.config();

	info!("Configuration is valid");
	info!("Engine name: {}", config.engine.name);
	info!("Governance owner: {}", engine.governance().owner());
	for id in engine.providers().providers() {
		if let Ok(source) = engine.providers().source(id) {
			info!("  Provider: {} ({})", id, source.name());
		}
	}
	for name in engine.oracle_names() {
		if let Some(oracle) = engine.oracle(name) {
			let oracle_config = oracle.config();
			info!(
				"  Oracle: {} (primary {}, fallback A {}, fallback B {})",
				name, oracle_config.primary, oracle_config.fallback_a, oracle_config.fallback_b
			);
		}
	}
	info!("  Assets with a dedicated oracle: {}", engine.master().tokens().len());
	if let Some(peg) = engine.stable_peg() {
		let state = peg.state();
		info!(
			"  Stable peg: {} / {} via {}",
			state.primary.address, state.secondary.address, state.provider
		);
	}

	Ok(())
}

async fn print_price(path: &Path, asset: Address, oracle: Option<&str>) -> Result<()> {
	let engine = build_engine(path).await?;

	let price = match oracle {
		Some(name) => {
			let oracle = engine
				.oracle(name)
				.with_context(|| format!("No oracle named '{}'", name))?;
			oracle.get_price_in_usd(asset).await
		}
		None => engine.master().get_price(asset).await,
	}
	.with_context(|| format!("Failed to price {}", asset))?;

	println!(
		"{}",
		serde_json::json!({
			"asset": asset,
			"price_in_usd": price.price_in_usd.to_string(),
			"updated_at": price.updated_at,
		})
	);
	Ok(())
}

async fn print_stable_coin(path: &Path) -> Result<()> {
	let engine = build_engine(path).await?;
	let peg = engine
		.stable_peg()
		.context("No stable peg configured")?;

	let coin = peg
		.get_stable_coin_if_pegged()
		.await
		.context("Failed to resolve stable coin")?;

	println!(
		"{}",
		serde_json::json!({
			"address": coin.address,
			"decimals": coin.decimals,
		})
	);
	Ok(())
}

/// Logs every governance change until the bus is dropped.
async fn log_governance_events(events: EventBus) {
	let mut receiver = events.subscribe();
	loop {
		match receiver.recv().await {
			Ok(event) => info!(?event, "Governance change"),
			Err(RecvError::Lagged(skipped)) => warn!(skipped, "Governance event logger lagged"),
			Err(RecvError::Closed) => break,
		}
	}
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.try_init()
		.context("Failed to initialize tracing")?;

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				error!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
