use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wasm_registry::ioutils::{self, PayloadKind};
use wasm_registry::store::{load_snapshot, save_snapshot};
use wasm_registry::{Checksum, MigrationChain, Registry, WasmConfig, CONSENSUS_VERSION};

#[derive(Parser)]
#[command(name = "wasm-registry")]
#[command(about = "Inspect wasm payloads and migrate x/wasm store snapshots")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/wasm.toml")]
    pub config: PathBuf,

    /// Log level, overrides the configuration file
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify and admit a wasm payload, raw or gzip
    Inspect {
        #[arg(long)]
        file: PathBuf,
    },
    /// Show schema version and record counts of a store snapshot
    Status {
        #[arg(long)]
        store: PathBuf,
    },
    /// Run store migrations on a snapshot, writing it back only on success
    Migrate {
        #[arg(long)]
        store: PathBuf,
        /// Target schema version
        #[arg(long)]
        target: Option<u64>,
    },
}

fn load_config(path: &Path) -> anyhow::Result<WasmConfig> {
    if path.exists() {
        WasmConfig::load(path)
    } else {
        Ok(WasmConfig::default())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let log_level = cli.log_level.clone().unwrap_or_else(|| config.logging.log_level.clone());

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("wasm_registry={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !cli.config.exists() {
        warn!("Configuration file {} not found, using defaults", cli.config.display());
    }

    match cli.command {
        Commands::Inspect { file } => inspect(&config, &file),
        Commands::Status { store } => status(&config, &store),
        Commands::Migrate { store, target } => migrate(&config, &store, target),
    }
}

fn inspect(config: &WasmConfig, file: &Path) -> anyhow::Result<()> {
    let payload = std::fs::read(file)?;
    let kind = ioutils::classify(&payload)?;
    let code = ioutils::admit(&payload, config.limits.max_wasm_size as u64)?;

    let kind = match kind {
        PayloadKind::Gzip => "gzip",
        PayloadKind::Wasm => "wasm",
    };
    println!("format:   {}", kind);
    println!("payload:  {} bytes", payload.len());
    println!("wasm:     {} bytes", code.len());
    println!("checksum: {}", Checksum::generate(&code));
    Ok(())
}

fn status(config: &WasmConfig, path: &Path) -> anyhow::Result<()> {
    let registry = Registry::new(load_snapshot(path)?);

    let mut codes = 0usize;
    registry.iterate_codes(|_, _| {
        codes += 1;
        false
    })?;
    let mut contracts = 0usize;
    registry.iterate_contracts(|_, _| {
        contracts += 1;
        false
    })?;

    let version = registry.schema_version()?;
    println!(
        "schema version: {}",
        version.map(|v| v.to_string()).unwrap_or_else(|| "unset".to_string())
    );
    println!("codes:          {}", codes);
    println!("contracts:      {}", contracts);
    if registry.has_params() {
        let params = registry.params()?;
        println!("upload access:  {}", params.code_upload_access);
        println!("instantiate:    {}", params.instantiate_default_permission);
    }
    if version.unwrap_or(1) < CONSENSUS_VERSION {
        println!("pending migrations to version {}", CONSENSUS_VERSION);
    }
    info!(prefix = %config.module.bech32_prefix, "status complete");
    Ok(())
}

fn migrate(config: &WasmConfig, path: &Path, target: Option<u64>) -> anyhow::Result<()> {
    let target = target.unwrap_or(CONSENSUS_VERSION);
    let mut registry = Registry::new(load_snapshot(path)?);
    let chain = MigrationChain::module_default(&config.migrations);

    let version = chain.upgrade(&mut registry, target)?;
    save_snapshot(registry.store(), path)?;
    info!("Store {} migrated to version {}", path.display(), version);
    Ok(())
}
