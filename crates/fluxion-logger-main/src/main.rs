// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod config;
mod runtime;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

/// FluxION Logger - solar telemetry into daily spreadsheets
#[derive(Debug, Parser)]
#[command(name = "fluxion-logger", version, about)]
struct Args {
    /// Configuration file (TOML or JSON). Defaults to ./config.toml or ./config.json
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Respects RUST_LOG environment variable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = config::AppConfig::load(args.config.as_deref())?;

    info!("🚀 Starting FluxION Logger v{}", env!("CARGO_PKG_VERSION"));
    info!("   Timezone: {}", config.system.timezone);
    info!(
        "   Channels: {}",
        config
            .channels
            .iter()
            .map(|c| c.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!(
        "   Flush every {}s (reserve {}), forecast every {}s",
        config.writer.flush_interval_secs,
        config.writer.reserve,
        config.forecast.update_interval_secs
    );
    info!("   Debug mode: {}", config.system.debug_mode);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(runtime::run(config))
}
