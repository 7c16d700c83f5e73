// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ownership-aware pub/sub broker server.
//!
//! # Usage
//!
//! ```bash
//! # Start with default ports (control 7777, broadcast 7778)
//! broker-server
//!
//! # Custom ports and config file
//! broker-server --control-port 8000 --broadcast-port 8001 --config broker.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use broker_server::{Server, ServerConfig};

/// Ownership-aware topic pub/sub broker
#[derive(Parser, Debug)]
#[command(name = "broker-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address (0.0.0.0 for all interfaces)
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Control endpoint port
    #[arg(long, default_value = "7777")]
    control_port: u16,

    /// Broadcast endpoint port
    #[arg(long, default_value = "7778")]
    broadcast_port: u16,

    /// Heartbeat interval in milliseconds
    #[arg(long, default_value = "1000")]
    heartbeat_ms: u64,

    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = if let Some(path) = args.config {
        tracing::info!("loading config from {:?}", path);
        ServerConfig::from_file(&path).context("failed to load config file")?
    } else {
        ServerConfig {
            bind_address: args.bind.parse().context("invalid bind address")?,
            control_port: args.control_port,
            broadcast_port: args.broadcast_port,
            heartbeat_interval_ms: args.heartbeat_ms,
            ..Default::default()
        }
    };

    tracing::info!(
        control_port = config.control_port,
        broadcast_port = config.broadcast_port,
        heartbeat_ms = config.heartbeat_interval_ms,
        "starting broker server"
    );

    let server = Server::new(config)?;

    let shutdown_handle = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received, stopping server");
        shutdown_handle.shutdown();
    });

    server.run().await?;

    tracing::info!("broker server stopped");
    Ok(())
}
