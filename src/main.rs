// illustrator-relay/src/main.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;

use illustrator_relay::commands::Dispatcher;
use illustrator_relay::connection::ConnectionManager;
use illustrator_relay::error::AnyResult;
use illustrator_relay::host::{Host, MemoryHost};
use illustrator_relay::panel::Panel;
use illustrator_relay::{config, log};

/// Illustrator relay: executes proxy commands against a document host
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base directory holding config/ and log/ (default: ~/.illustrator-relay)
    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Proxy endpoint, overrides `proxy_url` from relay.toml
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Connect right away instead of waiting for the panel button
    #[arg(long)]
    connect: bool,

    /// Run without the panel: connect and serve until Ctrl+C
    #[arg(long)]
    no_panel: bool,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let mut config = config::load(cli.base_dir).await?;
    if let Some(url) = cli.url {
        config.proxy_url = url;
    }

    // 2. Initialize logging (should be the first side effect)
    let _log_guard = log::init(&config)?;
    tracing::info!("Starting up (v{})", env!("CARGO_PKG_VERSION"));

    // 3. Host and command pipeline
    let host = Arc::new(MemoryHost::new());
    let evaluator = if config.unsafe_eval {
        let evaluator = host.script_evaluator();
        if evaluator.is_none() {
            tracing::warn!("unsafe_eval is enabled but the host has no script evaluator");
        }
        evaluator
    } else {
        None
    };
    let dispatcher = Dispatcher::standard(host, evaluator);

    let manager = ConnectionManager::new(&config.proxy_url, &config.application, dispatcher);
    tracing::debug!("Proxy endpoint: {}", manager.endpoint());

    if cli.connect || cli.no_panel {
        if let Err(e) = manager.connect().await {
            tracing::error!("Initial connect failed: {}", e);
        }
    }

    if cli.no_panel {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, shutting down...");
    } else {
        let panel = Panel::new(manager.clone());
        tokio::select! {
            result = panel.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => result?,
            _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C, shutting down..."),
        }
    }

    manager.disconnect().await;
    tracing::info!("Shutting down");

    drop(_log_guard);

    Ok(())
}
