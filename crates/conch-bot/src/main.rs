//! Conch entry point.
//!
//! Binary name: `conch`
//!
//! Loads the config, wires the relay, and polls Telegram until Ctrl-C.

mod cli;
mod state;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cli::{Cli, Commands};
use conch_infra::config::{default_config_path, load_config};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = conch_observe::tracing_setup::default_filter(cli.verbose, cli.quiet);
    conch_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    conch_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = cli.config.unwrap_or_else(default_config_path);
    let config = load_config(&path)
        .await
        .with_context(|| format!("cannot start without a valid config ({})", path.display()))?;

    if cli.command == Some(Commands::CheckConfig) {
        println!(
            "{}: ok ({} engine, deployment '{}', {} allowed chats)",
            path.display(),
            config.llm.provider,
            config.llm.deployment_id,
            config.allowed_chat_ids.len()
        );
        return Ok(());
    }

    let state = AppState::init(&config)?;
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shutdown.cancel();
            }
            Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });

    info!(
        debug = config.debug,
        parallel_chats = config.parallel_chats,
        retention = state.store.retention(),
        "Why don't you ask the magic conch?"
    );

    let summary = state.dispatcher().run(cancel).await;
    info!(
        dispatched = summary.dispatched,
        conversations = state.store.len(),
        "Bye"
    );
    Ok(())
}
