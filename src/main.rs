// memgate - memory-enabled gateway for LLM completions
//
// This tool fronts an LLM-completion backend with a stable external API:
// /chat/completions (buffered JSON or SSE streaming) plus a transparent
// relay for everything else.
//
// Architecture:
// - Gateway server (axum): external HTTP surface, routes to the
//   completion dispatcher or the catch-all relay
// - Backend supervisor: embedded model-routing service on its own thread,
//   health-gated before the gateway accepts traffic
// - Upstream client: one pooled HTTP client per process, lifecycle-guarded
// - Completion engine: executes completion requests against the upstream
// - Memory service: persistent-context collaborator, enabled once at startup

mod backend;
mod cli;
mod config;
mod engine;
mod gateway;
mod logging;
mod memory;
mod startup;

use anyhow::Result;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Handle CLI subcommands first (config --show, --reset, --edit, ...)
    // If a subcommand was handled, exit early
    let Some(serve_args) = cli::handle_cli() else {
        return Ok(());
    };

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    // Load configuration; CLI flags override once, before launch
    let mut config = Config::from_env();
    config.apply_cli(&serve_args);

    // Initialize tracing. The guard must be kept alive for the duration of
    // the program to ensure file logs flush.
    let _file_guard = logging::init(&config);

    startup::print_startup(&config);
    startup::log_startup(&config);

    // Activate the memory collaborator exactly once, before serving starts
    memory::Memory::from_config(&config.memory).enable()?;

    // Ctrl-C triggers graceful shutdown through a oneshot signal
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down...");
            let _ = shutdown_tx.send(());
        }
    });

    // A startup failure (backend never became ready) aborts here with a
    // nonzero exit - the gateway never serves with a dead backend
    gateway::run(config, shutdown_rx).await
}
