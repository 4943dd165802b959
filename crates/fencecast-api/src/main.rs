//! fencecast entry point.
//!
//! Binary name: `fencecast`
//!
//! Parses CLI arguments, loads configuration, then either serves the SSE
//! relay or runs the interactive chat client.

mod cli;
mod http;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use fencecast_infra::config::{load_config, resolve_config_path};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The chat client shares the terminal with its prompt, so it stays quieter.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 if matches!(cli.command, Commands::Serve(_)) => "info",
        0 => "warn",
        1 => "info,fencecast=debug",
        _ => "trace",
    };
    fencecast_observe::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    let config = load_config(&resolve_config_path(cli.config.as_deref())).await;

    let result = match cli.command {
        Commands::Serve(args) => serve(args.apply(config.relay)).await,
        Commands::Chat(args) => cli::chat::loop_runner::run_chat(args.apply(config.client)).await,
    };

    fencecast_observe::shutdown_tracing();
    result
}

async fn serve(config: fencecast_types::config::RelayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::init(config)?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} fencecast relay listening on {}",
        console::style("*").cyan().bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
    tracing::info!("shutdown signal received");
}
