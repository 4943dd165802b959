//! CLI definitions for the `fencecast` binary.
//!
//! `fencecast serve` runs the HTTP relay; `fencecast chat` is an interactive
//! client that talks to a running relay and keeps a live preview file of the
//! latest generated artifact.

pub mod chat;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use fencecast_types::config::{ClientConfig, RelayConfig};

/// Relay chat-completion streams and preview the code they produce.
#[derive(Parser)]
#[command(name = "fencecast", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to ./fencecast.toml).
    #[arg(short, long, global = true, env = "FENCECAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP relay server.
    Serve(ServeArgs),

    /// Chat with a running relay from the terminal.
    Chat(ChatArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind.
    #[arg(long)]
    pub host: Option<String>,

    /// Base URL of the OpenAI-compatible upstream API.
    #[arg(long, env = "UPSTREAM_API_URL")]
    pub upstream_url: Option<String>,

    /// Model used when a request names none.
    #[arg(long)]
    pub default_model: Option<String>,
}

impl ServeArgs {
    /// Layer flags and environment over the file configuration.
    pub fn apply(self, mut config: RelayConfig) -> RelayConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(url) = self.upstream_url {
            config.upstream_url = url;
        }
        if let Some(model) = self.default_model {
            config.default_model = model;
        }
        config
    }
}

#[derive(Args, Debug, Default)]
pub struct ChatArgs {
    /// Base URL of the relay.
    #[arg(long, env = "FENCECAST_SERVER_URL")]
    pub server: Option<String>,

    /// Model to request.
    #[arg(short, long)]
    pub model: Option<String>,

    /// File the latest artifact is written to.
    #[arg(long)]
    pub preview: Option<PathBuf>,

    /// Language tag of the fenced blocks to preview.
    #[arg(long)]
    pub language: Option<String>,
}

impl ChatArgs {
    pub fn apply(self, mut config: ClientConfig) -> ClientConfig {
        if let Some(server) = self.server {
            config.server_url = server;
        }
        if self.model.is_some() {
            config.model = self.model;
        }
        if let Some(preview) = self.preview {
            config.preview_path = preview.to_string_lossy().into_owned();
        }
        if let Some(language) = self.language {
            config.artifact_language = language;
        }
        config
    }
}
