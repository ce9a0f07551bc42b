//! # Command-line interface
//!
//! Typed argument parsing via `clap`'s derive API, in the teacher's
//! style (`#[derive(Parser)]`, grouped doc comments, custom help styling).
//! Config path, socket path, and admin token each resolve CLI flag >
//! environment variable > built-in default, per spec.md §6.

use clap::builder::styling::{AnsiColor, Styles};
use clap::Parser;
use std::path::PathBuf;

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// bridge-daemon — local inter-process messaging bridge
///
/// Accepts authenticated local clients over a Unix domain socket, routes
/// structured envelopes between them under a per-sender allowlist, and
/// queues envelopes for offline recipients. Exposes a small token-gated
/// HTTP API for operators.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
pub struct Args {
    /// Path to the JSON configuration file.
    ///
    /// Overrides the `BRIDGE_CONFIG_PATH` environment variable, which in
    /// turn overrides the built-in default of `./run/config.json`.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the Unix domain socket path from the config file.
    #[arg(long)]
    pub socket_path: Option<PathBuf>,

    /// Admin token in plaintext, hashed in-process and compared against
    /// the configured `adminTokenHash`. Overrides `BRIDGE_ADMIN_TOKEN`.
    #[arg(long)]
    pub admin_token: Option<String>,

    /// Where to write detailed logs: a file path, or "stderr".
    #[arg(long)]
    pub log_file: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress the colorized stdout log layer.
    #[arg(long)]
    pub quiet: bool,
}

impl Args {
    /// Resolve the config path: CLI flag, then `BRIDGE_CONFIG_PATH`, then
    /// the built-in default.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .or_else(|| std::env::var_os("BRIDGE_CONFIG_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("run/config.json"))
    }

    /// Resolve the socket path override: CLI flag, then
    /// `BRIDGE_SOCKET_PATH`. `None` means "use the config file's value".
    pub fn resolve_socket_path(&self) -> Option<PathBuf> {
        self.socket_path
            .clone()
            .or_else(|| std::env::var_os("BRIDGE_SOCKET_PATH").map(PathBuf::from))
    }

    /// Resolve the plaintext admin token override: CLI flag, then
    /// `BRIDGE_ADMIN_TOKEN`.
    pub fn resolve_admin_token(&self) -> Option<String> {
        self.admin_token.clone().or_else(|| std::env::var("BRIDGE_ADMIN_TOKEN").ok())
    }
}
