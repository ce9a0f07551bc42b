//! # bridge-daemon — entry point
//!
//! Startup order (spec.md §4.7): parse CLI -> configure logging -> load
//! config -> build shared state -> hand off to the lifecycle supervisor,
//! which binds the stream listener and the HTTP control plane and runs
//! until a termination signal.

use anyhow::Result;
use bridge_daemon::{cli::Args, logging::ColorizedFormatter, state::BridgeState, Config};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, prelude::*, Layer};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let guard;
    let detailed_log_layer;

    if let Some("stderr") = args.log_file.as_deref() {
        detailed_log_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(log_level)
            .boxed();
        guard = None;
    } else {
        let path_str = args.log_file.as_deref().unwrap_or("bridge_daemon.log");
        let log_path = std::path::Path::new(path_str);
        let log_dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let log_filename = log_path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("bridge_daemon.log"));
        let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
        let (non_blocking_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        detailed_log_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_filter(log_level)
            .boxed();
        guard = Some(file_guard);
    }

    let stdout_log = if !args.quiet {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .event_format(ColorizedFormatter)
                .with_filter(log_level),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(detailed_log_layer)
        .with(stdout_log)
        .init();

    let _log_guard = guard;

    info!("starting bridge-daemon");

    let config_path = args.resolve_config_path();
    let config = Config::load(&config_path)?
        .with_overrides(args.resolve_socket_path(), args.resolve_admin_token());

    if config.admin_token_hash.is_none() {
        tracing::warn!("no admin token configured; the HTTP control plane is fully locked out");
    }

    let state = BridgeState::new(Arc::new(config));

    bridge_daemon::lifecycle::run(state).await?;

    info!("bridge-daemon exited cleanly");
    Ok(())
}
