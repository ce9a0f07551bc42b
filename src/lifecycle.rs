//! # Lifecycle supervisor
//!
//! Owns startup order (config already loaded by the caller; this module
//! picks up from runtime-dir creation and socket binding), graceful
//! shutdown on signal, and the bounded grace window before exit
//! (spec.md §4.7).

use crate::listener;
use crate::state::BridgeState;
use std::sync::Arc;
use std::time::Duration;

/// Grace window given to in-flight work after a shutdown signal before the
/// process exits unconditionally (spec.md §4.7: "e.g. 1.5s").
const SHUTDOWN_GRACE: Duration = Duration::from_millis(1500);

pub async fn run(state: Arc<BridgeState>) -> anyhow::Result<()> {
    let listener = listener::bind(&state)?;
    state.events.info(
        "listener_bound",
        format!("listening on {}", state.config.socket_path.display()),
    );

    let http_router = crate::http::build_router(state.clone());
    let http_addr: std::net::SocketAddr =
        format!("{}:{}", state.config.http_host, state.config.http_port).parse()?;
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    state
        .events
        .info("http_bound", format!("HTTP control plane listening on {http_addr}"));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let stream_task = tokio::spawn(listener::serve(listener, state.clone(), shutdown_rx));

    let http_shutdown_state = state.clone();
    let http_task = tokio::spawn(async move {
        let result = axum::serve(http_listener, http_router)
            .with_graceful_shutdown(wait_for_signal())
            .await;
        if let Err(e) = result {
            http_shutdown_state
                .events
                .error("http_server_failed", format!("{e}"));
        }
    });

    wait_for_signal().await;
    state.events.warn("shutdown_signal", "shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = std::fs::remove_file(&state.config.socket_path);

    let grace = tokio::time::sleep(SHUTDOWN_GRACE);
    tokio::select! {
        _ = stream_task => {}
        _ = grace => {
            state.events.warn("shutdown_grace_expired", "stream listener did not stop in time");
        }
    }
    let _ = http_task.await;

    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
