// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Spawn a task that notifies `shutdown` once on SIGINT/SIGTERM.
///
/// Uses `notify_one`, so a signal arriving before the server loop waits is not lost.
pub fn start_signal_handler(shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        let signal_name = wait_for_signal().await;
        logger::log_info(&format!(
            "\n[SIGNAL] {signal_name} received, initiating graceful shutdown..."
        ));
        shutdown.notify_one();
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            logger::log_warning(&format!(
                "Failed to register SIGTERM handler, only Ctrl+C will stop the server: {e}"
            ));
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        name = wait_for_ctrl_c() => name,
    }
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(e) => {
            logger::log_warning(&format!("Failed to listen for Ctrl+C: {e}"));
            std::future::pending().await
        }
    }
}
