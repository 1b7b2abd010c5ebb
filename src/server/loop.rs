// Server loop module
// Accepts connections until shutdown is requested, then drains in-flight ones

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Accept connections on `listener` until `shutdown` is notified.
///
/// After shutdown is requested no new connections are accepted; open ones get
/// up to `upstream.timeout_secs + 1` seconds to finish their current request.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> std::io::Result<()> {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            &graceful,
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown.notified() => {
                logger::log_shutdown_started();
                break;
            }
        }
    }

    drop(listener);

    let grace = Duration::from_secs(state.config.upstream.timeout_secs + 1);
    tokio::select! {
        () = graceful.shutdown() => {
            logger::log_debug("[Shutdown] All connections closed");
        }
        () = tokio::time::sleep(grace) => {
            logger::log_warning(&format!(
                "[Shutdown] {} connection(s) still open after {}s, closing anyway",
                active_connections.load(Ordering::SeqCst),
                grace.as_secs()
            ));
        }
    }

    Ok(())
}
