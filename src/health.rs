//! Health route
//!
//! Hosting platforms poll `GET /` on the configured port to decide whether
//! the service is up. In webhook mode the route shares the server with
//! teloxide's webhook endpoint; in long-polling mode it is served alone.

use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::io;
use tokio::net::TcpListener;
use tracing::info;

/// Body returned by the health route
pub const HEALTH_TEXT: &str = "Bot is running!";

/// Router with the `GET /` health route
#[must_use]
pub fn router() -> Router {
    Router::new().route("/", get(index))
}

async fn index() -> &'static str {
    HEALTH_TEXT
}

/// Serves `app` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an I/O error if the server fails while accepting connections.
pub async fn serve<S>(listener: TcpListener, app: Router, shutdown: S) -> io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP server listening on {addr}.");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
