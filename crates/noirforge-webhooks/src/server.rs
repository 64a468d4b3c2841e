//! HTTP server setup and graceful shutdown.
//!
//! Every request goes through the same layers:
//! 1. Request ID generation (`X-Request-Id` on the response)
//! 2. Request/response tracing
//! 3. The ingestion handler, which answers `not_found` for anything other
//!    than `POST <path>`
//!
//! The caller binds the listener so it can report the bound address before
//! serving.

use std::{future::Future, sync::Arc};

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{error::GatewayError, handlers, Gateway};

/// Creates the router for one gateway.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use noirforge_webhooks::{create_router, Gateway, WebhookConfig};
///
/// let gateway = Gateway::new(WebhookConfig::default()).unwrap();
/// let app = create_router(Arc::new(gateway));
/// # drop(app);
/// ```
pub fn create_router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .fallback(handlers::ingest_webhook)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(gateway)
}

/// Adds an `X-Request-Id` header to every response.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Serves `gateway` on an already-bound listener until `shutdown` resolves.
///
/// In-flight requests finish before this returns.
///
/// # Errors
///
/// Returns `GatewayError::Io` if the listener fails.
pub async fn serve<F>(
    listener: TcpListener,
    gateway: Arc<Gateway>,
    shutdown: F,
) -> Result<(), GatewayError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(gateway);

    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight requests to complete");
}
