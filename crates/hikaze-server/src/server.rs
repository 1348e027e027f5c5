//! HTTP server implementation using Axum.

use crate::error::ApiError;
use crate::routes;
use axum::Router;
use hikaze_core::HikazeApi;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Application state shared across handlers.
pub struct AppState {
    pub api: HikazeApi,
}

/// Build the full router over `api`.
pub fn router(api: HikazeApi) -> Router {
    let state = Arc::new(AppState { api });

    // The UI is served from another origin during development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::router()
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::not_found("not found")
}

/// Bind `host:port`, moving up one port at a time when it is taken.
///
/// Port 0 asks the OS for any free port and is tried once.
pub async fn bind(host: &str, port: u16, tries: u16) -> anyhow::Result<TcpListener> {
    let tries = if port == 0 { 1 } else { tries.max(1) };
    let mut last_err = None;

    for offset in 0..tries {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                warn!("Port {} unavailable: {}", candidate, e);
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(e) => anyhow::Error::new(e).context(format!(
            "no free port in {}..{} on {}",
            port,
            port.saturating_add(tries),
            host
        )),
        None => anyhow::anyhow!("no port to try on {}", host),
    })
}

/// Start the HTTP server in the background.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    api: HikazeApi,
    host: &str,
    port: u16,
    tries: u16,
) -> anyhow::Result<SocketAddr> {
    let listener = bind(host, port, tries).await?;
    let actual_addr = listener.local_addr()?;
    let app = router(api);

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
