//! HTTP server for Lumen.
//!
//! Serves every configured virtual host from one listener:
//!
//! - the `Host` header and request path pick a [`lumen_site::Host`] by
//!   longest key prefix, falling back to the `default` host;
//! - the host's blocking filesystem work runs on the blocking pool;
//! - webroot files are served through `tower-http`, pages as HTML;
//! - a host that failed to load or reload answers 503;
//! - each request is logged in common log format at target `lumen::access`.
//!
//! With `watch.enabled`, a [`ReloadManager`] task rebuilds the host table when
//! the settings file changes and reloads a host when its `site.yaml` or
//! templates change.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use lumen_config::Settings;
//! use lumen_server::run_server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load(Path::new("settings.yaml"), None)?;
//!     run_server(settings).await?;
//!     Ok(())
//! }
//! ```

mod access_log;
mod app;
mod error;
mod handler;
mod reload;
mod state;
mod table;

use std::net::SocketAddr;
use std::sync::Arc;

use lumen_config::Settings;

pub use access_log::{ACCESS_TARGET, format_line};
pub use app::create_router;
pub use error::ServerError;
pub use reload::ReloadManager;
pub use state::AppState;
pub use table::{HostTable, Route, route_key, strip_port};

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the watcher cannot be
/// started.
pub async fn run_server(settings: Settings) -> Result<(), ServerError> {
    let (settings, table) = tokio::task::spawn_blocking(move || {
        let table = HostTable::build(&settings);
        (settings, table)
    })
    .await?;
    tracing::info!(hosts = table.len(), "Hosts loaded");
    let state = Arc::new(AppState::new(table));

    let _reload = if settings.watch.enabled {
        Some(ReloadManager::start(Arc::clone(&state), &settings)?)
    } else {
        None
    };

    let app = create_router(state);

    let address = format!("{}:{}", settings.server.bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %listener.local_addr()?, "Starting server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
