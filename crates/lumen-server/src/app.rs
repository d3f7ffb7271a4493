//! Router construction.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::HeaderName;
use axum::middleware;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::access_log::access_log;
use crate::handler;
use crate::state::AppState;

/// Create the application router.
///
/// All paths go to a single fallback handler: which host answers depends on
/// the `Host` header as much as on the path.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handler::serve)
        .with_state(state)
        .layer(content_type_options_layer())
        .layer(middleware::from_fn(access_log))
}

/// Layer that adds `X-Content-Type-Options: nosniff`.
fn content_type_options_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    )
}
