//! Request handler.
//!
//! Every request goes through [`serve`]: the host is picked from the `Host`
//! header and path, the host does its blocking filesystem work on the
//! blocking pool, and the [`Outcome`] is turned into a response.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use lumen_site::{Outcome, RequestContext};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::ServerError;
use crate::state::AppState;
use crate::table::Route;

pub(crate) async fn serve(State(state): State<Arc<AppState>>, request: Request) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
            "Method not allowed",
        )
            .into_response();
    }

    let hostname = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default()
        .to_owned();
    let path = request.uri().path().to_owned();

    let host = match state.table().route(&hostname, &path) {
        Some(Route::Host(host)) => host,
        Some(Route::Failed(name)) => {
            tracing::warn!(host = %name, path = %path, "Host failed to load");
            return unavailable();
        }
        None => {
            tracing::warn!(host = %hostname, path = %path, "No host for request");
            return not_found();
        }
    };

    let ctx = RequestContext::new(path);
    let outcome = match tokio::task::spawn_blocking(move || host.serve(&ctx)).await {
        Ok(outcome) => outcome,
        Err(e) => return ServerError::from(e).into_response(),
    };

    match outcome {
        Outcome::Static(file) => serve_file(file, request).await,
        Outcome::Redirect(location) => {
            redirect(&location).unwrap_or_else(IntoResponse::into_response)
        }
        Outcome::Page(html) => Html(html).into_response(),
        Outcome::NotFound => not_found(),
        Outcome::Error(message) => (StatusCode::INTERNAL_SERVER_ERROR, message).into_response(),
        Outcome::Unavailable => unavailable(),
    }
}

async fn serve_file(file: PathBuf, request: Request) -> Response {
    let result: Result<_, Infallible> = ServeFile::new(file).oneshot(request).await;
    match result {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

fn redirect(location: &str) -> Result<Response, ServerError> {
    Ok(Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(header::LOCATION, location)
        .body(Body::empty())?)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable").into_response()
}
