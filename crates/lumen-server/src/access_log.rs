//! Access log middleware.
//!
//! Emits one line per request at target `lumen::access`:
//!
//! ```text
//! 203.0.113.7 - - [02/Jan/2006:15:04:05 -0700] "GET /docs/ HTTP/1.1" 200 1234
//! ```
//!
//! The size is `-1` when the response length is not known up front.

use std::net::SocketAddr;

use axum::body::HttpBody;
use axum::extract::{ConnectInfo, Request};
use axum::http::{Method, StatusCode, Uri, Version, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Local, TimeZone};

/// Tracing target of access log lines.
pub const ACCESS_TARGET: &str = "lumen::access";

pub(crate) async fn access_log(request: Request, next: Next) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "-".to_owned(), |ConnectInfo(addr)| addr.ip().to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();

    let response = next.run(request).await;

    let line = format_line(
        &remote,
        &Local::now(),
        &method,
        &uri,
        version,
        response.status(),
        response_size(&response),
    );
    tracing::info!(target: ACCESS_TARGET, "{line}");
    response
}

/// Body length from `Content-Length`, or from an exact body size hint.
fn response_size(response: &Response) -> i64 {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .or_else(|| {
            response
                .body()
                .size_hint()
                .exact()
                .and_then(|n| i64::try_from(n).ok())
        })
        .unwrap_or(-1)
}

/// Render one access log line.
pub fn format_line<Tz: TimeZone>(
    remote: &str,
    time: &DateTime<Tz>,
    method: &Method,
    uri: &Uri,
    version: Version,
    status: StatusCode,
    size: i64,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{remote} - - [{}] \"{method} {uri} {version:?}\" {} {size}",
        time.format("%d/%b/%Y:%H:%M:%S %z"),
        status.as_u16(),
    )
}
