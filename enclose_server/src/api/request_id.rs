//! Access log with request ids.
//!
//! Each request carries an id, either the caller's `x-request-id` or a fresh
//! uuid. The id is echoed on the response, handed to handlers through the
//! [`RequestId`] extractor, and written on the single access log line emitted
//! once the response is ready. For `/ws` that line marks the end of the
//! handshake; the game connection itself is logged by the socket handler.

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderMap, HeaderValue, StatusCode, request::Parts},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

use super::middleware::client_ip;
use crate::logging;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Id assigned to the current request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Take the caller's id when it is non-empty visible ASCII, else mint one.
    fn resolve(headers: &HeaderMap) -> Self {
        let supplied = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|id| !id.is_empty());

        match supplied {
            Some(id) => Self(id.to_owned()),
            None => Self(Uuid::new_v4().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Tag the request with an id and write one access log line per request.
pub async fn access_log(mut request: Request, next: Next) -> Response {
    let started = Instant::now();
    let id = RequestId::resolve(request.headers());
    let remote = client_ip(&request);
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    request.extensions_mut().insert(id.clone());
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status();
    let elapsed = started.elapsed();
    tracing::info!(
        request_id = id.as_str(),
        %remote,
        %method,
        path = path.as_str(),
        status = status.as_u16(),
        upgraded = status == StatusCode::SWITCHING_PROTOCOLS,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "Access"
    );
    logging::log_timing("http_request", elapsed, Some(&path));

    response
}

impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Request id missing"))
    }
}
