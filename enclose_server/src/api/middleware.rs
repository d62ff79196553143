//! Admission middleware for the WebSocket endpoint.
//!
//! Counts every request to `/ws` against its source address before the
//! upgrade handler runs. Requests over the limit never reach the hub.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get, middleware};
//! # use enclose_server::api::middleware::admission_rate_limit;
//! # use enclose_server::api::AppState;
//! # async fn handler() {}
//! # let state: AppState = unimplemented!();
//!
//! let routes: Router<AppState> = Router::new()
//!     .route("/ws", get(handler))
//!     .layer(middleware::from_fn_with_state(state.clone(), admission_rate_limit));
//! # let _ = routes;
//! ```

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::AppState;
use crate::{logging, metrics};

/// Body of the response sent to a rate-limited client
pub const TOO_MANY_REQUESTS: &str = "Too many requests";

/// Source address of a request, taken from the listener's connection info.
///
/// Routers served without connect info (in-process tests) report the
/// unspecified address, so all such requests share one counter.
pub fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Rate-limit middleware for admissions.
///
/// # Behavior
///
/// - **Within limit**: Calls next handler
/// - **Over limit**: Returns `429 Too Many Requests` with body `Too many requests`
pub async fn admission_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    if !state.limiter.check(ip).await {
        logging::log_admission_refused("rate_limited", ip, TOO_MANY_REQUESTS);
        metrics::rate_limit_hits_total(request.uri().path());
        return (StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS).into_response();
    }

    next.run(request).await
}
