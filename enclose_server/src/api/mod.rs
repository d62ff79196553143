//! HTTP/WebSocket API for the game server.
//!
//! # Architecture
//!
//! The API is built with:
//! - **Axum**: Async web framework for the WebSocket upgrade
//! - **Tower**: Middleware for CORS, request ids and admission limiting
//! - **Hub**: Matchmaking and session registry from the `enclose` crate
//!
//! # Modules
//!
//! - [`websocket`]: The game connection: admission, read loop, cleanup
//! - [`middleware`]: Per-address admission limit on `/ws`
//! - [`rate_limiter`]: Fixed-window counters behind the middleware
//! - [`request_id`]: Request ids and access log
//!
//! # Endpoints
//!
//! - `GET /ws` - Establish a game connection (WebSocket upgrade)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use enclose::Hub;
//! use enclose_server::api::{AppState, create_router, rate_limiter::AdmissionLimiter};
//! use enclose_server::config::TransportConfig;
//! use std::{net::SocketAddr, sync::Arc};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let state = AppState::new(
//!     Arc::new(Hub::default()),
//!     Arc::new(AdmissionLimiter::default()),
//!     TransportConfig::default(),
//!     shutdown_rx,
//! );
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! Upgrade requests are accepted from any origin.

pub mod middleware;
pub mod rate_limiter;
pub mod request_id;
pub mod websocket;

use axum::{Router, routing::get};
use enclose::Hub;
use std::sync::{Arc, atomic::AtomicUsize};
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use crate::config::TransportConfig;
use rate_limiter::AdmissionLimiter;

/// Application state shared across the WebSocket endpoint and middleware.
///
/// Cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub limiter: Arc<AdmissionLimiter>,
    pub transport: TransportConfig,
    /// Flips to `true` once shutdown has begun
    pub shutdown: watch::Receiver<bool>,
    /// Open game connections
    pub connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(
        hub: Arc<Hub>,
        limiter: Arc<AdmissionLimiter>,
        transport: TransportConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            hub,
            limiter,
            transport,
            shutdown,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow() || self.hub.is_closed()
    }
}

/// Create the API router.
///
/// Only matched `/ws` requests count against the admission limiter and must
/// complete their handshake within the read timeout. Every request gets a
/// request id and an access log entry. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the limiter sees
/// real client addresses.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::websocket_handler))
        .route_layer(TimeoutLayer::new(state.transport.read_timeout))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admission_rate_limit,
        ))
        .layer(axum::middleware::from_fn(request_id::access_log))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
