#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **agentcore-gateway** – HTTP runtime gateway for the Agent Lifecycle &
//! Runtime Core.
//!
//! Admits live agent sessions over HTTP, mediates messages through the
//! permission resolver and the `generate-reply` hook, and fans out session
//! events over server-sent events. Grounded in
//! `toka-orchestration-service`'s axum `Router`/`ServiceBuilder` wiring and
//! `toka-collaborative-auth::service::AppState`'s shared-state-behind-`Arc`
//! shape, with the per-session listener set generalizing
//! `toka-orchestration::monitor::ProgressMonitor`'s fan-out.

mod error;
mod events;
mod handlers;
mod state;

pub use error::ApiError;
pub use events::{SessionEvent, SessionHub};
pub use state::GatewayState;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Build the `/runtime`-prefixed router for the gateway, wired to `state`.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/runtime/sessions", post(handlers::create_session).get(handlers::list_sessions))
        .route(
            "/runtime/sessions/:id",
            get(handlers::get_session).delete(handlers::terminate_session),
        )
        .route("/runtime/sessions/:id/message", post(handlers::send_message))
        .route("/runtime/sessions/:id/messages", get(handlers::list_messages))
        .route("/runtime/sessions/:id/stream", get(handlers::stream_session))
        .route("/runtime/spawn", post(handlers::spawn_sub_agent))
        .route("/runtime/hooks/inbound", post(handlers::inbound_hook))
        .route("/runtime/health", get(handlers::health))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
