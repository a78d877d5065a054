//! # huddle-api
//!
//! HTTP layer for Huddle. Handlers authenticate the caller, resolve their
//! membership and hand off to the services, which own the gate, write and
//! publish sequence for every mutation.

pub mod middleware;
pub mod routes;
pub mod services;

use axum::Router;
use huddle_common::config::LimitsConfig;
use huddle_db::Database;
use huddle_gateway::hub::BroadcastHub;
use std::sync::Arc;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Realtime fan-out. Message mutations publish here after they are stored.
    pub hub: BroadcastHub,
    /// HS256 secret shared with the identity provider.
    pub jwt_secret: String,
    pub limits: LimitsConfig,
}

/// Build the `/api` router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let protected = Router::new()
        .merge(routes::servers::router())
        .merge(routes::channels::router())
        .merge(routes::members::router())
        .merge(routes::messages::router())
        .merge(routes::conversations::router())
        .merge(routes::direct_messages::router())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let api_routes = Router::new()
        .merge(protected)
        .merge(routes::health::router());

    Router::new()
        .nest("/api", api_routes)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .with_state(state)
}
