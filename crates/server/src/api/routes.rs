use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{agents, handlers, middleware::metrics_middleware, releases, settings, sources};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config and status
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/status", get(handlers::get_status))
        // Releases
        .route("/releases", get(releases::list_releases))
        .route(
            "/releases/{id}",
            get(releases::get_release).delete(releases::delete_release),
        )
        .route("/releases/{id}/upload", post(releases::retry_upload))
        // Agents
        .route(
            "/agents",
            get(agents::list_agents).post(agents::create_agent),
        )
        .route(
            "/agents/{id}",
            patch(agents::update_agent).delete(agents::delete_agent),
        )
        .route("/agents/{id}/enable", post(agents::enable_agent))
        .route("/agents/{id}/disable", post(agents::disable_agent))
        // Discovery sources
        .route(
            "/sources",
            get(sources::list_sources).post(sources::create_source),
        )
        .route("/sources/{id}", delete(sources::delete_source))
        .route("/sources/{id}/enable", post(sources::enable_source))
        .route("/sources/{id}/disable", post(sources::disable_source))
        // Runtime settings
        .route(
            "/settings/allocation-policy",
            get(settings::get_allocation_policy).put(settings::set_allocation_policy),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
