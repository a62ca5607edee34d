//! HTTP layer: REST handlers, the WebSocket route, and router composition.
//!
//! REST endpoints live under `/api/v1`; `/health` and `/ws` are mounted at
//! the root.

pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "fanout-gateway", description = "Distributed WebSocket broadcast gateway"),
    paths(handlers::system::health_handler, handlers::messages::publish_handler),
    components(schemas(handlers::system::HealthResponse)),
    tags(
        (name = "System", description = "Health and status"),
        (name = "Messages", description = "Message injection"),
    )
)]
pub struct ApiDoc;

/// Builds the REST router. `request_timeout` bounds each REST request; it
/// does not apply to WebSocket sessions.
pub fn build_router(request_timeout: Duration) -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
        .layer(TimeoutLayer::new(request_timeout))
}

/// Builds the complete application: REST routes, `/ws`, tracing and CORS.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        .merge(build_router(request_timeout))
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
