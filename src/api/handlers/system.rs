//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
///
/// `status` is `"healthy"` while the bus subscription is live and
/// `"partitioned"` while the supervisor is resubscribing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `"healthy"` or `"partitioned"`.
    pub status: String,
    /// Process identity.
    pub instance_id: String,
    /// Pub/sub channel name.
    pub topic: String,
    /// Whether the bus subscription is live.
    pub subscribed: bool,
    /// Connections held by this instance.
    pub connections: usize,
    /// Messages relayed from the bus since start.
    pub messages_relayed: u64,
    /// Subscriptions established since start.
    pub subscriptions: u64,
    /// Failed subscribe attempts since the last success.
    pub consecutive_failures: u32,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
}

/// `GET /health`: Service health and fan-out status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns subscription state, local connection count, and relay counters.",
    responses(
        (status = 200, description = "Subscribed to the bus", body = HealthResponse),
        (status = 503, description = "Partitioned from the bus", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let subscribed = state.status.is_subscribed();
    let code = if subscribed {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(HealthResponse {
            status: if subscribed { "healthy" } else { "partitioned" }.to_string(),
            instance_id: state.instance_id.to_string(),
            topic: state.bus.topic().to_string(),
            subscribed,
            connections: state.registry.len(),
            messages_relayed: state.status.messages_relayed(),
            subscriptions: state.status.subscriptions(),
            consecutive_failures: state.status.consecutive_failures(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::api::build_app;
    use crate::bus::{DistributionBus, InMemoryBroker, Topic};
    use crate::domain::{Connection, ConnectionRegistry};
    use crate::service::{BackoffPolicy, SubscriptionStatus, Supervisor};

    fn state() -> AppState {
        let bus: Arc<dyn DistributionBus> =
            Arc::new(InMemoryBroker::new(Topic::new("health"), 8).connect());
        AppState {
            instance_id: uuid::Uuid::new_v4(),
            registry: Arc::new(ConnectionRegistry::new()),
            bus,
            status: Arc::new(SubscriptionStatus::new()),
            connection: crate::app_state::ConnectionSettings::default(),
        }
    }

    async fn get_health(state: AppState) -> (StatusCode, HealthResponse) {
        let app = build_app(state, Duration::from_secs(5));
        let Ok(request) = Request::builder().uri("/health").body(Body::empty()) else {
            panic!("request");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("health request failed");
        };
        let status = response.status();
        let Ok(body) = axum::body::to_bytes(response.into_body(), 64 * 1024).await else {
            panic!("body");
        };
        let Ok(health) = serde_json::from_slice::<HealthResponse>(&body) else {
            panic!("health body is not JSON");
        };
        (status, health)
    }

    #[tokio::test]
    async fn unsubscribed_instance_reports_partitioned() {
        let (code, health) = get_health(state()).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(health.status, "partitioned");
        assert!(!health.subscribed);
        assert_eq!(health.topic, "health");
    }

    #[tokio::test]
    async fn subscribed_instance_reports_healthy() {
        let state = state();
        let (conn, _endpoint) = Connection::open(4);
        state.registry.add(conn);

        let supervisor = Supervisor::new(
            Arc::clone(&state.bus),
            Arc::clone(&state.registry),
            Arc::clone(&state.status),
            BackoffPolicy::default(),
        );
        let task = tokio::spawn(supervisor.run());
        let status = Arc::clone(&state.status);
        let subscribed = tokio::time::timeout(Duration::from_secs(2), async move {
            while !status.is_subscribed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(subscribed.is_ok());

        let (code, health) = get_health(state).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.connections, 1);
        assert_eq!(health.subscriptions, 1);
        task.abort();
    }
}
