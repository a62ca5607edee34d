//! Message injection endpoint for backend services.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;

use crate::app_state::AppState;
use crate::domain::Message;
use crate::error::GatewayError;

/// `POST /api/v1/messages`: Publish the raw request body to every client.
///
/// The body goes through the bus exactly like a WebSocket frame, so every
/// instance (this one included) delivers it to its clients.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an empty body and
/// [`GatewayError::Bus`] if the bus rejects the publish.
#[utoipa::path(
    post,
    path = "/api/v1/messages",
    tag = "Messages",
    summary = "Broadcast a message",
    description = "Publishes the raw body to the shared topic. Delivery is best-effort.",
    request_body(content = String, description = "Opaque payload", content_type = "text/plain"),
    responses(
        (status = 202, description = "Handed to the bus"),
        (status = 400, description = "Empty body"),
        (status = 503, description = "Bus unavailable"),
    )
)]
pub async fn publish_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, GatewayError> {
    if body.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "message body must not be empty".to_string(),
        ));
    }
    state.bus.publish(Message::from(body)).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Message routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/messages", post(publish_handler))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use futures_util::StreamExt;
    use tower::ServiceExt;

    use super::*;
    use crate::api::build_app;
    use crate::app_state::ConnectionSettings;
    use crate::bus::{DistributionBus, InMemoryBroker, InMemoryBus, Topic};
    use crate::domain::ConnectionRegistry;
    use crate::service::SubscriptionStatus;

    fn state(bus: Arc<InMemoryBus>) -> AppState {
        AppState {
            instance_id: uuid::Uuid::new_v4(),
            registry: Arc::new(ConnectionRegistry::new()),
            bus,
            status: Arc::new(SubscriptionStatus::new()),
            connection: ConnectionSettings::default(),
        }
    }

    async fn post_message(state: AppState, body: &'static str) -> StatusCode {
        let app = build_app(state, Duration::from_secs(5));
        let Ok(request) = Request::builder()
            .method("POST")
            .uri("/api/v1/messages")
            .body(Body::from(body))
        else {
            panic!("request");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("publish request failed");
        };
        response.status()
    }

    #[tokio::test]
    async fn body_is_published_to_the_bus() {
        let bus = Arc::new(InMemoryBroker::new(Topic::default(), 8).connect());
        let Ok(mut stream) = bus.subscribe().await else {
            panic!("subscribe failed");
        };

        let code = post_message(state(Arc::clone(&bus)), "from-http").await;
        assert_eq!(code, StatusCode::ACCEPTED);

        let Ok(Some(message)) = tokio::time::timeout(Duration::from_secs(1), stream.next()).await
        else {
            panic!("nothing published");
        };
        assert_eq!(message.as_text(), Some("from-http"));
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let bus = Arc::new(InMemoryBroker::new(Topic::default(), 8).connect());
        assert_eq!(post_message(state(bus), "").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unavailable_bus_returns_503() {
        let bus = Arc::new(InMemoryBroker::new(Topic::default(), 8).connect());
        bus.set_available(false);
        assert_eq!(
            post_message(state(bus), "dropped").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
