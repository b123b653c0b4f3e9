use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::Router;
use metadata_store::MetadataStore;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::dispatch::PrefixDispatcher;
use crate::handlers;
use crate::state::AppState;

#[derive(Clone)]
struct Routed {
    state: AppState,
    dispatcher: Arc<PrefixDispatcher>,
}

pub fn build_app(store: Arc<dyn MetadataStore>) -> Router {
    let mut dispatcher = PrefixDispatcher::new();
    dispatcher.register(
        Method::GET,
        "/monitoredResource/",
        Arc::new(|state: AppState, alias: String| Box::pin(handlers::get_monitored_resource(state, alias))),
    );

    let routed = Routed { state: AppState { store }, dispatcher: Arc::new(dispatcher) };

    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(routed)
}

async fn dispatch(State(routed): State<Routed>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match routed.dispatcher.dispatch(&method, &path) {
        Some((handler, rest)) => handler(routed.state.clone(), rest.to_string()).await,
        None => not_found(),
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "status_code": 404, "error": "Not found" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use chrono::Duration;
    use metadata_domain::MonitoredResource;
    use metadata_store::InMemoryMetadataStore;
    use tower::util::ServiceExt;

    fn test_app() -> (Router, Arc<dyn MetadataStore>) {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new(Duration::seconds(3600)));
        (build_app(store.clone()), store)
    }

    #[tokio::test]
    async fn known_alias_returns_200_with_resource_body() {
        let (app, store) = test_app();
        let resource =
            MonitoredResource::new("gce_instance", [("instance_id".to_string(), "42".to_string())]).unwrap();
        store.update_resource(&["i-42".to_string()], resource).await.unwrap();

        let resp = app
            .oneshot(HttpRequest::builder().uri("/monitoredResource/i-42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_alias_returns_404_with_documented_body() {
        let (app, _store) = test_app();
        let resp = app
            .oneshot(HttpRequest::builder().uri("/monitoredResource/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "status_code": 404, "error": "Not found" }));
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (app, _store) = test_app();
        let resp = app
            .oneshot(HttpRequest::builder().uri("/nonexistent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_method_returns_404_not_405() {
        let (app, _store) = test_app();
        let resp = app
            .oneshot(
                HttpRequest::builder()
                    .method(Method::POST)
                    .uri("/monitoredResource/i-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
