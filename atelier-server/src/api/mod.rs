//! API Module
//!
//! HTTP API layer for the server.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let images = ServeDir::new(state.images_dir.clone());

    Router::new()
        // Service info and health
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        // Submission endpoints
        .route("/submit", post(job::submit))
        .route("/batch_submit", post(job::batch_submit))
        // Status and results
        .route("/status/{id}", get(job::get_status))
        .route("/download/{id}", get(job::download))
        .nest_service("/images", images)
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{state_with_pipeline, state_without_pipeline};
    use atelier_core::domain::request::GenerationRequest;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_pending_job() {
        let (state, _receiver) = state_with_pipeline();
        let router = create_router(state.clone());

        let (status, body) = send(router, post_json("/submit", r#"{"prompt": "a cat"}"#)).await;
        assert_eq!(status, StatusCode::OK);

        let body = json(&body);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["estimated_time"], 15);
        let id = body["requestId"].as_str().unwrap().to_string();

        let (status, body) = send(create_router(state), get(&format!("/status/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["requestId"], id.as_str());
        assert_eq!(body["progress"], 0);
        assert_eq!(body["error"], "");
    }

    #[tokio::test]
    async fn test_invalid_request_is_bad_request() {
        let (state, _receiver) = state_with_pipeline();
        let payload = r#"{"prompt": "a cat", "num_inference_steps": 0}"#;

        let (status, body) = send(create_router(state.clone()), post_json("/submit", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json(&body)["error"].as_str().unwrap().contains("num_inference_steps"));
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn test_submit_without_pipeline_is_unavailable() {
        let (state, _receiver) = state_without_pipeline();
        let (status, body) =
            send(create_router(state), post_json("/submit", r#"{"prompt": "a cat"}"#)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json(&body)["error"], "Pipeline not ready");
    }

    #[tokio::test]
    async fn test_unknown_status_is_not_found() {
        let (state, _receiver) = state_with_pipeline();
        let (status, _) = send(create_router(state.clone()), get("/status/img_nope")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn test_batch_submit() {
        let (state, _receiver) = state_with_pipeline();
        let payload = r#"{"requests": [{"prompt": "one"}, {"prompt": "two", "resolution": "2048x2048"}]}"#;

        let (status, body) = send(create_router(state.clone()), post_json("/batch_submit", payload)).await;
        assert_eq!(status, StatusCode::OK);

        let body = json(&body);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["estimated_time"], 30);
        assert_eq!(state.store.len(), 2);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _receiver) = state_without_pipeline();
        let (status, body) = send(create_router(state), get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["pipeline_ready"], false);
        assert_eq!(body["total_tasks"], 0);
    }

    #[tokio::test]
    async fn test_download_and_static_images() {
        let (state, _receiver) = state_with_pipeline();
        let id = "img_0000000000000001";
        state.store.create(id, GenerationRequest::new("p")).unwrap();

        let (status, _) = send(create_router(state.clone()), get(&format!("/download/{}", id))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let job_dir = state.images_dir.join(id);
        std::fs::create_dir_all(&job_dir).unwrap();
        std::fs::write(job_dir.join("0.jpg"), b"jpeg-bytes").unwrap();
        state
            .store
            .update(id, |job| {
                job.start();
                job.complete(vec![format!("http://localhost:8088/images/{}/0.jpg", id)], 2.0)
            })
            .unwrap();

        let response = create_router(state.clone())
            .oneshot(get(&format!("/download/{}?image_index=0", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

        let (status, _) = send(
            create_router(state.clone()),
            get(&format!("/download/{}?image_index=3", id)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(create_router(state), get(&format!("/images/{}/0.jpg", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"jpeg-bytes");
    }
}
