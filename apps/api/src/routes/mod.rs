pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

/// Largest accepted upload, multipart framing included.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/ats/analyze", post(handlers::handle_analyze))
        .route("/api/v1/ats/analyze/fast", post(handlers::handle_analyze_fast))
        .route(
            "/api/v1/ats/progress/:session_id",
            get(handlers::handle_progress),
        )
        .route(
            "/api/v1/ats/progress/:session_id/stream",
            get(handlers::handle_progress_stream),
        )
        .route("/api/v1/ats/cache/stats", get(handlers::handle_cache_stats))
        .route("/api/v1/ats/cache", delete(handlers::handle_clear_cache))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use futures_util::StreamExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::PipelineLimits;
    use crate::pipeline::tests::{quick, service, RESUME};

    const BOUNDARY: &str = "ats-test-boundary";

    fn router(work: &std::path::Path) -> Router {
        let svc = service(
            work,
            quick("Claude Sonnet 4", 78),
            quick("GPT-4o", 82),
            PipelineLimits::default(),
        );
        build_router(AppState {
            service: Arc::new(svc),
        })
    }

    fn multipart(parts: &[(&str, Option<(&str, &str)>, &str)]) -> Body {
        let mut body = String::new();
        for (name, file, value) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file {
                Some((filename, content_type)) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: {content_type}\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Body::from(body)
    }

    fn upload(uri: &str, body: Body) -> Request<Body> {
        Request::post(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let work = tempfile::tempdir().unwrap();
        let response = router(work.path())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["service"], "ats-api");
    }

    #[tokio::test]
    async fn test_analyze_upload_end_to_end() {
        let work = tempfile::tempdir().unwrap();
        let app = router(work.path());

        let body = multipart(&[
            ("resume", Some(("cv.txt", "text/plain")), RESUME),
            ("industry", None, "technology"),
            ("role", None, "Senior"),
            ("sessionId", None, "router-1"),
        ]);
        let response = app
            .clone()
            .oneshot(upload("/api/v1/ats/analyze", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let value = json(response).await;
        assert_eq!(value["analysis"]["atsScore"], 80);
        assert_eq!(value["analysis"]["overallGrade"], "B");
        assert_eq!(value["analysis"]["industryBenchmark"]["industry"], "Technology");
        assert_eq!(value["sessionId"], "router-1");

        let progress = app
            .oneshot(
                Request::get("/api/v1/ats/progress/router-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(progress.status(), StatusCode::OK);
        assert_eq!(json(progress).await["status"], "completed");
    }

    #[tokio::test]
    async fn test_fast_route_forces_fast_mode() {
        let work = tempfile::tempdir().unwrap();
        let body = multipart(&[
            ("resume", Some(("cv.txt", "text/plain")), RESUME),
            ("mode", None, "comprehensive"),
        ]);
        let response = router(work.path())
            .oneshot(upload("/api/v1/ats/analyze/fast", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let value = json(response).await;
        assert_eq!(value["analysis"]["analysisMode"], "fast");
        assert_eq!(value["analysis"]["modelsUsed"][0], "GPT-4o (Fast Mode)");
    }

    #[tokio::test]
    async fn test_missing_file_is_rejected() {
        let work = tempfile::tempdir().unwrap();
        let body = multipart(&[("industry", None, "finance")]);
        let response = router(work.path())
            .oneshot(upload("/api/v1/ats/analyze", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unsupported_upload_is_415() {
        let work = tempfile::tempdir().unwrap();
        let body = multipart(&[("resume", Some(("cv.zip", "application/zip")), "PK")]);
        let response = router(work.path())
            .oneshot(upload("/api/v1/ats/analyze", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_unknown_progress_session_is_404() {
        let work = tempfile::tempdir().unwrap();
        let response = router(work.path())
            .oneshot(
                Request::get("/api/v1/ats/progress/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn router_with_service(work: &std::path::Path) -> (Router, Arc<crate::pipeline::AtsService>) {
        let svc = Arc::new(service(
            work,
            quick("Claude Sonnet 4", 78),
            quick("GPT-4o", 82),
            PipelineLimits::default(),
        ));
        let app = build_router(AppState {
            service: svc.clone(),
        });
        (app, svc)
    }

    fn stream_request(session_id: &str) -> Request<Body> {
        Request::get(format!("/api/v1/ats/progress/{session_id}/stream"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_progress_stream_opens_with_connected_frame() {
        let work = tempfile::tempdir().unwrap();
        let (app, svc) = router_with_service(work.path());
        svc.progress().init("live-1");

        let response = app.oneshot(stream_request("live-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/event-stream"
        );

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        let frame = String::from_utf8(first.to_vec()).unwrap();
        assert!(frame.starts_with("data: "));
        assert!(frame.contains(r#""type":"connected""#));

        svc.progress().update("live-1", 1, "Text extracted", None);
        let second = body.next().await.unwrap().unwrap();
        let frame = String::from_utf8(second.to_vec()).unwrap();
        assert!(frame.contains(r#""type":"progress""#));
        assert!(frame.contains(r#""progress":50"#));
    }

    #[tokio::test]
    async fn test_progress_stream_of_finished_session_ends_with_complete() {
        let work = tempfile::tempdir().unwrap();
        let (app, svc) = router_with_service(work.path());
        svc.progress().init("done-1");
        svc.progress()
            .complete("done-1", serde_json::json!({"analysis": {"atsScore": 80}}));

        let response = app.oneshot(stream_request("done-1")).await.unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let frames: Vec<&str> = text
            .split("\n\n")
            .filter(|frame| !frame.is_empty())
            .collect();

        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains(r#""type":"connected""#));
        assert!(frames[1].contains(r#""type":"complete""#));
        assert!(frames[1].contains(r#""atsScore":80"#));
    }

    #[tokio::test]
    async fn test_progress_stream_for_unknown_session_is_404() {
        let work = tempfile::tempdir().unwrap();
        let (app, _) = router_with_service(work.path());
        let response = app.oneshot(stream_request("nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cache_stats_and_clear() {
        let work = tempfile::tempdir().unwrap();
        let app = router(work.path());

        let stats = app
            .clone()
            .oneshot(
                Request::get("/api/v1/ats/cache/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(stats.status(), StatusCode::OK);
        let value = json(stats).await;
        assert_eq!(value["maxSize"], 100);
        assert_eq!(value["size"], 0);

        let cleared = app
            .oneshot(
                Request::delete("/api/v1/ats/cache")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(cleared.status(), StatusCode::NO_CONTENT);
    }
}
