//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/lessons", get(http::http_get_lessons))
        .route("/api/v1/lesson", get(http::http_get_lesson))
        .route("/api/v1/check", post(http::http_post_check))
        .route("/api/v1/advance", post(http::http_post_advance))
        .route("/api/v1/reset_stage", post(http::http_post_reset_stage))
        .route("/api/v1/restart", post(http::http_post_restart))
        .route("/api/v1/progress", get(http::http_get_progress))
        .route("/api/v1/select", post(http::http_post_select))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::engine::hints::KeywordNudge;
    use crate::seeds::seed_lessons;
    use crate::store::MemoryStore;

    fn app() -> Router {
        let state = AppState::from_parts(seed_lessons(), Arc::new(MemoryStore::new()), Arc::new(KeywordNudge));
        build_router(Arc::new(state))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_req(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_and_lesson_list() {
        let app = app();
        let (status, body) = send(&app, get_req("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (_, body) = send(&app, get_req("/api/v1/lessons")).await;
        let lessons = body.as_array().unwrap();
        assert_eq!(lessons.len(), 6);
        assert_eq!(lessons[0]["id"], "lesson-1");
        assert_eq!(lessons[0]["locked"], false);
        assert_eq!(lessons[1]["locked"], true);
    }

    #[tokio::test]
    async fn unknown_lesson_is_not_found() {
        let app = app();
        let (status, body) = send(&app, get_req("/api/v1/lesson?lessonId=missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn failed_attempts_escalate_hints_and_unlock_preview() {
        let app = app();
        let wrong = json!({ "lessonId": "lesson-1", "code": "cout << \"Bye\";" });

        let (_, body) = send(&app, post_req("/api/v1/check", wrong.clone())).await;
        assert_eq!(body["feedback"]["kind"], "error");
        assert_eq!(body["feedback"]["tier"], "nudge");
        assert_eq!(body["attempts"], 1);

        let (_, body) = send(&app, post_req("/api/v1/check", wrong.clone())).await;
        assert_eq!(body["feedback"]["tier"], "authored");

        let (_, body) = send(&app, post_req("/api/v1/check", wrong)).await;
        assert_eq!(body["preview_unlocked"], true);

        let (_, view) = send(&app, get_req("/api/v1/lesson?lessonId=lesson-1")).await;
        assert_eq!(view["status"], "failure");
        assert_eq!(view["preview_code"], "cout << \"Hello World\";");
    }

    #[tokio::test]
    async fn advance_requires_a_passed_stage() {
        let app = app();
        let (status, _) = send(&app, post_req("/api/v1/advance", json!({ "lessonId": "lesson-1" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn finishing_a_lesson_unlocks_the_next() {
        let app = app();
        let answers = [
            "cout << \"Hello World\";",
            "cout << \"C++\\n\";",
            "cout << \"Level\" << \"Up\";",
        ];
        let mut last = Value::Null;
        for code in answers {
            let (_, body) = send(&app, post_req("/api/v1/check", json!({ "lessonId": "lesson-1", "code": code }))).await;
            assert_eq!(body["feedback"]["kind"], "success", "{code}");
            let (status, body) = send(&app, post_req("/api/v1/advance", json!({ "lessonId": "lesson-1" }))).await;
            assert_eq!(status, StatusCode::OK);
            last = body;
        }
        assert_eq!(last["lesson_complete"], true);
        assert_eq!(last["course"]["progress"]["unlocked_lesson"], 1);

        let (status, body) = send(&app, post_req("/api/v1/select", json!({ "index": 1 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_lesson"], 1);

        let (status, _) = send(&app, post_req("/api/v1/select", json!({ "index": 3 }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn reset_stage_returns_the_rendered_template() {
        let app = app();
        let (status, body) = send(&app, post_req("/api/v1/reset_stage", json!({ "lessonId": "lesson-1" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["code"].as_str().unwrap().contains("// Output: Hello World"));
    }
}
