pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::screening::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/keywords", post(handlers::handle_generate_keywords))
        .route(
            "/api/v1/screenings",
            post(handlers::handle_start_screening).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/screenings/:id", get(handlers::handle_get_screening))
        .route(
            "/api/v1/screenings/:id/ranked",
            get(handlers::handle_get_ranked),
        )
        .route(
            "/api/v1/screenings/:id/cancel",
            post(handlers::handle_cancel_screening),
        )
        .route(
            "/api/v1/screenings/:id/export",
            get(handlers::handle_export_screening),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, ScreeningSettings};
    use crate::llm_client::Provider;
    use crate::screening::models::Decision;
    use crate::screening::results::ResultsAccumulator;
    use crate::screening::testing::{verdict, Reply, ScriptedModel};

    const BOUNDARY: &str = "screener-test-boundary";

    fn test_config() -> Config {
        Config {
            provider: Provider::Anthropic,
            api_key: "test-key".to_string(),
            port: 0,
            rust_log: "info".to_string(),
            screening: ScreeningSettings::default(),
            max_upload_bytes: 1024 * 1024,
        }
    }

    fn router_with(model: Arc<ScriptedModel>) -> Router {
        build_router(AppState::new(test_config(), model))
    }

    fn multipart_request(fields: &[(&str, &str)], files: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        for (filename, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/api/v1/screenings")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn wait_until_finished(router: &Router, batch_id: &str) -> Value {
        for _ in 0..200 {
            let response = router
                .clone()
                .oneshot(get(&format!("/api/v1/screenings/{batch_id}")))
                .await
                .unwrap();
            let snapshot = json_body(response).await;
            if snapshot["state"] != "running" {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch {batch_id} did not finish");
    }

    #[tokio::test]
    async fn test_health() {
        let response = router_with(Arc::new(ScriptedModel::new()))
            .oneshot(get("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_generate_keywords_merges_custom_and_caches() {
        let model = Arc::new(
            ScriptedModel::new().with_keywords(vec!["Python".into(), "Kubernetes".into()]),
        );
        let router = router_with(model.clone());
        let request = || {
            Request::builder()
                .method("POST")
                .uri("/api/v1/keywords")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"jd_text": "Platform engineer", "custom_keywords": "Go, python"})
                        .to_string(),
                ))
                .unwrap()
        };

        let first = json_body(router.clone().oneshot(request()).await.unwrap()).await;
        assert_eq!(first["keywords"], json!(["Go", "python", "Kubernetes"]));
        assert_eq!(first["ai_keywords"], json!(["Python", "Kubernetes"]));
        assert_eq!(first["cached"], false);

        let second = json_body(router.oneshot(request()).await.unwrap()).await;
        assert_eq!(second["cached"], true);
        assert_eq!(model.keyword_calls(), 1);
    }

    #[tokio::test]
    async fn test_screening_without_keywords_is_rejected() {
        let model = Arc::new(ScriptedModel::new());
        let response = router_with(model.clone())
            .oneshot(multipart_request(
                &[("jd_text", "Backend engineer"), ("use_ai_keywords", "false")],
                &[("alice.txt", "Python developer")],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "CONFIGURATION_ERROR");
        assert_eq!(model.evaluate_calls(), 0);
    }

    #[tokio::test]
    async fn test_screening_requires_files() {
        let response = router_with(Arc::new(ScriptedModel::new()))
            .oneshot(multipart_request(
                &[("jd_text", "Backend engineer"), ("keywords", "Python")],
                &[],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_screening_batch_end_to_end() {
        let bob = "Bob: Python, AWS and Docker in production";
        let model = Arc::new(
            ScriptedModel::new()
                .with_reply(bob, Reply::Verdict(verdict(Decision::Shortlisted, 92.0)))
                .with_default_reply(Reply::Verdict(verdict(Decision::NotShortlisted, 40.0))),
        );
        let router = router_with(model.clone());

        let response = router
            .clone()
            .oneshot(multipart_request(
                &[
                    ("jd_text", "Backend engineer with Python, AWS and Docker"),
                    ("keywords", "Python, AWS, Docker"),
                    ("use_ai_keywords", "false"),
                ],
                &[
                    ("alice.txt", "Alice: 5 years Python and Docker experience"),
                    ("bob.txt", bob),
                    ("carol.odt", "not a supported format"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let started = json_body(response).await;
        assert_eq!(started["total"], 3);
        let batch_id = started["batch_id"].as_str().unwrap().to_string();

        let snapshot = wait_until_finished(&router, &batch_id).await;
        assert_eq!(snapshot["state"], "completed");
        assert_eq!(snapshot["completed"], 3);

        let records = snapshot["records"].as_array().unwrap();
        let filenames: Vec<&str> = records.iter().map(|r| r["filename"].as_str().unwrap()).collect();
        assert_eq!(filenames, vec!["alice.txt", "bob.txt", "carol.odt"]);
        assert_eq!(records[0]["matches"]["match_score"], 66.67);
        assert_eq!(records[1]["verdict"]["decision"], "Shortlisted");
        assert_eq!(records[2]["status"], "failed");
        assert_eq!(snapshot["stats"]["shortlisted"], 1);
        assert_eq!(snapshot["stats"]["failed"], 1);
        assert_eq!(model.evaluate_calls(), 2);

        let ranked = json_body(
            router
                .clone()
                .oneshot(get(&format!("/api/v1/screenings/{batch_id}/ranked")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(ranked["records"][0]["filename"], "bob.txt");

        let export = router
            .oneshot(get(&format!("/api/v1/screenings/{batch_id}/export")))
            .await
            .unwrap();
        assert_eq!(export.status(), StatusCode::OK);
        assert_eq!(
            export.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"resume_screening_results.csv\""
        );
        let csv = to_bytes(export.into_body(), 1024 * 1024).await.unwrap();
        let csv = String::from_utf8(csv.to_vec()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("alice.txt,Not Shortlisted,40.0,66.67,Python; Docker,AWS,"));
        assert!(lines[3].starts_with("carol.odt,Error,,,"));
    }

    #[tokio::test]
    async fn test_unknown_batch_returns_not_found() {
        let router = router_with(Arc::new(ScriptedModel::new()));
        let id = uuid::Uuid::new_v4();

        let response = router
            .clone()
            .oneshot(get(&format!("/api/v1/screenings/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/screenings/{id}/cancel"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_expired_finished_batch_returns_not_found() {
        let mut config = test_config();
        config.screening.batch_retention = Duration::ZERO;
        let state = AppState::new(config, Arc::new(ScriptedModel::new()));
        let finished = state.batches.create(1);
        finished.finish(ResultsAccumulator::new());
        let running = state.batches.create(1);
        let router = build_router(state);

        let response = router
            .clone()
            .oneshot(get(&format!("/api/v1/screenings/{}", finished.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(get(&format!("/api/v1/screenings/{}", running.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_export_of_empty_batch_has_header() {
        let state = AppState::new(test_config(), Arc::new(ScriptedModel::new()));
        let entry = state.batches.create(0);
        let router = build_router(state);

        let export = router
            .oneshot(get(&format!("/api/v1/screenings/{}/export", entry.id)))
            .await
            .unwrap();
        assert_eq!(export.status(), StatusCode::OK);
        let csv = to_bytes(export.into_body(), 1024 * 1024).await.unwrap();
        let csv = String::from_utf8(csv.to_vec()).unwrap();
        assert!(csv.starts_with("filename,decision,overall_score,"));
        assert_eq!(csv.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_running_batch_is_accepted() {
        let state = AppState::new(test_config(), Arc::new(ScriptedModel::new()));
        let entry = state.batches.create(2);
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/screenings/{}/cancel", entry.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(entry.cancel_token().is_cancelled());
    }
}
