#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures_util::FutureExt;
use promptfan_core::{
    GatewayConfig, LogRecord, PromptfanError, PromptfanResult, ProviderConfig,
};
use promptfan_engine::{BatchOrchestrator, ExecutionEngine};
use promptfan_gateway::GatewayServer;
use promptfan_providers::{Provider, ProviderRegistry};
use promptfan_sink::{DiscardSink, LogSink};
use std::sync::Arc;
use tower::ServiceExt;

/// Answers every call with the same result.
struct Echo {
    models: Vec<String>,
    fail: bool,
}

#[async_trait]
impl Provider for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn generate(&self, _prompt: &str, model: &str) -> PromptfanResult<String> {
        if self.fail {
            Err(PromptfanError::Generation("boom".into()))
        } else {
            Ok(format!("{model}: ok"))
        }
    }
}

struct DownSink;

#[async_trait]
impl LogSink for DownSink {
    fn name(&self) -> &str {
        "down"
    }

    async fn insert(&self, _record: &LogRecord) -> PromptfanResult<()> {
        Err(PromptfanError::Sink("connection refused".into()))
    }
}

/// Helper: config with `echo` (models m1, m2) and `broken` (always fails).
fn test_config(attempts: usize) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.execution.attempts = attempts;
    for (name, models) in [("echo", vec!["m1", "m2"]), ("broken", vec!["m1"])] {
        config.providers.insert(
            name.to_string(),
            ProviderConfig {
                models: models.into_iter().map(String::from).collect(),
                prompt: "Say hi".into(),
                endpoint: None,
            },
        );
    }
    config
}

fn build_app(config: GatewayConfig, sink: Arc<dyn LogSink>) -> Router {
    let mut registry = ProviderRegistry::new();
    registry.register("echo", |cfg: &ProviderConfig, _creds| {
        Ok(Arc::new(Echo {
            models: cfg.models.clone(),
            fail: false,
        }) as Arc<dyn Provider>)
    });
    registry.register("broken", |cfg: &ProviderConfig, _creds| {
        Ok(Arc::new(Echo {
            models: cfg.models.clone(),
            fail: true,
        }) as Arc<dyn Provider>)
    });

    let engine =
        ExecutionEngine::new(&config.execution, sink).with_sleep(|_| async {}.boxed());
    let orchestrator = BatchOrchestrator::new(Arc::new(config), Arc::new(registry), engine);
    GatewayServer::build(Arc::new(orchestrator))
}

async fn post_generate(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_app(test_config(1), Arc::new(DiscardSink));
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "promptfan");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generate_single_provider_parallel() {
    let mut config = test_config(10);
    config.default.provider = Some("echo".into());
    let app = build_app(config, Arc::new(DiscardSink));

    let (status, body) = post_generate(app, r#"{"parallel": true}"#).await;

    assert_eq!(status, StatusCode::OK);
    for model in ["m1", "m2"] {
        let entries = body[model].as_array().unwrap();
        assert_eq!(entries.len(), 10);
        assert!(entries.iter().all(|e| *e == format!("{model}: ok")));
    }
}

#[tokio::test]
async fn test_generate_missing_flag_runs_sequentially() {
    let mut config = test_config(3);
    config.default.provider = Some("echo".into());
    let app = build_app(config, Arc::new(DiscardSink));

    let (status, body) = post_generate(app, "{}").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({
            "m1": ["m1: ok", "m1: ok", "m1: ok"],
            "m2": ["m2: ok", "m2: ok", "m2: ok"]
        })
    );
}

#[tokio::test]
async fn test_generate_malformed_body_is_400() {
    let mut config = test_config(3);
    config.default.provider = Some("echo".into());

    for body in ["{not json", r#"{"parallel": "yes"}"#, ""] {
        let app = build_app(config.clone(), Arc::new(DiscardSink));
        let (status, json) = post_generate(app, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body:?}");
        assert!(json["error"].as_str().is_some_and(|m| !m.is_empty()));
    }
}

#[tokio::test]
async fn test_generate_unknown_single_provider_is_500() {
    let mut config = test_config(3);
    config.default.provider = Some("ghost".into());
    let app = build_app(config, Arc::new(DiscardSink));

    let (status, body) = post_generate(app, r#"{"parallel": false}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal Server Error");
}

#[tokio::test]
async fn test_generate_failing_provider_is_still_200() {
    let mut config = test_config(4);
    config.default.provider = Some("broken".into());
    let app = build_app(config, Arc::new(DiscardSink));

    let (status, body) = post_generate(app, r#"{"parallel": false}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({"m1": ["Error: boom", "Error: boom", "Error: boom", "Error: boom"]})
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generate_multi_provider_skips_unresolved() {
    let mut config = test_config(2);
    config.default.providers = vec!["echo".into(), "ghost".into()];
    let app = build_app(config, Arc::new(DiscardSink));

    let (status, body) = post_generate(app, r#"{"parallel": true}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({"echo": {"m1": ["m1: ok", "m1: ok"], "m2": ["m2: ok", "m2: ok"]}})
    );
}

#[tokio::test]
async fn test_sink_outage_does_not_change_response() {
    let mut config = test_config(3);
    config.default.provider = Some("echo".into());

    let (ok_status, ok_body) =
        post_generate(build_app(config.clone(), Arc::new(DiscardSink)), "{}").await;
    let (down_status, down_body) = post_generate(build_app(config, Arc::new(DownSink)), "{}").await;

    assert_eq!(ok_status, StatusCode::OK);
    assert_eq!(down_status, ok_status);
    assert_eq!(down_body, ok_body);
}
