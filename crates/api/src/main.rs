use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chartscore_core::llm::anthropic::AnthropicClient;
use chartscore_core::llm::ScoreClient;
use chartscore_core::pipeline::error::StageError;
use chartscore_core::pipeline::{run_pipeline, AnalysisRequest};
use chartscore_core::storage::{ObjectStore, S3ObjectStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = chartscore_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    // Clients are built once and injected; handlers never touch globals.
    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::from_settings(&settings).await);
    let scorer: Arc<dyn ScoreClient> = Arc::new(AnthropicClient::from_settings(&settings)?);

    let state = AppState {
        store,
        scorer,
        error_detail: settings.error_detail,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/analyze", post(analyze))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    store: Arc<dyn ObjectStore>,
    scorer: Arc<dyn ScoreClient>,
    error_detail: bool,
}

/// Runs the full pipeline for one request.
///
/// The response body keeps the original invocation contract: on success a
/// `{"statusCode": 200, "body": "<json string>"}` envelope, on failure the
/// bare `{"message": "Not able to process"}` shape (extended with an
/// `error` field only when `ERROR_DETAIL` opts in).
async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Json<serde_json::Value> {
    let result = run_pipeline(state.store.as_ref(), state.scorer.as_ref(), &request).await;

    let ranked = match result {
        Ok(ranked) => ranked,
        Err(err) => return Json(failure_body(&err, state.error_detail)),
    };

    match serde_json::to_string(&ranked) {
        Ok(body) => Json(json!({ "statusCode": 200, "body": body })),
        Err(e) => Json(failure_body(&anyhow::Error::new(e), state.error_detail)),
    }
}

fn failure_body(err: &anyhow::Error, error_detail: bool) -> serde_json::Value {
    sentry_anyhow::capture_anyhow(err);
    tracing::error!(error = %format!("{err:#}"), "analysis request failed");

    let mut body = json!({ "message": "Not able to process" });
    if error_detail {
        body["error"] = match err.downcast_ref::<StageError>() {
            Some(stage) => json!({ "kind": stage.kind.as_str(), "detail": stage.detail }),
            None => json!({ "kind": "unknown", "detail": format!("{err:#}") }),
        };
    }
    body
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &chartscore_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_body_is_bare_by_default() {
        let err = anyhow::anyhow!("boom");
        let body = failure_body(&err, false);
        assert_eq!(body, json!({ "message": "Not able to process" }));
    }

    #[test]
    fn failure_body_carries_stage_kind_when_detail_enabled() {
        let err: anyhow::Error = StageError::wrap(
            chartscore_core::pipeline::error::StageKind::Parse,
            anyhow::anyhow!("invalid Date"),
        )
        .into();
        let body = failure_body(&err, true);
        assert_eq!(body["message"], "Not able to process");
        assert_eq!(body["error"]["kind"], "parse");
    }
}
