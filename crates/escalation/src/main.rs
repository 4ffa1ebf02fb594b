mod config;
mod external_api;
mod features;
mod handlers;
mod llm;
mod model;
mod outcome;
mod reputation;
mod scoring;

use axum::routing::{get, post};
use axum::Router;
use config::EscalationConfig;
use defense_core::circuit_breaker::CircuitBreaker;
use defense_core::metrics::{start_scheduled_snapshot, MetricsRegistry};
use defense_core::robots::RobotsRules;
use defense_core::store::frequency::FrequencyTracker;
use features::UaLists;
use handlers::AppState;
use model::BotScoreModel;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    defense_core::logging::init("escalation");

    let config = EscalationConfig::from_env().expect("escalation configuration");
    let redis_conn = defense_core::store::connect(&config.redis.connection_url())
        .await
        .expect("redis connection for escalation");

    let frequency = FrequencyTracker::new(
        redis_conn,
        config.frequency_window_seconds,
        config.frequency_expiry_margin_seconds,
    );

    let robots = match std::fs::read_to_string(&config.robots_txt_path) {
        Ok(body) => RobotsRules::parse(&body),
        Err(err) => {
            tracing::warn!(error = %err, path = %config.robots_txt_path.display(), "robots.txt unreadable, treating as empty");
            RobotsRules::default()
        }
    };

    let model = config
        .model_weights_path
        .as_deref()
        .and_then(|path| match BotScoreModel::load(path) {
            Ok(model) => Some(model),
            Err(err) => {
                tracing::warn!(error = %err, "model weights failed to load, continuing without a model score");
                None
            }
        });

    let ua_lists = UaLists::new(config.known_bad_uas.clone(), config.known_benign_uas.clone());

    let metrics = Arc::new(MetricsRegistry::new());
    if defense_core::config::env_bool("LOG_METRICS_TO_JSON", false) {
        let interval_min: u64 = defense_core::config::env_or("METRICS_DUMP_INTERVAL_MIN", 5);
        start_scheduled_snapshot(
            metrics.clone(),
            config.logs_dir.join("escalation_metrics.json"),
            Duration::from_secs(interval_min * 60),
        );
    }

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(45))
        .build()
        .expect("reqwest client builds");

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState {
        config,
        frequency,
        robots,
        ua_lists,
        model,
        http_client,
        metrics,
        reputation_breaker: CircuitBreaker::new(),
        llm_breaker: CircuitBreaker::new(),
        external_api_breaker: CircuitBreaker::new(),
    });

    let app = Router::new()
        .route("/escalate", post(handlers::escalate))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = bind_addr.parse().expect("valid bind address");
    tracing::info!(%addr, "escalation engine listening");
    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind escalation listener");
    axum::serve(listener, app).await.expect("escalation server crashed");
}
