mod config;
mod handlers;

use axum::routing::{get, post};
use axum::Router;
use config::{AlertMethod, WebhookConfig};
use defense_core::alert::{
    AlertDispatcher, AlertTransport, ChatTransport, GenericWebhookTransport, NullTransport, SmtpTransport,
};
use defense_core::community::CommunityReporter;
use defense_core::filelog::JsonLinesLog;
use defense_core::metrics::{start_scheduled_snapshot, MetricsRegistry};
use defense_core::store::blocklist::BlocklistStore;
use handlers::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

fn build_transport(config: &WebhookConfig, client: reqwest::Client) -> Box<dyn AlertTransport> {
    match &config.alert_method {
        AlertMethod::Webhook => match &config.generic_webhook_url {
            Some(url) => Box::new(GenericWebhookTransport::new(client, url.clone())),
            None => {
                tracing::warn!("ALERT_METHOD=webhook but ALERT_WEBHOOK_URL is unset, disabling alerts");
                Box::new(NullTransport)
            }
        },
        AlertMethod::Slack => match &config.slack_webhook_url {
            Some(url) => Box::new(ChatTransport::new(client, url.clone())),
            None => {
                tracing::warn!("ALERT_METHOD=slack but ALERT_SLACK_WEBHOOK_URL is unset, disabling alerts");
                Box::new(NullTransport)
            }
        },
        AlertMethod::Smtp => match config.smtp.as_ref() {
            Some(smtp) => Box::new(SmtpTransport::new(defense_core::alert::SmtpConfig {
                host: smtp.host.clone(),
                port: smtp.port,
                username: smtp.username.clone(),
                password: smtp.password.clone(),
                from: smtp.from.clone(),
                to: smtp.to.clone(),
            })),
            None => {
                tracing::warn!("ALERT_METHOD=smtp but SMTP configuration is incomplete, disabling alerts");
                Box::new(NullTransport)
            }
        },
        AlertMethod::None => Box::new(NullTransport),
    }
}

#[tokio::main]
async fn main() {
    defense_core::logging::init("webhook");

    let config = WebhookConfig::from_env().expect("webhook configuration");
    let redis_conn = defense_core::store::connect(&config.redis.connection_url())
        .await
        .expect("redis connection for webhook");

    let blocklist = BlocklistStore::new(redis_conn, config.blocklist_ttl_seconds);

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("reqwest client builds");

    let community_reporter = if config.enable_community_reporting {
        match (&config.community_report_url, &config.community_report_api_key) {
            (Some(url), Some(key)) => Some(CommunityReporter::new(http_client.clone(), key.clone(), url.clone())),
            _ => {
                tracing::warn!("ENABLE_COMMUNITY_REPORTING is set but url/key are incomplete, disabling");
                None
            }
        }
    } else {
        None
    };

    let transport = build_transport(&config, http_client.clone());
    let alert_dispatcher = AlertDispatcher::new(transport, config.alert_min_severity);

    let metrics = Arc::new(MetricsRegistry::new());
    if defense_core::config::env_bool("LOG_METRICS_TO_JSON", false) {
        let interval_min: u64 = defense_core::config::env_or("METRICS_DUMP_INTERVAL_MIN", 5);
        start_scheduled_snapshot(
            metrics.clone(),
            config.logs_dir.join("webhook_metrics.json"),
            Duration::from_secs(interval_min * 60),
        );
    }

    let block_log = JsonLinesLog::open(&config.logs_dir, "block_events.log").expect("block log file must be writable");
    let alert_log = JsonLinesLog::open(&config.logs_dir, "alert_events.log").expect("alert log file must be writable");
    let community_log =
        JsonLinesLog::open(&config.logs_dir, "community_report.log").expect("community report log file must be writable");

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState {
        config,
        blocklist,
        community_reporter,
        alert_dispatcher,
        metrics,
        block_log,
        alert_log,
        community_log,
    });

    let app = Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = bind_addr.parse().expect("valid bind address");
    tracing::info!(%addr, "webhook sink listening");
    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind webhook listener");
    axum::serve(listener, app).await.expect("webhook server crashed");
}
