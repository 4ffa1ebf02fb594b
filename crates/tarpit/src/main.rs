mod config;
mod handlers;

use axum::routing::get;
use axum::Router;
use config::TarpitConfig;
use defense_core::markov::PostgresMarkovStore;
use defense_core::metrics::{start_scheduled_snapshot, MetricsRegistry};
use defense_core::store::blocklist::BlocklistStore;
use defense_core::store::flag::FlagStore;
use defense_core::store::hop::HopCounter;
use deadpool_postgres::{Config as PgConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use handlers::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

fn build_markov_pool(config: &TarpitConfig) -> Pool {
    let mut pg_config = PgConfig::new();
    pg_config.host = Some(config.markov_db_host.clone());
    pg_config.port = Some(config.markov_db_port);
    pg_config.dbname = Some(config.markov_db_name.clone());
    pg_config.user = Some(config.markov_db_user.clone());
    pg_config.password = config.markov_db_password.clone();
    pg_config.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    pg_config
        .create_pool(Some(Runtime::Tokio1), tokio_postgres::NoTls)
        .expect("markov db pool config is valid")
}

#[tokio::main]
async fn main() {
    defense_core::logging::init("tarpit");

    let config = TarpitConfig::from_env().expect("tarpit configuration");
    let redis_conn = defense_core::store::connect(&config.redis.connection_url())
        .await
        .expect("redis connection for tarpit");

    let hop_counter = HopCounter::new(redis_conn.clone(), config.hop_window_seconds);
    let flag_store = FlagStore::new(redis_conn.clone(), config.flag_ttl_seconds);
    let blocklist = BlocklistStore::new(redis_conn, config.blocklist_ttl_seconds);
    let markov_store: Box<dyn defense_core::markov::MarkovStore> =
        Box::new(PostgresMarkovStore::new(build_markov_pool(&config)));

    let metrics = Arc::new(MetricsRegistry::new());
    if defense_core::config::env_bool("LOG_METRICS_TO_JSON", false) {
        let interval_min: u64 = defense_core::config::env_or("METRICS_DUMP_INTERVAL_MIN", 5);
        start_scheduled_snapshot(
            metrics.clone(),
            config.logs_dir.join("tarpit_metrics.json"),
            Duration::from_secs(interval_min * 60),
        );
    }

    let honeypot_log = defense_core::filelog::JsonLinesLog::open(&config.logs_dir, "honeypot_hits.log")
        .expect("honeypot log file must be writable");

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client builds");

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState {
        config,
        hop_counter,
        flag_store,
        blocklist,
        markov_store,
        http_client,
        metrics,
        honeypot_log,
    });

    let app = Router::new()
        .route("/", get(handlers::banner))
        .route("/health", get(handlers::health))
        .route("/tarpit/*tail", get(handlers::tarpit_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = bind_addr.parse().expect("valid bind address");
    tracing::info!(%addr, "tarpit engine listening");
    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind tarpit listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("tarpit server crashed");
}
