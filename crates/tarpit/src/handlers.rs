use crate::config::TarpitConfig;
use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use defense_core::filelog::{HoneypotHitRecord, JsonLinesLog};
use defense_core::markov::{generate_page, MarkovStore};
use defense_core::metrics::MetricsRegistry;
use defense_core::store::blocklist::BlocklistStore;
use defense_core::store::flag::FlagStore;
use defense_core::store::hop::HopCounter;
use defense_core::types::RequestMetadata;
use rand::Rng;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

pub struct AppState {
    pub config: TarpitConfig,
    pub hop_counter: HopCounter,
    pub flag_store: FlagStore,
    pub blocklist: BlocklistStore,
    pub markov_store: Box<dyn MarkovStore>,
    pub http_client: reqwest::Client,
    pub metrics: Arc<MetricsRegistry>,
    pub honeypot_log: JsonLinesLog,
}

/// `X-Forwarded-For` first hop, falling back to the socket peer (SPEC_FULL
/// §4.4 step 1).
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "tarpit" }))
}

pub async fn banner() -> impl IntoResponse {
    "tarpit engine\n"
}

pub async fn tarpit_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(tail): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(&headers, peer);
    let ua = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let referer = headers
        .get("referer")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let path = format!("/tarpit/{tail}");
    let now_utc = chrono::Utc::now().to_rfc3339();

    // Step 2: hop check.
    if state.config.hop_check_enabled {
        match state.hop_counter.increment(&ip).await {
            Ok(count) if count > state.config.max_hops => {
                state.metrics.increment("tarpit_hop_limit_blocks");
                let _ = state
                    .blocklist
                    .block(&ip, "hop limit exceeded", &ua)
                    .await;
                return (StatusCode::FORBIDDEN, "hop limit exceeded").into_response();
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, ip = %ip, "hop counter unavailable, degrading open");
                state.metrics.increment("tarpit_hop_store_errors");
            }
        }
    }

    // Step 3: honeypot log.
    let mut header_map = std::collections::HashMap::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            header_map.insert(name.as_str().to_string(), v.to_string());
        }
    }
    if let Err(err) = state.honeypot_log.append(&HoneypotHitRecord {
        timestamp: now_utc.clone(),
        ip: ip.clone(),
        ua: ua.clone(),
        method: "GET".to_string(),
        path: path.clone(),
        referer: referer.clone(),
        headers: header_map.clone(),
    }) {
        tracing::warn!(error = %err, "failed to append honeypot hit record");
    }

    // Step 4: flag "recently tarpitted".
    if let Err(err) = state.flag_store.flag(&ip).await {
        tracing::debug!(error = %err, ip = %ip, "tarpit flag write failed, non-fatal");
    }

    // Step 5: escalate, fire-and-forget.
    spawn_escalation(&state, &ip, &ua, &referer, &path, &header_map, &now_utc);

    // Step 6: generate the page body, seeded deterministically by path.
    state.metrics.increment("tarpit_pages_served");
    let seed_input = format!("{}:{}", state.config.system_seed, path);
    let html = generate_page(&seed_input, state.markov_store.as_ref()).await;

    // Step 7: stream line-by-line with a per-line random delay.
    stream_response(html, state.config.min_delay_sec, state.config.max_delay_sec)
}

fn spawn_escalation(
    state: &Arc<AppState>,
    ip: &str,
    ua: &str,
    referer: &str,
    path: &str,
    headers: &std::collections::HashMap<String, String>,
    now_utc: &str,
) {
    let client = state.http_client.clone();
    let url = state.config.escalation_url.clone();
    let metrics = state.metrics.clone();
    let metadata = RequestMetadata {
        timestamp: now_utc.to_string(),
        ip: ip.to_string(),
        user_agent: ua.to_string(),
        referer: referer.to_string(),
        path: path.to_string(),
        headers: headers.clone(),
        source: "tarpit".to_string(),
        status_code: None,
        bytes_sent: None,
        http_method: Some("GET".to_string()),
    };

    tokio::spawn(async move {
        let result = client
            .post(&url)
            .timeout(Duration::from_secs(5))
            .json(&metadata)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                metrics.increment("tarpit_escalations_sent");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "escalation call returned non-success");
                metrics.increment("tarpit_escalation_errors");
            }
            Err(err) => {
                tracing::warn!(error = %err, "escalation call failed");
                metrics.increment("tarpit_escalation_errors");
            }
        }
    });
}

/// Streams `body` one line at a time with a delay drawn uniformly from
/// `[min_delay, max_delay]` per line (SPEC_FULL §4.4 step 7). The receiver
/// side of the channel is dropped when the client disconnects, which makes
/// the next `send` fail and ends the task within one delay interval.
fn stream_response(body: String, min_delay: f64, max_delay: f64) -> Response {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(4);

    tokio::spawn(async move {
        let mut rng = rand::thread_rng();
        for line in body.lines() {
            let mut chunk = line.as_bytes().to_vec();
            chunk.push(b'\n');
            if tx.send(Ok(Bytes::from(chunk))).await.is_err() {
                return; // client disconnected
            }
            let delay = if max_delay > min_delay {
                rng.gen_range(min_delay..=max_delay)
            } else {
                min_delay
            };
            tokio::time::sleep(Duration::from_secs_f64(delay.max(0.0))).await;
        }
    });

    let stream = ReceiverStream::new(rx);
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/html; charset=utf-8")
        .body(Body::from_stream(stream))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_prefers_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.5, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(client_ip(&headers, peer), "203.0.113.5");
    }

    #[test]
    fn client_ip_falls_back_to_socket_peer() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "198.51.100.9:443".parse().unwrap();
        assert_eq!(client_ip(&headers, peer), "198.51.100.9");
    }
}
