// Webhook Sink endpoints (SPEC_FULL.md §4.6), grounded on
// `original_source/ai_service/ai_webhook.py::receive_webhook`/`/health`.

use crate::config::WebhookConfig;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use defense_core::alert::{Alert, AlertDispatcher};
use defense_core::community::CommunityReporter;
use defense_core::error::DefenseError;
use defense_core::filelog::{AlertEventRecord, BlockEventRecord, CommunityReportRecord, JsonLinesLog};
use defense_core::metrics::MetricsRegistry;
use defense_core::store::blocklist::BlocklistStore;
use defense_core::types::AnalyzeEvent;
use serde_json::json;
use std::sync::Arc;

/// Reasons that trigger a blocklist write, matched by exact prefix per Open
/// Question (c) — never a substring scan, which would let an unrelated
/// reason that merely *contains* one of these phrases mid-string trigger a
/// block.
const AUTO_BLOCK_REASON_PREFIXES: &[&str] = &[
    "High Combined Score",
    "Local LLM Classification",
    "External API Classification",
    "High Heuristic Score",
    "Honeypot_Hit",
    "IP Reputation Malicious",
];

fn is_auto_block_reason(reason: &str) -> bool {
    AUTO_BLOCK_REASON_PREFIXES.iter().any(|prefix| reason.starts_with(prefix))
}

pub struct AppState {
    pub config: WebhookConfig,
    pub blocklist: BlocklistStore,
    pub community_reporter: Option<CommunityReporter>,
    pub alert_dispatcher: AlertDispatcher,
    pub metrics: Arc<MetricsRegistry>,
    pub block_log: JsonLinesLog,
    pub alert_log: JsonLinesLog,
    pub community_log: JsonLinesLog,
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let blocklist_reachable = state.blocklist.is_blocked("0.0.0.0").await.is_ok();
    Json(json!({
        "status": if blocklist_reachable { "ok" } else { "degraded" },
        "service": "webhook",
        "blocklist_store_reachable": blocklist_reachable,
    }))
}

/// `POST /analyze`. Parsed manually so malformed bodies surface a 422,
/// matching the Escalation Engine's own handler.
pub async fn analyze(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let event: AnalyzeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            state.metrics.increment("webhook_input_invalid");
            return DefenseError::InputInvalid(format!("malformed analyze event: {err}")).into_response();
        }
    };

    let ip = event.details.ip.as_deref().filter(|ip| *ip != "unknown" && !ip.is_empty());

    let Some(ip) = ip else {
        state.metrics.increment("webhook_unknown_ip_skipped");
        return Json(json!({
            "status": "ok",
            "action_taken": "blocklist_skipped_unknown_ip",
            "ip_processed": null,
        }))
        .into_response();
    };

    let mut action_taken = String::new();
    let now_utc = chrono::Utc::now().to_rfc3339();

    if is_auto_block_reason(&event.reason) {
        match state.blocklist.block(ip, &event.reason, &event.details.user_agent).await {
            Ok(()) => {
                action_taken.push_str("ip_blocklisted_ttl");
                state.metrics.increment("blocklist_ips_added");
                let _ = state.block_log.append(&BlockEventRecord {
                    timestamp: now_utc.clone(),
                    ip: ip.to_string(),
                    reason: event.reason.clone(),
                    user_agent: event.details.user_agent.clone(),
                });

                if state.config.enable_community_reporting {
                    if let Some(reporter) = &state.community_reporter {
                        let delivered = reporter.report(ip, &event.reason).await.is_ok();
                        action_taken.push_str(if delivered {
                            "_community_report_success"
                        } else {
                            "_community_report_failed"
                        });
                        if !delivered {
                            state.metrics.increment("community_report_errors");
                        }
                        let _ = state.community_log.append(&CommunityReportRecord {
                            timestamp: now_utc.clone(),
                            ip: ip.to_string(),
                            reason: event.reason.clone(),
                            delivered,
                        });
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, ip = %ip, "blocklist write failed");
                action_taken.push_str("blocklist_failed");
                state.metrics.increment("blocklist_redis_errors");
            }
        }
    } else {
        action_taken.push_str("no_block_action");
    }

    // Independently, attempt alert dispatch — never fails the endpoint.
    let alert = Alert {
        reason: event.reason.clone(),
        ip: ip.to_string(),
        message: format!("{} detected for {}", event.reason, ip),
        timestamp_utc: now_utc.clone(),
    };
    match state.alert_dispatcher.dispatch(&alert).await {
        Ok(true) => {
            action_taken.push_str("_alert_checked");
            state.metrics.increment("alerts_dispatched");
            let _ = state.alert_log.append(&AlertEventRecord {
                timestamp: now_utc.clone(),
                reason: event.reason.clone(),
                ip: ip.to_string(),
                transport: "configured".to_string(),
                delivered: true,
            });
        }
        Ok(false) => {
            action_taken.push_str("_alert_checked");
        }
        Err(err) => {
            tracing::warn!(error = %err, ip = %ip, "alert dispatch failed");
            action_taken.push_str("_alert_error");
            state.metrics.increment("alert_transport_errors");
            let _ = state.alert_log.append(&AlertEventRecord {
                timestamp: now_utc,
                reason: event.reason.clone(),
                ip: ip.to_string(),
                transport: "configured".to_string(),
                delivered: false,
            });
        }
    }

    state.metrics.increment("webhook_events_received");
    Json(json!({
        "status": "ok",
        "action_taken": action_taken,
        "ip_processed": ip,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_block_prefix_match_is_exact_not_substring() {
        assert!(is_auto_block_reason("Honeypot_Hit on /admin"));
        assert!(!is_auto_block_reason("Something about a Honeypot_Hit mid-sentence"));
    }

    #[test]
    fn manual_review_reason_does_not_trigger_a_block() {
        assert!(!is_auto_block_reason("Manual Review Flag"));
    }
}
