use crate::config::EscalationConfig;
use crate::features::UaLists;
use crate::model::BotScoreModel;
use crate::outcome::ClassifierOutcome;
use crate::{external_api, features, llm, reputation, scoring};
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use defense_core::circuit_breaker::CircuitBreaker;
use defense_core::error::DefenseError;
use defense_core::metrics::MetricsRegistry;
use defense_core::robots::RobotsRules;
use defense_core::store::frequency::FrequencyTracker;
use defense_core::types::{Action, AnalyzeEvent, AnalyzeEventDetails, EscalationVerdict, IsBot, RequestMetadata};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub config: EscalationConfig,
    pub frequency: FrequencyTracker,
    pub robots: RobotsRules,
    pub ua_lists: UaLists,
    pub model: Option<BotScoreModel>,
    pub http_client: reqwest::Client,
    pub metrics: Arc<MetricsRegistry>,
    pub reputation_breaker: CircuitBreaker,
    pub llm_breaker: CircuitBreaker,
    pub external_api_breaker: CircuitBreaker,
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "escalation" }))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// `POST /escalate`. Parses the body manually (rather than via axum's `Json`
/// extractor) so malformed input surfaces as a 422 rather than axum's
/// default 400 rejection (SPEC_FULL §7 "Input-invalid").
pub async fn escalate(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let metadata: RequestMetadata = match serde_json::from_slice(&body) {
        Ok(metadata) => metadata,
        Err(err) => {
            state.metrics.increment("escalation_input_invalid");
            return DefenseError::InputInvalid(format!("malformed request metadata: {err}")).into_response();
        }
    };

    let verdict = run_pipeline(&state, &metadata).await;

    if matches!(verdict.is_bot, IsBot::True) {
        forward_to_webhook(&state, &metadata, &verdict).await;
    }

    state.metrics.increment("escalation_requests_total");
    Json(json!({
        "status": "ok",
        "action": verdict.action,
        "is_bot_decision": match verdict.is_bot {
            IsBot::True => Some(true),
            IsBot::False => Some(false),
            IsBot::Unknown => None,
        },
        "score": verdict.score,
    }))
    .into_response()
}

async fn run_pipeline(state: &Arc<AppState>, metadata: &RequestMetadata) -> EscalationVerdict {
    let now_dt = chrono::Utc::now();
    let now = now_dt.timestamp() as f64 + (now_dt.timestamp_subsec_micros() as f64) / 1_000_000.0;

    // Step 1: optional IP reputation lookup.
    let rep = if state.config.enable_ip_reputation {
        match state.config.ip_reputation_api_url.as_deref() {
            Some(url) => {
                reputation::lookup(
                    &state.http_client,
                    &state.reputation_breaker,
                    url,
                    state.config.ip_reputation_api_key.as_deref(),
                    state.config.ip_reputation_timeout_secs,
                    state.config.ip_reputation_min_malicious_threshold,
                )
                .await
            }
            None => None,
        }
    } else {
        None
    };

    // Step 2: feature extraction.
    let freq = match state.frequency.record(&metadata.ip, now).await {
        Ok(reading) => reading,
        Err(err) => {
            tracing::warn!(error = %err, ip = %metadata.ip, "frequency tracker unavailable, degrading open");
            state.metrics.increment("escalation_frequency_store_errors");
            defense_core::store::frequency::FrequencyReading {
                count: 0,
                time_since_last_sec: -1.0,
            }
        }
    };
    let fv = features::extract(
        metadata,
        &freq,
        &state.robots,
        &state.ua_lists,
        state.config.frequency_window_seconds as u64,
    );

    // Step 3 & 4: rule + (optional) model score.
    let rule = scoring::rule_score(&fv, state.config.frequency_window_seconds as u64);
    let model_score = state.model.as_ref().map(|m| m.score(&fv));

    // Step 5: combine, then apply reputation bonus.
    let reputation_malicious = rep.as_ref().map(|r| r.malicious).unwrap_or(false);
    let combined = scoring::combine(
        rule,
        model_score,
        reputation_malicious,
        state.config.ip_reputation_malicious_score_bonus,
    );

    // Step 6: decision ladder.
    decide(state, metadata, combined).await
}

async fn decide(state: &Arc<AppState>, metadata: &RequestMetadata, score: f64) -> EscalationVerdict {
    let cfg = &state.config;

    if score >= cfg.heuristic_threshold_high {
        state.metrics.increment("escalation_bot_high_combined");
        return EscalationVerdict {
            is_bot: IsBot::True,
            score,
            reason: "High Combined Score".to_string(),
            action: Action::Block,
        };
    }

    if score < cfg.captcha_score_threshold_low {
        state.metrics.increment("escalation_human_low_score");
        return EscalationVerdict {
            is_bot: IsBot::False,
            score,
            reason: "Low Combined Score".to_string(),
            action: Action::None,
        };
    }

    if cfg.enable_captcha_trigger && score < cfg.captcha_score_threshold_high {
        state.metrics.increment("escalation_captcha_triggered");
        return EscalationVerdict {
            is_bot: IsBot::Unknown,
            score,
            reason: "Middle Band Score".to_string(),
            action: Action::Captcha,
        };
    }

    // Middle band (or captcha disabled): escalate to Local LLM, then External API.
    if let Some(llm_url) = cfg.local_llm_api_url.as_deref() {
        match llm::classify(
            &state.http_client,
            &state.llm_breaker,
            llm_url,
            cfg.local_llm_model.as_deref(),
            cfg.local_llm_timeout_secs,
            metadata,
        )
        .await
        {
            ClassifierOutcome::Bot => {
                state.metrics.increment("escalation_bot_local_llm");
                return EscalationVerdict {
                    is_bot: IsBot::True,
                    score,
                    reason: "Local LLM Classification".to_string(),
                    action: Action::Block,
                };
            }
            ClassifierOutcome::Human => {
                state.metrics.increment("escalation_human_local_llm");
                return EscalationVerdict {
                    is_bot: IsBot::False,
                    score,
                    reason: "Local LLM Classification".to_string(),
                    action: Action::None,
                };
            }
            ClassifierOutcome::Inconclusive => {
                state.metrics.increment("escalation_local_llm_inconclusive");
            }
        }
    }

    if let Some(external_url) = cfg.external_api_url.as_deref() {
        match external_api::classify(
            &state.http_client,
            &state.external_api_breaker,
            external_url,
            cfg.external_api_key.as_deref(),
            cfg.external_api_timeout_secs,
            metadata,
        )
        .await
        {
            ClassifierOutcome::Bot => {
                state.metrics.increment("escalation_bot_external_api");
                return EscalationVerdict {
                    is_bot: IsBot::True,
                    score,
                    reason: "External API Classification".to_string(),
                    action: Action::Block,
                };
            }
            ClassifierOutcome::Human => {
                state.metrics.increment("escalation_human_external_api");
                return EscalationVerdict {
                    is_bot: IsBot::False,
                    score,
                    reason: "External API Classification".to_string(),
                    action: Action::None,
                };
            }
            ClassifierOutcome::Inconclusive => {
                state.metrics.increment("escalation_external_api_inconclusive");
            }
        }
    }

    state.metrics.increment("escalation_unknown");
    EscalationVerdict {
        is_bot: IsBot::Unknown,
        score,
        reason: "Inconclusive".to_string(),
        action: Action::None,
    }
}

async fn forward_to_webhook(state: &Arc<AppState>, metadata: &RequestMetadata, verdict: &EscalationVerdict) {
    let event = AnalyzeEvent {
        event_type: "suspicious_activity_detected".to_string(),
        reason: verdict.reason.clone(),
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        details: AnalyzeEventDetails {
            ip: Some(metadata.ip.clone()),
            user_agent: metadata.user_agent.clone(),
        },
    };

    let result = state
        .http_client
        .post(&state.config.webhook_url)
        .timeout(Duration::from_secs_f64(state.config.webhook_timeout_secs))
        .json(&event)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            state.metrics.increment("escalation_webhook_forwarded");
        }
        Ok(response) => {
            tracing::warn!(status = %response.status(), "webhook forward returned an error status");
            state.metrics.increment("escalation_webhook_errors");
        }
        Err(err) => {
            tracing::warn!(error = %err, "webhook forward failed");
            state.metrics.increment("escalation_webhook_errors");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn malformed_body_maps_to_422() {
        let response = DefenseError::InputInvalid("bad body".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
