// External classification API (SPEC_FULL.md §4.5 step 6), grounded on
// `original_source/escalation/escalation_engine.py::classify_with_external_api`.

use crate::outcome::ClassifierOutcome;
use defense_core::circuit_breaker::CircuitBreaker;
use defense_core::types::RequestMetadata;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Deserialize)]
struct ExternalApiResponse {
    #[serde(alias = "bot_status")]
    is_bot: Value,
}

fn parse_outcome(value: &Value) -> ClassifierOutcome {
    match value.as_bool() {
        Some(true) => ClassifierOutcome::Bot,
        Some(false) => ClassifierOutcome::Human,
        None => ClassifierOutcome::Inconclusive,
    }
}

pub async fn classify(
    client: &reqwest::Client,
    breaker: &CircuitBreaker,
    api_url: &str,
    api_key: Option<&str>,
    timeout_secs: f64,
    metadata: &RequestMetadata,
) -> ClassifierOutcome {
    if !breaker.check_allow() {
        return ClassifierOutcome::Inconclusive;
    }

    let mut request = client
        .post(api_url)
        .timeout(Duration::from_secs_f64(timeout_secs))
        .json(&json!({
            "ipAddress": metadata.ip,
            "userAgent": metadata.user_agent,
            "referer": metadata.referer,
            "requestPath": metadata.path,
            "headers": metadata.headers,
        }));
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let result = request.send().await;
    let response = match result {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!(status = %response.status(), "external classification api returned an error status");
            breaker.record_failure();
            return ClassifierOutcome::Inconclusive;
        }
        Err(err) => {
            tracing::warn!(error = %err, "external classification api request failed");
            breaker.record_failure();
            return ClassifierOutcome::Inconclusive;
        }
    };

    match response.json::<ExternalApiResponse>().await {
        Ok(parsed) => {
            breaker.record_success();
            parse_outcome(&parsed.is_bot)
        }
        Err(err) => {
            tracing::warn!(error = %err, "external classification api response did not match expected schema");
            breaker.record_failure();
            ClassifierOutcome::Inconclusive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_true_is_bot() {
        assert_eq!(parse_outcome(&Value::Bool(true)), ClassifierOutcome::Bot);
    }

    #[test]
    fn bool_false_is_human() {
        assert_eq!(parse_outcome(&Value::Bool(false)), ClassifierOutcome::Human);
    }

    #[test]
    fn non_bool_is_inconclusive() {
        assert_eq!(parse_outcome(&Value::String("maybe".to_string())), ClassifierOutcome::Inconclusive);
    }
}
