// Local-LLM classifier (SPEC_FULL.md §4.5 step 6), grounded on
// `original_source/escalation/escalation_engine.py::classify_with_local_llm_api`.

use crate::outcome::ClassifierOutcome;
use defense_core::circuit_breaker::CircuitBreaker;
use defense_core::types::RequestMetadata;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Deserialize)]
struct LlmResponse {
    response: String,
}

fn prompt_for(metadata: &RequestMetadata) -> String {
    format!(
        "Classify the following HTTP request as exactly one of MALICIOUS_BOT, HUMAN, or \
         BENIGN_CRAWLER. Respond with only that label.\n\
         Path: {}\nUser-Agent: {}\nReferer: {}\n",
        metadata.path, metadata.user_agent, metadata.referer
    )
}

fn parse_outcome(text: &str) -> ClassifierOutcome {
    let upper = text.to_uppercase();
    if upper.contains("MALICIOUS_BOT") {
        ClassifierOutcome::Bot
    } else if upper.contains("HUMAN") || upper.contains("BENIGN_CRAWLER") {
        ClassifierOutcome::Human
    } else {
        ClassifierOutcome::Inconclusive
    }
}

pub async fn classify(
    client: &reqwest::Client,
    breaker: &CircuitBreaker,
    api_url: &str,
    model: Option<&str>,
    timeout_secs: f64,
    metadata: &RequestMetadata,
) -> ClassifierOutcome {
    if !breaker.check_allow() {
        return ClassifierOutcome::Inconclusive;
    }

    let body = json!({
        "model": model.unwrap_or("default"),
        "prompt": prompt_for(metadata),
        "stream": false,
    });

    let result = client
        .post(api_url)
        .timeout(Duration::from_secs_f64(timeout_secs))
        .json(&body)
        .send()
        .await;

    let response = match result {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!(status = %response.status(), "local llm endpoint returned an error status");
            breaker.record_failure();
            return ClassifierOutcome::Inconclusive;
        }
        Err(err) => {
            tracing::warn!(error = %err, "local llm request failed");
            breaker.record_failure();
            return ClassifierOutcome::Inconclusive;
        }
    };

    match response.json::<LlmResponse>().await {
        Ok(parsed) => {
            breaker.record_success();
            parse_outcome(&parsed.response)
        }
        Err(err) => {
            tracing::warn!(error = %err, "local llm response did not match expected schema");
            breaker.record_failure();
            ClassifierOutcome::Inconclusive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_malicious_bot_label() {
        assert_eq!(parse_outcome("MALICIOUS_BOT"), ClassifierOutcome::Bot);
    }

    #[test]
    fn recognises_human_and_benign_crawler_as_human() {
        assert_eq!(parse_outcome("HUMAN"), ClassifierOutcome::Human);
        assert_eq!(parse_outcome("benign_crawler"), ClassifierOutcome::Human);
    }

    #[test]
    fn unexpected_text_is_inconclusive() {
        assert_eq!(parse_outcome("I am not sure"), ClassifierOutcome::Inconclusive);
    }
}
