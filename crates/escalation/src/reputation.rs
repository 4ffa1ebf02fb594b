// IP reputation lookup (SPEC_FULL.md §4.5 step 1), grounded on
// `original_source/escalation/escalation_engine.py::check_ip_reputation`.

use defense_core::circuit_breaker::CircuitBreaker;
use serde::Deserialize;
use std::time::Duration;

pub struct Reputation {
    pub malicious: bool,
    pub score: f64,
}

#[derive(Deserialize)]
struct AbuseIpDbResponse {
    data: AbuseIpDbData,
}

#[derive(Deserialize)]
struct AbuseIpDbData {
    #[serde(rename = "abuseConfidenceScore")]
    abuse_confidence_score: f64,
}

/// Looks up `ip`'s reputation. `None` means "unavailable" (circuit open,
/// request failure, timeout, or non-matching schema) — failures never abort
/// the caller's decision ladder.
pub async fn lookup(
    client: &reqwest::Client,
    breaker: &CircuitBreaker,
    api_url: &str,
    api_key: Option<&str>,
    timeout_secs: f64,
    min_malicious_threshold: f64,
) -> Option<Reputation> {
    if !breaker.check_allow() {
        return None;
    }

    let mut request = client
        .get(api_url)
        .timeout(Duration::from_secs_f64(timeout_secs));
    if let Some(key) = api_key {
        request = request.header("Key", key).header("Accept", "application/json");
    }

    let result = request.send().await;
    let response = match result {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!(status = %response.status(), "ip reputation endpoint returned an error status");
            breaker.record_failure();
            return None;
        }
        Err(err) => {
            tracing::warn!(error = %err, "ip reputation lookup failed");
            breaker.record_failure();
            return None;
        }
    };

    match response.json::<AbuseIpDbResponse>().await {
        Ok(parsed) => {
            breaker.record_success();
            let score = parsed.data.abuse_confidence_score;
            Some(Reputation {
                malicious: score >= min_malicious_threshold,
                score,
            })
        }
        Err(err) => {
            tracing::warn!(error = %err, "ip reputation response did not match expected schema");
            breaker.record_failure();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_circuit_short_circuits_without_a_request() {
        let breaker = CircuitBreaker::new();
        for _ in 0..10 {
            breaker.record_failure();
        }
        assert_eq!(breaker.get_state_name(), "Open");
    }
}
