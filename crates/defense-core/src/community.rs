// Community Reporter (SPEC_FULL.md §4.6 step 2). Grounded on
// `original_source/ai_service/ai_webhook.py::report_ip_to_community`, an
// AbuseIPDB-style POST with a reason-substring → category-id mapping.

use crate::error::DefenseError;
use serde_json::json;

/// AbuseIPDB report categories, matched in order against a substring of the
/// block reason (mirrors the original's simple keyword table).
const CATEGORY_TABLE: &[(&str, u32)] = &[
    ("hop limit", 19),       // Bad Web Bot
    ("High Combined", 19),   // Bad Web Bot
    ("Local LLM", 19),       // Bad Web Bot
    ("External API", 19),    // Bad Web Bot
    ("Honeypot", 21),        // Web App Attack
    ("IP Reputation", 15),   // Hacking
];

fn categories_for(reason: &str) -> Vec<u32> {
    CATEGORY_TABLE
        .iter()
        .filter(|(needle, _)| reason.contains(needle))
        .map(|(_, category)| *category)
        .collect()
}

pub struct CommunityReporter {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl CommunityReporter {
    pub fn new(client: reqwest::Client, api_key: String, endpoint: String) -> Self {
        Self {
            client,
            api_key,
            endpoint,
        }
    }

    pub async fn report(&self, ip: &str, reason: &str) -> Result<(), DefenseError> {
        let mut categories = categories_for(reason);
        if categories.is_empty() {
            categories.push(19); // generic "bad bot" fallback category
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("Key", &self.api_key)
            .header("Accept", "application/json")
            .json(&json!({
                "ip": ip,
                "categories": categories.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(","),
                "comment": reason,
            }))
            .send()
            .await
            .map_err(DefenseError::classifier_transient)?;

        if !response.status().is_success() {
            return Err(DefenseError::ClassifierTransient(format!(
                "community report endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_reasons_to_categories() {
        assert_eq!(categories_for("hop limit exceeded"), vec![19]);
        assert_eq!(categories_for("Honeypot_Hit on /admin"), vec![21]);
    }

    #[test]
    fn unmatched_reason_yields_no_categories_before_fallback() {
        assert!(categories_for("some unrelated reason").is_empty());
    }
}
