// Shared data-model types (SPEC_FULL.md §3) passed between the three
// services over HTTP as JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RequestMetadata {
    pub timestamp: String,
    pub ip: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub referer: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub source: String,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub bytes_sent: Option<u64>,
    #[serde(default)]
    pub http_method: Option<String>,
}

/// A feature-name → scalar mapping (SPEC_FULL.md §3 "Feature vector").
/// Numeric and boolean-as-0/1 features share `f64`; categorical features are
/// carried as strings in `categorical`, matching the two scalar kinds the
/// spec names rather than forcing every feature through one representation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FeatureVector {
    pub numeric: HashMap<String, f64>,
    pub categorical: HashMap<String, String>,
}

impl FeatureVector {
    pub fn set_numeric(&mut self, key: &str, value: f64) {
        self.numeric.insert(key.to_string(), value);
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.numeric.insert(key.to_string(), if value { 1.0 } else { 0.0 });
    }

    pub fn set_categorical(&mut self, key: &str, value: impl Into<String>) {
        self.categorical.insert(key.to_string(), value.into());
    }

    pub fn get_numeric(&self, key: &str) -> Option<f64> {
        self.numeric.get(key).copied()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IsBot {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    None,
    Captcha,
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationVerdict {
    pub is_bot: IsBot,
    /// `-1.0` means "no score computed" (e.g. short-circuited by a
    /// circuit-broken dependency before any rule/model pass ran).
    pub score: f64,
    pub reason: String,
    pub action: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeEventDetails {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeEvent {
    pub event_type: String,
    pub reason: String,
    pub timestamp_utc: String,
    pub details: AnalyzeEventDetails,
}
