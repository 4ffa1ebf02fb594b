// Alert Dispatcher (SPEC_FULL.md §4.7). Grounded on
// `original_source/ai_service/ai_webhook.py`'s `send_alert`/
// `send_generic_webhook_alert`/`send_slack_alert`/`send_smtp_alert`, collapsed
// into one `AlertTransport` trait per SPEC_FULL §9 ("mixing sync and async
// transports... collapses to a single abstract AlertTransport").
//
// Open Question (c): severity lookup is exact `starts_with`, longest prefix
// first, never a substring `contains` scan — "High Combustion" must not match
// the "High Combined" prefix just because both start with "High C...".

use crate::error::DefenseError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use serde_json::json;

/// (prefix, severity) pairs. Lower number == more severe. Ordered longest
/// prefix first so a more specific prefix never loses to a shorter one that
/// happens to also match.
const SEVERITY_TABLE: &[(&str, u8)] = &[
    ("High Combined Score", 1),
    ("High Heuristic Score", 1),
    ("IP Reputation Malicious", 1),
    ("High Combined", 1),
    ("High Heuristic", 1),
    ("IP Reputation", 1),
    ("Local LLM", 2),
    ("Honeypot_Hit", 2),
    ("External API", 3),
];

/// Returns the severity for `reason`, or `None` if no configured prefix
/// matches it (such a reason never triggers an alert).
pub fn severity_for(reason: &str) -> Option<u8> {
    SEVERITY_TABLE
        .iter()
        .filter(|(prefix, _)| reason.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, level)| *level)
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub reason: String,
    pub ip: String,
    pub message: String,
    pub timestamp_utc: String,
}

#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), DefenseError>;
}

/// Generic outbound webhook: JSON POST of the alert payload.
pub struct GenericWebhookTransport {
    client: reqwest::Client,
    url: String,
}

impl GenericWebhookTransport {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl AlertTransport for GenericWebhookTransport {
    async fn send(&self, alert: &Alert) -> Result<(), DefenseError> {
        let response = self
            .client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .map_err(DefenseError::classifier_transient)?;

        if !response.status().is_success() {
            return Err(DefenseError::ClassifierTransient(format!(
                "webhook alert transport returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Chat incoming-webhook transport (Slack-style): a plain-text message body.
pub struct ChatTransport {
    client: reqwest::Client,
    webhook_url: String,
}

impl ChatTransport {
    pub fn new(client: reqwest::Client, webhook_url: String) -> Self {
        Self {
            client,
            webhook_url,
        }
    }
}

#[async_trait]
impl AlertTransport for ChatTransport {
    async fn send(&self, alert: &Alert) -> Result<(), DefenseError> {
        let text = format!(
            "[{}] {} — ip={} at {}",
            alert.reason, alert.message, alert.ip, alert.timestamp_utc
        );
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(DefenseError::classifier_transient)?;

        if !response.status().is_success() {
            return Err(DefenseError::ClassifierTransient(format!(
                "chat alert transport returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: String,
}

/// SMTP transport: STARTTLS on 587, implicit TLS on 465, auth optional —
/// matching `ai_webhook.py::send_smtp_alert`'s port-based branch.
pub struct SmtpTransport {
    config: SmtpConfig,
}

impl SmtpTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_transport(
        &self,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, DefenseError> {
        let builder = if self.config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
        }
        .map_err(DefenseError::configuration)?
        .port(self.config.port);

        let builder = match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl AlertTransport for SmtpTransport {
    async fn send(&self, alert: &Alert) -> Result<(), DefenseError> {
        let body = format!(
            "Reason: {}\nIP: {}\nTimestamp: {}\n\n{}",
            alert.reason, alert.ip, alert.timestamp_utc, alert.message
        );

        let email = Message::builder()
            .from(self.config.from.parse().map_err(DefenseError::configuration)?)
            .to(self.config.to.parse().map_err(DefenseError::configuration)?)
            .subject(format!("[defense alert] {}", alert.reason))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(DefenseError::internal)?;

        let transport = self.build_transport()?;
        transport
            .send(email)
            .await
            .map_err(DefenseError::classifier_transient)?;
        Ok(())
    }
}

/// No-op transport selected when `ALERT_METHOD=none` (SPEC_FULL.md §9
/// "dynamic module wiring... becomes explicit capability interfaces with a
/// no-op variant selected at startup by configuration").
pub struct NullTransport;

#[async_trait]
impl AlertTransport for NullTransport {
    async fn send(&self, _alert: &Alert) -> Result<(), DefenseError> {
        Ok(())
    }
}

pub struct AlertDispatcher {
    transport: Box<dyn AlertTransport>,
    min_severity: u8,
}

impl AlertDispatcher {
    pub fn new(transport: Box<dyn AlertTransport>, min_severity: u8) -> Self {
        Self {
            transport,
            min_severity,
        }
    }

    /// Dispatches iff `reason` maps to a severity at or more severe than
    /// `min_severity` (lower number == more severe, so severity <= min_severity).
    /// Errors are the caller's to count; they never propagate as a handler failure.
    pub async fn dispatch(&self, alert: &Alert) -> Result<bool, DefenseError> {
        let Some(severity) = severity_for(&alert.reason) else {
            return Ok(false);
        };
        if severity > self.min_severity {
            return Ok(false);
        }
        self.transport.send(alert).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_prefix_match_does_not_conflate_similar_reasons() {
        assert_eq!(severity_for("High Combined Score (F)"), Some(1));
        assert_eq!(severity_for("High Combustion Engine"), None);
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(severity_for("High Combined Score (F=0.91)"), Some(1));
    }

    #[test]
    fn unknown_reason_has_no_severity() {
        assert_eq!(severity_for("Manual Review Flag"), None);
    }

    #[tokio::test]
    async fn dispatch_skips_reasons_below_configured_minimum_severity() {
        struct CountingTransport(std::sync::atomic::AtomicUsize);
        #[async_trait]
        impl AlertTransport for CountingTransport {
            async fn send(&self, _alert: &Alert) -> Result<(), DefenseError> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        }

        let transport = Box::new(CountingTransport(std::sync::atomic::AtomicUsize::new(0)));
        let dispatcher = AlertDispatcher::new(transport, 1); // only severity-1 reasons

        let low_severity = Alert {
            reason: "External API Classification".to_string(),
            ip: "10.0.0.1".to_string(),
            message: "test".to_string(),
            timestamp_utc: "2026-01-01T00:00:00Z".to_string(),
        };
        let sent = dispatcher.dispatch(&low_severity).await.unwrap();
        assert!(!sent);

        let high_severity = Alert {
            reason: "High Combined Score (F=0.9)".to_string(),
            ip: "10.0.0.1".to_string(),
            message: "test".to_string(),
            timestamp_utc: "2026-01-01T00:00:00Z".to_string(),
        };
        let sent = dispatcher.dispatch(&high_severity).await.unwrap();
        assert!(sent);
    }
}
