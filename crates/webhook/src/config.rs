use defense_core::alert::{severity_for, SmtpConfig};
use defense_core::config::{env_bool, env_or, env_string_or, load_secret, required_env, secrets_dir, RedisConfig};
use defense_core::error::DefenseError;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertMethod {
    Webhook,
    Slack,
    Smtp,
    None,
}

impl AlertMethod {
    fn from_env_value(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "webhook" => AlertMethod::Webhook,
            "slack" => AlertMethod::Slack,
            "smtp" => AlertMethod::Smtp,
            _ => AlertMethod::None,
        }
    }
}

pub struct WebhookConfig {
    pub bind_addr: String,
    pub redis: RedisConfig,
    pub blocklist_ttl_seconds: u64,

    pub alert_method: AlertMethod,
    pub alert_min_severity: u8,
    pub generic_webhook_url: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub smtp: Option<SmtpConfig>,

    pub enable_community_reporting: bool,
    pub community_report_url: Option<String>,
    pub community_report_api_key: Option<String>,
    pub community_report_timeout_secs: f64,

    pub logs_dir: PathBuf,
}

impl WebhookConfig {
    pub fn from_env() -> Result<Self, DefenseError> {
        let secrets = secrets_dir();

        let alert_method = AlertMethod::from_env_value(&env_string_or("ALERT_METHOD", "none"));
        let alert_min_reason = env_string_or("ALERT_MIN_REASON_SEVERITY", "Local LLM");
        let alert_min_severity = severity_for(&alert_min_reason).ok_or_else(|| {
            DefenseError::Configuration(format!(
                "ALERT_MIN_REASON_SEVERITY ({alert_min_reason}) does not match any known severity prefix"
            ))
        })?;

        let smtp = if alert_method == AlertMethod::Smtp {
            Some(SmtpConfig {
                host: required_env("SMTP_HOST")?,
                port: env_or("SMTP_PORT", 587),
                username: std::env::var("SMTP_USERNAME").ok(),
                password: load_secret(&secrets, &env_string_or("SMTP_PASSWORD_FILENAME", "smtp_password.txt")),
                from: required_env("SMTP_FROM_ADDRESS")?,
                to: required_env("SMTP_TO_ADDRESS")?,
            })
        } else {
            None
        };

        Ok(Self {
            bind_addr: required_env("WEBHOOK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8082".to_string()),
            redis: RedisConfig::from_env("REDIS_DB_BLOCKLIST", 2, &secrets),
            blocklist_ttl_seconds: env_or("BLOCKLIST_TTL_SECONDS", 86_400),

            alert_method,
            alert_min_severity,
            generic_webhook_url: std::env::var("ALERT_WEBHOOK_URL").ok(),
            slack_webhook_url: std::env::var("ALERT_SLACK_WEBHOOK_URL").ok(),
            smtp,

            enable_community_reporting: env_bool("ENABLE_COMMUNITY_REPORTING", false),
            community_report_url: std::env::var("COMMUNITY_REPORT_URL").ok(),
            community_report_api_key: load_secret(
                &secrets,
                &env_string_or("COMMUNITY_REPORT_API_KEY_FILENAME", "community_report_api_key.txt"),
            ),
            community_report_timeout_secs: env_or("COMMUNITY_REPORT_TIMEOUT", 10.0),

            logs_dir: defense_core::config::logs_dir(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_alert_method_defaults_to_none() {
        assert_eq!(AlertMethod::from_env_value("bogus"), AlertMethod::None);
    }

    #[test]
    fn alert_method_parsing_is_case_insensitive() {
        assert_eq!(AlertMethod::from_env_value("SLACK"), AlertMethod::Slack);
    }

    #[test]
    fn unrecognised_min_severity_reason_is_a_configuration_error() {
        std::env::set_var("ALERT_MIN_REASON_SEVERITY", "Not A Real Reason");
        let result = WebhookConfig::from_env();
        std::env::remove_var("ALERT_MIN_REASON_SEVERITY");
        assert!(matches!(result, Err(DefenseError::Configuration(_))));
    }
}
