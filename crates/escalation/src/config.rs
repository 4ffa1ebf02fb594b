use defense_core::config::{env_bool, env_or, env_string_or, load_secret, required_env, secrets_dir, RedisConfig};
use defense_core::error::DefenseError;
use std::path::PathBuf;

pub struct EscalationConfig {
    pub bind_addr: String,
    pub redis: RedisConfig,
    pub frequency_window_seconds: f64,
    pub frequency_expiry_margin_seconds: i64,

    pub heuristic_threshold_high: f64,
    pub captcha_score_threshold_low: f64,
    pub captcha_score_threshold_high: f64,
    pub enable_captcha_trigger: bool,

    pub enable_ip_reputation: bool,
    pub ip_reputation_api_url: Option<String>,
    pub ip_reputation_api_key: Option<String>,
    pub ip_reputation_timeout_secs: f64,
    pub ip_reputation_min_malicious_threshold: f64,
    pub ip_reputation_malicious_score_bonus: f64,

    pub local_llm_api_url: Option<String>,
    pub local_llm_model: Option<String>,
    pub local_llm_timeout_secs: f64,

    pub external_api_url: Option<String>,
    pub external_api_key: Option<String>,
    pub external_api_timeout_secs: f64,

    pub webhook_url: String,
    pub webhook_timeout_secs: f64,

    pub robots_txt_path: PathBuf,
    pub model_weights_path: Option<PathBuf>,

    pub known_bad_uas: Vec<String>,
    pub known_benign_uas: Vec<String>,

    pub logs_dir: PathBuf,
}

impl EscalationConfig {
    pub fn from_env() -> Result<Self, DefenseError> {
        let secrets = secrets_dir();
        let base = defense_core::config::base_dir();

        let heuristic_threshold_high: f64 = env_or("HEURISTIC_THRESHOLD_HIGH", 0.8);
        let captcha_score_threshold_low: f64 = env_or("CAPTCHA_SCORE_THRESHOLD_LOW", 0.2);
        let captcha_score_threshold_high: f64 = env_or("CAPTCHA_SCORE_THRESHOLD_HIGH", 0.5);
        for (name, value) in [
            ("HEURISTIC_THRESHOLD_HIGH", heuristic_threshold_high),
            ("CAPTCHA_SCORE_THRESHOLD_LOW", captcha_score_threshold_low),
            ("CAPTCHA_SCORE_THRESHOLD_HIGH", captcha_score_threshold_high),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DefenseError::Configuration(format!(
                    "{name} ({value}) must be within [0,1]"
                )));
            }
        }
        if captcha_score_threshold_low > captcha_score_threshold_high {
            return Err(DefenseError::Configuration(format!(
                "CAPTCHA_SCORE_THRESHOLD_LOW ({captcha_score_threshold_low}) must not exceed CAPTCHA_SCORE_THRESHOLD_HIGH ({captcha_score_threshold_high})"
            )));
        }

        let model_weights_filename = env_string_or("RF_MODEL_FILENAME", "bot_detection_model_weights.json");
        let model_weights_path = base.join("models").join(&model_weights_filename);
        let model_weights_path = model_weights_path.exists().then_some(model_weights_path);

        let robots_txt_filename = env_string_or("ROBOTS_TXT_FILENAME", "robots.txt");

        let known_bad_uas_str = env_string_or(
            "KNOWN_BAD_UAS",
            "python-requests,curl,wget,scrapy,java/,ahrefsbot,semrushbot,mj12bot,dotbot,petalbot,bytespider,gptbot,ccbot,claude-web,google-extended,dataprovider,purebot,scan,masscan,zgrab,nmap",
        );
        let known_benign_uas_str = env_string_or(
            "KNOWN_BENIGN_CRAWLERS_UAS",
            "googlebot,bingbot,slurp,duckduckbot,baiduspider,yandexbot,googlebot-image,applebot",
        );

        Ok(Self {
            bind_addr: required_env("ESCALATION_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string()),
            redis: RedisConfig::from_env("REDIS_DB_FREQUENCY", 3, &secrets),
            frequency_window_seconds: env_or("FREQUENCY_WINDOW_SECONDS", 300.0),
            frequency_expiry_margin_seconds: env_or("FREQUENCY_EXPIRY_MARGIN_SECONDS", 60),

            heuristic_threshold_high,
            captcha_score_threshold_low,
            captcha_score_threshold_high,
            enable_captcha_trigger: env_bool("ENABLE_CAPTCHA_TRIGGER", false),

            enable_ip_reputation: env_bool("ENABLE_IP_REPUTATION", false),
            ip_reputation_api_url: std::env::var("IP_REPUTATION_API_URL").ok(),
            ip_reputation_api_key: load_secret(
                &secrets,
                &env_string_or("IP_REPUTATION_API_KEY_FILENAME", "ip_reputation_api_key.txt"),
            ),
            ip_reputation_timeout_secs: env_or("IP_REPUTATION_TIMEOUT", 10.0),
            ip_reputation_min_malicious_threshold: env_or("IP_REPUTATION_MIN_MALICIOUS_THRESHOLD", 50.0),
            ip_reputation_malicious_score_bonus: env_or("IP_REPUTATION_MALICIOUS_SCORE_BONUS", 0.3),

            local_llm_api_url: std::env::var("LOCAL_LLM_API_URL").ok(),
            local_llm_model: std::env::var("LOCAL_LLM_MODEL").ok(),
            local_llm_timeout_secs: env_or("LOCAL_LLM_TIMEOUT", 45.0),

            external_api_url: std::env::var("EXTERNAL_CLASSIFICATION_API_URL").ok(),
            external_api_key: load_secret(
                &secrets,
                &env_string_or("EXTERNAL_API_KEY_FILENAME", "external_api_key.txt"),
            ),
            external_api_timeout_secs: env_or("EXTERNAL_API_TIMEOUT", 15.0),

            webhook_url: env_string_or("ESCALATION_WEBHOOK_URL", "http://localhost:8082/analyze"),
            webhook_timeout_secs: env_or("ESCALATION_WEBHOOK_TIMEOUT", 10.0),

            robots_txt_path: base.join("config").join(robots_txt_filename),
            model_weights_path,

            known_bad_uas: known_bad_uas_str
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            known_benign_uas: known_benign_uas_str
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),

            logs_dir: defense_core::config::logs_dir(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captcha_low_above_high_is_a_configuration_error() {
        std::env::set_var("CAPTCHA_SCORE_THRESHOLD_LOW", "0.9");
        std::env::set_var("CAPTCHA_SCORE_THRESHOLD_HIGH", "0.1");
        let result = EscalationConfig::from_env();
        std::env::remove_var("CAPTCHA_SCORE_THRESHOLD_LOW");
        std::env::remove_var("CAPTCHA_SCORE_THRESHOLD_HIGH");
        assert!(matches!(result, Err(DefenseError::Configuration(_))));
    }

    #[test]
    fn threshold_outside_unit_interval_is_a_configuration_error() {
        std::env::set_var("HEURISTIC_THRESHOLD_HIGH", "1.5");
        let result = EscalationConfig::from_env();
        std::env::remove_var("HEURISTIC_THRESHOLD_HIGH");
        assert!(matches!(result, Err(DefenseError::Configuration(_))));
    }
}
