use defense_core::config::{env_bool, env_or, env_string_or, required_env, secrets_dir, RedisConfig};
use defense_core::error::DefenseError;
use std::path::PathBuf;

pub struct TarpitConfig {
    pub bind_addr: String,
    pub redis: RedisConfig,
    pub markov_db_host: String,
    pub markov_db_port: u16,
    pub markov_db_name: String,
    pub markov_db_user: String,
    pub markov_db_password: Option<String>,
    pub system_seed: String,
    pub min_delay_sec: f64,
    pub max_delay_sec: f64,
    pub max_hops: u64,
    pub hop_window_seconds: u64,
    pub blocklist_ttl_seconds: u64,
    pub flag_ttl_seconds: u64,
    pub hop_check_enabled: bool,
    pub escalation_url: String,
    pub logs_dir: PathBuf,
}

impl TarpitConfig {
    pub fn from_env() -> Result<Self, DefenseError> {
        let secrets = secrets_dir();
        let min_delay_sec: f64 = env_or("TAR_PIT_MIN_DELAY_SEC", 0.5);
        let max_delay_sec: f64 = env_or("TAR_PIT_MAX_DELAY_SEC", 2.0);
        if min_delay_sec > max_delay_sec {
            return Err(DefenseError::Configuration(format!(
                "TAR_PIT_MIN_DELAY_SEC ({min_delay_sec}) must not exceed TAR_PIT_MAX_DELAY_SEC ({max_delay_sec})"
            )));
        }

        Ok(Self {
            bind_addr: required_env("TAR_PIT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            redis: RedisConfig::from_env("REDIS_DB_TARPIT", 0, &secrets),
            markov_db_host: env_string_or("MARKOV_DB_HOST", "localhost"),
            markov_db_port: env_or("MARKOV_DB_PORT", 5432),
            markov_db_name: env_string_or("MARKOV_DB_NAME", "markov"),
            markov_db_user: env_string_or("MARKOV_DB_USER", "markov"),
            markov_db_password: defense_core::config::load_secret(
                &secrets,
                &env_string_or("MARKOV_DB_PASSWORD_FILENAME", "markov_db_password.txt"),
            ),
            system_seed: env_string_or("SYSTEM_SEED", "change-me"),
            min_delay_sec,
            max_delay_sec,
            max_hops: env_or("TAR_PIT_MAX_HOPS", 50),
            hop_window_seconds: env_or("TAR_PIT_HOP_WINDOW_SECONDS", 60),
            blocklist_ttl_seconds: env_or("BLOCKLIST_TTL_SECONDS", 86_400),
            flag_ttl_seconds: env_or("TARPIT_FLAG_TTL_SECONDS", 300),
            hop_check_enabled: env_bool("TAR_PIT_HOP_CHECK_ENABLED", true),
            escalation_url: env_string_or("ESCALATION_URL", "http://localhost:8081/escalate"),
            logs_dir: defense_core::config::logs_dir(),
        })
    }
}
