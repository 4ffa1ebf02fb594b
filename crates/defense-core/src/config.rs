// Shared configuration helpers (SPEC_FULL.md §10.1). Each binary assembles
// its own typed Config struct out of these — see tarpit::config,
// escalation::config, webhook::config.

use crate::error::DefenseError;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub fn required_env(key: &str) -> Result<String, DefenseError> {
    env::var(key).map_err(|_| DefenseError::Configuration(format!("missing required env var {key}")))
}

pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn env_string_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

/// Loads a secret from `<APP_SECRETS_DIRECTORY>/<filename>`, trimmed. Returns
/// `None` (never an error) if the file is missing or empty — callers treat a
/// missing secret as "that feature stays disabled," per the Configuration
/// error kind in SPEC_FULL.md §7.
pub fn load_secret(secrets_dir: &Path, filename: &str) -> Option<String> {
    let path = secrets_dir.join(filename);
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let trimmed = contents.trim();
            if trimmed.is_empty() {
                tracing::warn!(path = %path.display(), "secret file is empty");
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => {
            tracing::debug!(path = %path.display(), "secret file not found");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
}

impl RedisConfig {
    pub fn from_env(db_env_key: &str, default_db: i64, secrets_dir: &Path) -> Self {
        let password_filename = env_string_or("REDIS_PASSWORD_FILENAME", "redis_password.txt");
        RedisConfig {
            host: env_string_or("REDIS_HOST", "localhost"),
            port: env_or("REDIS_PORT", 6379),
            db: env_or(db_env_key, default_db),
            password: load_secret(secrets_dir, &password_filename),
        }
    }

    pub fn connection_url(&self) -> String {
        match &self.password {
            Some(pw) => format!("redis://:{}@{}:{}/{}", pw, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

pub fn base_dir() -> PathBuf {
    PathBuf::from(env_string_or("APP_BASE_DIRECTORY", "."))
}

pub fn secrets_dir() -> PathBuf {
    PathBuf::from(env_string_or("APP_SECRETS_DIRECTORY", "./secrets"))
}

pub fn logs_dir() -> PathBuf {
    base_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_default_when_unset_or_unparseable() {
        assert_eq!(env_or::<u32>("DEFENSE_CORE_TEST_UNSET_KEY", 42), 42);
    }

    #[test]
    fn env_bool_recognizes_truthy_strings() {
        env::set_var("DEFENSE_CORE_TEST_BOOL", "TRUE");
        assert!(env_bool("DEFENSE_CORE_TEST_BOOL", false));
        env::remove_var("DEFENSE_CORE_TEST_BOOL");
        assert!(!env_bool("DEFENSE_CORE_TEST_BOOL", false));
    }

    #[test]
    fn load_secret_trims_and_rejects_empty() {
        let dir = std::env::temp_dir().join(format!("defense-core-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("ok.txt"), "  hunter2  \n").unwrap();
        std::fs::write(dir.join("empty.txt"), "   \n").unwrap();

        assert_eq!(load_secret(&dir, "ok.txt"), Some("hunter2".to_string()));
        assert_eq!(load_secret(&dir, "empty.txt"), None);
        assert_eq!(load_secret(&dir, "missing.txt"), None);

        std::fs::remove_dir_all(&dir).ok();
    }
}
