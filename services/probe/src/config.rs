use gemini_realtime::{DEFAULT_ENDPOINT, StaticCredential};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";
pub const DEFAULT_VOICE: &str = "Puck";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct ProbeConfig {
    pub api_key: SecretString,
    pub endpoint: String,
    pub model: String,
    pub voice: String,
    pub handshake_timeout: Duration,
    pub read_timeout: Duration,
    pub log_filter: String,
}

impl ProbeConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let endpoint = std::env::var("GEMINI_LIVE_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        if !endpoint.starts_with("wss://") && !endpoint.starts_with("ws://") {
            return Err(ConfigError::InvalidValue(
                "GEMINI_LIVE_ENDPOINT".to_string(),
                format!("'{endpoint}' is not a ws:// or wss:// URL"),
            ));
        }
        if endpoint.contains("key=") {
            return Err(ConfigError::InvalidValue(
                "GEMINI_LIVE_ENDPOINT".to_string(),
                "the API key belongs in GEMINI_API_KEY, not the endpoint".to_string(),
            ));
        }

        let model =
            std::env::var("GEMINI_LIVE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let voice =
            std::env::var("GEMINI_LIVE_VOICE").unwrap_or_else(|_| DEFAULT_VOICE.to_string());

        let handshake_timeout = secs_var("LIVE_HANDSHAKE_TIMEOUT_SECS", 10)?;
        let read_timeout = secs_var("LIVE_READ_TIMEOUT_SECS", 15)?;

        let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(&log_filter).map_err(|e| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid filter: {}", log_filter, e),
            )
        })?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            endpoint,
            model,
            voice,
            handshake_timeout,
            read_timeout,
            log_filter,
        })
    }

    /// The API key as the `key` query parameter the Live endpoint expects.
    pub fn credential(&self) -> StaticCredential {
        StaticCredential::query_param(
            "key",
            SecretString::from(self.api_key.expose_secret().to_owned()),
        )
    }
}

fn secs_var(var: &str, default: u64) -> Result<Duration, ConfigError> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{}' is not a positive number of seconds", raw),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_realtime::{Credential, CredentialProvider};
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("GEMINI_LIVE_ENDPOINT");
            env::remove_var("GEMINI_LIVE_MODEL");
            env::remove_var("GEMINI_LIVE_VOICE");
            env::remove_var("LIVE_HANDSHAKE_TIMEOUT_SECS");
            env::remove_var("LIVE_READ_TIMEOUT_SECS");
            env::remove_var("RUST_LOG");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let config = ProbeConfig::from_env().expect("Config should load successfully");

        assert_eq!(config.api_key.expose_secret(), "test-gemini-key");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.voice, "Puck");
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(15));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "custom-key");
            env::set_var("GEMINI_LIVE_ENDPOINT", "ws://127.0.0.1:9000/live");
            env::set_var("GEMINI_LIVE_MODEL", "gemini-2.0-flash-live-001");
            env::set_var("GEMINI_LIVE_VOICE", "Kore");
            env::set_var("LIVE_HANDSHAKE_TIMEOUT_SECS", "3");
            env::set_var("LIVE_READ_TIMEOUT_SECS", "30");
            env::set_var("RUST_LOG", "gemini_realtime=debug,info");
        }

        let config = ProbeConfig::from_env().expect("Config should load successfully");

        assert_eq!(config.endpoint, "ws://127.0.0.1:9000/live");
        assert_eq!(config.model, "gemini-2.0-flash-live-001");
        assert_eq!(config.voice, "Kore");
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert_eq!(config.log_filter, "gemini_realtime=debug,info");
    }

    #[test]
    #[serial]
    fn test_config_missing_api_key() {
        clear_env_vars();
        let err = ProbeConfig::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "GEMINI_API_KEY"),
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }

        unsafe {
            env::set_var("GEMINI_API_KEY", "  ");
        }
        assert!(matches!(
            ProbeConfig::from_env(),
            Err(ConfigError::MissingVar(_))
        ));
    }

    #[test]
    #[serial]
    fn test_config_invalid_timeout() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("LIVE_READ_TIMEOUT_SECS", "soon");
        }

        let err = ProbeConfig::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "LIVE_READ_TIMEOUT_SECS"),
            _ => panic!("Expected InvalidValue for LIVE_READ_TIMEOUT_SECS"),
        }

        unsafe {
            env::set_var("LIVE_READ_TIMEOUT_SECS", "0");
        }
        assert!(matches!(
            ProbeConfig::from_env(),
            Err(ConfigError::InvalidValue(..))
        ));
    }

    #[test]
    #[serial]
    fn test_config_rejects_keys_in_endpoint() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("GEMINI_LIVE_ENDPOINT", "wss://host/live?key=leaked");
        }

        let err = ProbeConfig::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "GEMINI_LIVE_ENDPOINT"),
            _ => panic!("Expected InvalidValue for GEMINI_LIVE_ENDPOINT"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_filter() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("RUST_LOG", "gemini_realtime=loud");
        }

        let err = ProbeConfig::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_credential_is_the_key_query_param() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }
        let config = ProbeConfig::from_env().unwrap();
        match config.credential().credential().unwrap() {
            Credential::QueryParam { name, value } => {
                assert_eq!(name, "key");
                assert_eq!(value.expose_secret(), "test-gemini-key");
            }
            other => panic!("unexpected credential: {other:?}"),
        }
    }
}
