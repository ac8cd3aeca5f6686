use std::str::FromStr;
use std::time::Duration;

use tunesmith_pipeline::OrchestratorConfig;
use tunesmith_storage::http::StorageConfig;
use tunesmith_vendor::assist::{
    AssistConfig, DEFAULT_ASSIST_BASE_URL, DEFAULT_ASSIST_MODEL, DEFAULT_IMAGE_MODEL,
};
use tunesmith_vendor::client::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use tunesmith_vendor::VendorConfig;

/// Configuration errors reported at startup.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Every required variable that is unset or blank, in declaration order.
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingSecrets(Vec<String>),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Server configuration loaded from environment variables.
///
/// Everything except the four secrets has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for in-flight generations on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub database_url: String,
    /// Generation vendor endpoint and credentials.
    pub vendor: VendorConfig,
    /// Blob storage endpoint and credentials.
    pub storage: StorageConfig,
    /// Polling cadence and retry behaviour.
    pub orchestrator: OrchestratorConfig,
    /// AI gateway; `None` disables `POST /generate-prompt`,
    /// `POST /generate-thumbnail` and `POST /generate-video`.
    pub assist: Option<AssistConfig>,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                       | Default                    |
    /// |-------------------------------|----------------------------|
    /// | `HOST`                        | `0.0.0.0`                  |
    /// | `PORT`                        | `3000`                     |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                       |
    /// | `DATABASE_URL`                | required                   |
    /// | `VENDOR_API_KEY`              | required                   |
    /// | `VENDOR_BASE_URL`             | `https://api.kie.ai`       |
    /// | `VENDOR_MODEL`                | `V3_5`                     |
    /// | `VENDOR_REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `STORAGE_URL`                 | required                   |
    /// | `STORAGE_SERVICE_KEY`         | required                   |
    /// | `STORAGE_BUCKET`              | `music`                    |
    /// | `POLL_INTERVAL_SECS`          | `5`                        |
    /// | `MAX_POLL_ATTEMPTS`           | `36`                       |
    /// | `SESSION_IDLE_TTL_SECS`       | `1800`                     |
    /// | `PROMPT_ASSIST_API_KEY`       | unset (assistant disabled) |
    /// | `PROMPT_ASSIST_BASE_URL`      | gateway default            |
    /// | `PROMPT_ASSIST_MODEL`         | gateway default            |
    /// | `PROMPT_ASSIST_IMAGE_MODEL`   | gateway default            |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Blank values count as unset. All missing secrets are reported in a
    /// single [`ConfigError::MissingSecrets`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut missing = Vec::new();
        let mut require = |var: &str| {
            get(var).unwrap_or_else(|| {
                missing.push(var.to_string());
                String::new()
            })
        };
        let database_url = require("DATABASE_URL");
        let vendor_api_key = require("VENDOR_API_KEY");
        let storage_url = require("STORAGE_URL");
        let storage_service_key = require("STORAGE_SERVICE_KEY");
        if !missing.is_empty() {
            return Err(ConfigError::MissingSecrets(missing));
        }

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&get, "PORT", 3000)?;

        let cors_origins: Vec<String> = get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_or(&get, "REQUEST_TIMEOUT_SECS", 30)?;
        let shutdown_timeout_secs: u64 = parse_or(&get, "SHUTDOWN_TIMEOUT_SECS", 30)?;
        let outbound_timeout =
            Duration::from_secs(parse_or(&get, "VENDOR_REQUEST_TIMEOUT_SECS", 30)?);

        let vendor = VendorConfig {
            base_url: get("VENDOR_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            api_key: vendor_api_key,
            model: get("VENDOR_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            request_timeout: outbound_timeout,
        };

        let storage = StorageConfig {
            url: storage_url,
            service_key: storage_service_key,
            bucket: get("STORAGE_BUCKET").unwrap_or_else(|| "music".into()),
            request_timeout: outbound_timeout,
        };

        let poll_interval_secs: u64 = parse_or(&get, "POLL_INTERVAL_SECS", 5)?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_SECS",
                reason: "must be at least 1".into(),
            });
        }
        let max_poll_attempts: u32 = parse_or(&get, "MAX_POLL_ATTEMPTS", 36)?;
        if max_poll_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_POLL_ATTEMPTS",
                reason: "must be at least 1".into(),
            });
        }
        let session_ttl_secs: u64 = parse_or(&get, "SESSION_IDLE_TTL_SECS", 1800)?;
        if session_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "SESSION_IDLE_TTL_SECS",
                reason: "must be at least 1".into(),
            });
        }
        let orchestrator =
            OrchestratorConfig::new(Duration::from_secs(poll_interval_secs), max_poll_attempts)
                .with_session_ttl(Duration::from_secs(session_ttl_secs));

        let assist = get("PROMPT_ASSIST_API_KEY").map(|api_key| AssistConfig {
            base_url: get("PROMPT_ASSIST_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ASSIST_BASE_URL.into()),
            api_key,
            model: get("PROMPT_ASSIST_MODEL").unwrap_or_else(|| DEFAULT_ASSIST_MODEL.into()),
            image_model: get("PROMPT_ASSIST_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.into()),
            request_timeout: outbound_timeout,
        });

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url,
            vendor,
            storage,
            orchestrator,
            assist,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("'{raw}': {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn secrets() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgres://localhost/tunesmith"),
            ("VENDOR_API_KEY", "vendor-key"),
            ("STORAGE_URL", "https://project.supabase.co"),
            ("STORAGE_SERVICE_KEY", "service-key"),
        ]
    }

    fn load(vars: HashMap<String, String>) -> Result<ServerConfig, ConfigError> {
        ServerConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secrets_are_set() {
        let config = load(env(&secrets())).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.vendor.base_url, "https://api.kie.ai");
        assert_eq!(config.vendor.model, "V3_5");
        assert_eq!(config.storage.bucket, "music");
        assert_eq!(config.orchestrator.poll_interval, Duration::from_secs(5));
        assert_eq!(config.orchestrator.max_poll_attempts, 36);
        assert_eq!(config.orchestrator.session_ttl, Duration::from_secs(1800));
        assert!(config.assist.is_none());
    }

    #[test]
    fn every_missing_secret_is_reported_at_once() {
        let err = load(env(&[("VENDOR_API_KEY", "k"), ("STORAGE_URL", "  ")])).unwrap_err();

        assert_eq!(
            err,
            ConfigError::MissingSecrets(vec![
                "DATABASE_URL".into(),
                "STORAGE_URL".into(),
                "STORAGE_SERVICE_KEY".into(),
            ])
        );
        assert!(err.to_string().contains("DATABASE_URL, STORAGE_URL"));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let mut vars = secrets();
        vars.push(("PORT", "eighty"));
        assert_matches!(load(env(&vars)), Err(ConfigError::Invalid { var: "PORT", .. }));

        let mut vars = secrets();
        vars.push(("MAX_POLL_ATTEMPTS", "0"));
        assert_matches!(
            load(env(&vars)),
            Err(ConfigError::Invalid { var: "MAX_POLL_ATTEMPTS", .. })
        );
    }

    #[test]
    fn overrides_are_honoured() {
        let mut vars = secrets();
        vars.extend([
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("POLL_INTERVAL_SECS", "2"),
            ("MAX_POLL_ATTEMPTS", "10"),
            ("SESSION_IDLE_TTL_SECS", "60"),
            ("VENDOR_MODEL", "V4"),
            ("PROMPT_ASSIST_API_KEY", "assist-key"),
        ]);
        let config = load(env(&vars)).unwrap();

        assert_eq!(
            config.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.orchestrator.poll_interval, Duration::from_secs(2));
        assert_eq!(config.orchestrator.max_poll_attempts, 10);
        assert_eq!(config.orchestrator.session_ttl, Duration::from_secs(60));
        assert_eq!(config.vendor.model, "V4");
        let assist = config.assist.unwrap();
        assert_eq!(assist.api_key, "assist-key");
        assert_eq!(assist.model, "google/gemini-2.5-flash");
        assert_eq!(assist.image_model, "google/gemini-2.5-flash-image-preview");
    }
}
