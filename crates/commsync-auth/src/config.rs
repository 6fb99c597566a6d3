use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use commsync_core::util::{is_http_url, normalize_text_option};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// `None` when either Supabase variable is unset; requests then fail with
    /// a configuration error instead of the process refusing to start.
    pub supabase: Option<SupabaseCredentials>,
    pub http_timeout: Duration,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseCredentials {
    pub url: String,
    pub service_role_key: String,
}

impl fmt::Debug for SupabaseCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SupabaseCredentials")
            .field("url", &self.url)
            .field("service_role_key", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("supabase", &self.supabase)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "COMMSYNC_AUTH_BIND_ADDR", "127.0.0.1:8080");

        let supabase_url = optional_trimmed(&lookup, "SUPABASE_URL")
            .map(|url| url.trim_end_matches('/').to_string());
        if let Some(url) = supabase_url.as_deref() {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(
                    "SUPABASE_URL must start with http:// or https://".to_string(),
                ));
            }
        }
        let service_role_key = optional_trimmed(&lookup, "SUPABASE_SERVICE_ROLE_KEY");
        let supabase = match (supabase_url, service_role_key) {
            (Some(url), Some(service_role_key)) => Some(SupabaseCredentials {
                url,
                service_role_key,
            }),
            _ => None,
        };

        let timeout_secs = value_or_default(&lookup, "AUTH_HTTP_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "AUTH_HTTP_TIMEOUT_SECS must be an integer in [1, 60]".to_string(),
                )
            })?;
        if !(1..=60).contains(&timeout_secs) {
            return Err(ConfigError::Invalid(
                "AUTH_HTTP_TIMEOUT_SECS must be in [1, 60]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            supabase,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Fail fast when the deployment requires Supabase credentials.
    pub fn require_supabase(&self) -> Result<&SupabaseCredentials, ConfigError> {
        self.supabase
            .as_ref()
            .ok_or(ConfigError::MissingVar("SUPABASE_SERVICE_ROLE_KEY"))
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}
