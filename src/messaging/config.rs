use serde::{Deserialize, Serialize};
use std::env;

/// Where and how ranking events are published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RabbitMqConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// "/" unless `RABBITMQ_VHOST` says otherwise
    pub vhost: String,
    pub port: u16,
    /// Topic exchange; defaults to the routing key
    pub exchange: String,
    pub routing_key: String,
    /// Off by default. While off, credentials may be absent and nothing is published.
    pub enabled: bool
}

const DEFAULT_ROUTING_KEY: &str = "rankings.updated";
const DEFAULT_PORT: u16 = 5672;

impl RabbitMqConfig {
    /// Reads `RABBITMQ_*` variables from the process environment
    pub fn from_env() -> Result<Self, env::VarError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    ///
    /// `RABBITMQ_USERNAME` and `RABBITMQ_PASSWORD` are required only when
    /// `RABBITMQ_ENABLED` is `1`, `true` or `yes`. An unparsable port falls back to 5672.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, env::VarError> {
        let enabled = lookup("RABBITMQ_ENABLED")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let credential = |key: &str| match lookup(key) {
            Some(v) => Ok(v),
            None if enabled => Err(env::VarError::NotPresent),
            None => Ok(String::new())
        };

        let routing_key = lookup("RABBITMQ_ROUTING_KEY").unwrap_or_else(|| DEFAULT_ROUTING_KEY.to_string());

        Ok(Self {
            host: lookup("RABBITMQ_HOST").unwrap_or_else(|| "localhost".to_string()),
            username: credential("RABBITMQ_USERNAME")?,
            password: credential("RABBITMQ_PASSWORD")?,
            vhost: lookup("RABBITMQ_VHOST").unwrap_or_else(|| "/".to_string()),
            port: lookup("RABBITMQ_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            exchange: lookup("RABBITMQ_EXCHANGE").unwrap_or_else(|| routing_key.clone()),
            routing_key,
            enabled
        })
    }

    /// AMQP URL with the vhost percent-encoded
    pub fn connection_url(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.username,
            self.password,
            self.host,
            self.port,
            self.vhost.replace('/', "%2F")
        )
    }
}

impl Default for RabbitMqConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            vhost: "/".to_string(),
            port: DEFAULT_PORT,
            exchange: DEFAULT_ROUTING_KEY.to_string(),
            routing_key: DEFAULT_ROUTING_KEY.to_string(),
            enabled: false
        }
    }
}
