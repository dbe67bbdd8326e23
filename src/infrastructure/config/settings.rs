use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub push: PushProviderConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Directory backend: "memory" or "postgres"
    #[serde(default = "default_directory_backend")]
    pub backend: String,
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushProviderConfig {
    /// Base URL of the push provider API
    #[serde(default = "default_push_api_url")]
    pub api_url: String,
    /// Optional bearer token for the provider API
    pub access_token: Option<String>,
    /// Maximum addresses per submission call
    #[serde(default = "default_push_chunk_size")]
    pub chunk_size: usize,
    /// Maximum ticket ids per receipt lookup call
    #[serde(default = "default_receipt_chunk_size")]
    pub receipt_chunk_size: usize,
    /// Request timeout in seconds
    #[serde(default = "default_push_request_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Maximum concurrent per-address sends
    #[serde(default = "default_email_concurrency")]
    pub max_concurrent_sends: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    /// Maximum chunks submitted to the push provider concurrently
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,
    /// Total submission attempts per chunk (1 = no retry)
    #[serde(default = "default_submit_attempts")]
    pub submit_attempts: u32,
    /// Delay before receipts are first fetched for a submitted batch
    #[serde(default = "default_receipt_delay")]
    pub receipt_delay_seconds: u64,
    /// Upper bound on a single receipt-chunk lookup
    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout_seconds: u64,
    /// Confirmation worker poll interval
    #[serde(default = "default_confirm_poll_interval")]
    pub confirm_poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_otel_service_name")]
    pub service_name: String,
    #[serde(default = "default_otel_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_directory_backend() -> String {
    "memory".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/clubhouse".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300
}

fn default_push_api_url() -> String {
    "https://exp.host/--/api/v2".to_string()
}

fn default_push_chunk_size() -> usize {
    100
}

fn default_receipt_chunk_size() -> usize {
    300
}

fn default_push_request_timeout() -> u64 {
    10
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "events@clubhouse.example".to_string()
}

fn default_from_name() -> String {
    "Clubhouse Events".to_string()
}

fn default_email_concurrency() -> usize {
    8
}

fn default_max_concurrent_chunks() -> usize {
    4
}

fn default_submit_attempts() -> u32 {
    2
}

fn default_receipt_delay() -> u64 {
    30
}

fn default_receipt_timeout() -> u64 {
    5
}

fn default_confirm_poll_interval() -> u64 {
    5
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "clubhouse-broadcast-service".to_string()
}

fn default_otel_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("database.backend", "memory")?
            .set_default("push.api_url", "https://exp.host/--/api/v2")?
            .set_default("push.chunk_size", 100)?
            .set_default("push.receipt_chunk_size", 300)?
            .set_default("broadcast.receipt_delay_seconds", 30)?
            .set_default("broadcast.confirm_poll_interval_seconds", 5)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, JWT_SECRET, DATABASE_URL, PUSH_API_URL, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_directory_backend(),
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for PushProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_push_api_url(),
            access_token: None,
            chunk_size: default_push_chunk_size(),
            receipt_chunk_size: default_receipt_chunk_size(),
            request_timeout_seconds: default_push_request_timeout(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
            from_name: default_from_name(),
            max_concurrent_sends: default_email_concurrency(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_concurrent_chunks: default_max_concurrent_chunks(),
            submit_attempts: default_submit_attempts(),
            receipt_delay_seconds: default_receipt_delay(),
            receipt_timeout_seconds: default_receipt_timeout(),
            confirm_poll_interval_seconds: default_confirm_poll_interval(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_otel_service_name(),
            sampling_ratio: default_otel_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8082);

        let push = PushProviderConfig::default();
        assert_eq!(push.chunk_size, 100);
        assert_eq!(push.receipt_chunk_size, 300);

        let broadcast = BroadcastConfig::default();
        assert_eq!(broadcast.submit_attempts, 2);
        assert_eq!(broadcast.receipt_delay_seconds, 30);
    }

    #[test]
    fn test_directory_backend_default() {
        let db = DatabaseConfig::default();
        assert_eq!(db.backend, "memory");
    }
}
