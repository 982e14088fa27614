//! Configuration management for the invoice agent.
//!
//! Configuration is read from environment variables:
//! - `OPENAI_API_KEY` - Required. Key for the chat-completions endpoint.
//! - `OPENAI_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `OPENAI_MODEL` - Optional. Model used by the agent. Defaults to `gpt-4`.
//! - `COMPOSIO_API_KEY` - Required. Connector platform API key.
//! - `COMPOSIO_BASE_URL` - Optional. Defaults to `https://backend.composio.dev/api`.
//! - `COMPOSIO_GMAIL_INTEGRATION_ID` - Optional. Integration used to link a mailbox.
//! - `PAYMAN_API_SECRET` - Required. Payments API secret.
//! - `PAYMAN_BASE_URL` - Optional. Defaults to `https://agent.payman.ai/api`.
//! - `HOST` / `PORT` - Optional. Defaults to `127.0.0.1:8000`.
//! - `MAX_ITERATIONS` - Optional. Agent loop cap. Defaults to `10`.
//! - `HISTORY_CAPACITY` - Optional. Payment history size. Defaults to `100`.
//! - `PAYMENT_MODE` - Optional. `agent` or `direct`. Defaults to `agent`.
//! - `INVOICE_QUERY` / `INVOICE_MAX_RESULTS` - Optional. Default inbox scan.
//! - `DEV_MODE` - Optional. Disables dashboard auth.
//! - `DASHBOARD_PASSWORD`, `JWT_SECRET`, `JWT_TTL_DAYS` - Dashboard login.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// How invoices get paid once they are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    /// The LLM agent drives the payment tools.
    Agent,
    /// Balance check, payee search and send, without the model.
    Direct,
}

impl FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "agent" | "llm" => Ok(Self::Agent),
            "direct" => Ok(Self::Direct),
            other => Err(format!("expected 'agent' or 'direct', got: {}", other)),
        }
    }
}

/// Chat-completions endpoint settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Connector platform settings.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub api_key: String,
    pub base_url: String,
    /// Gmail integration used when linking a mailbox.
    pub gmail_integration_id: Option<String>,
}

/// Payments API settings.
#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub api_secret: String,
    pub base_url: String,
}

/// Default inbox scan parameters.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub query: String,
    pub max_results: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            query: "subject:invoice has:attachment newer_than:7d".to_string(),
            max_results: 10,
        }
    }
}

/// API auth configuration (single-tenant).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Password required by the dashboard to obtain a JWT.
    pub dashboard_password: Option<String>,

    /// HMAC secret for signing/verifying JWTs.
    pub jwt_secret: Option<String>,

    /// JWT validity in days.
    pub jwt_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dashboard_password: None,
            jwt_secret: None,
            jwt_ttl_days: 7,
        }
    }
}

impl AuthConfig {
    /// Whether auth is required for API requests.
    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode && self.dashboard_password.is_some() && self.jwt_secret.is_some()
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub connector: ConnectorConfig,
    pub payments: PaymentsConfig,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Number of payment records kept in memory
    pub history_capacity: usize,

    pub payment_mode: PaymentMode,

    pub scan: ScanConfig,

    /// Development mode (disables auth)
    pub dev_mode: bool,

    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if one of the three upstream
    /// credentials is not set, or if auth secrets are missing outside dev mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm = LlmConfig {
            api_key: required("OPENAI_API_KEY")?,
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4".to_string()),
        };

        let connector = ConnectorConfig {
            api_key: required("COMPOSIO_API_KEY")?,
            base_url: std::env::var("COMPOSIO_BASE_URL")
                .unwrap_or_else(|_| "https://backend.composio.dev/api".to_string()),
            gmail_integration_id: std::env::var("COMPOSIO_GMAIL_INTEGRATION_ID").ok(),
        };

        let payments = PaymentsConfig {
            api_secret: required("PAYMAN_API_SECRET")?,
            base_url: std::env::var("PAYMAN_BASE_URL")
                .unwrap_or_else(|_| "https://agent.payman.ai/api".to_string()),
        };

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parsed("PORT", 8000u16)?;
        let max_iterations = parsed("MAX_ITERATIONS", 10usize)?;
        let history_capacity = parsed("HISTORY_CAPACITY", 100usize)?;
        if history_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "HISTORY_CAPACITY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let payment_mode = std::env::var("PAYMENT_MODE")
            .ok()
            .map(|v| {
                v.parse::<PaymentMode>()
                    .map_err(|e| ConfigError::InvalidValue("PAYMENT_MODE".to_string(), e))
            })
            .transpose()?
            .unwrap_or(PaymentMode::Agent);

        let defaults = ScanConfig::default();
        let scan = ScanConfig {
            query: std::env::var("INVOICE_QUERY").unwrap_or(defaults.query),
            max_results: parsed("INVOICE_MAX_RESULTS", defaults.max_results)?,
        };

        let dev_mode = std::env::var("DEV_MODE")
            .ok()
            .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue("DEV_MODE".to_string(), e)))
            .transpose()?
            // Debug builds default to dev mode, release builds do not.
            .unwrap_or(cfg!(debug_assertions));

        let auth = AuthConfig {
            dashboard_password: std::env::var("DASHBOARD_PASSWORD").ok(),
            jwt_secret: std::env::var("JWT_SECRET").ok(),
            jwt_ttl_days: parsed("JWT_TTL_DAYS", 7i64)?,
        };

        if !dev_mode {
            if auth.dashboard_password.is_none() {
                return Err(ConfigError::MissingEnvVar("DASHBOARD_PASSWORD".to_string()));
            }
            if auth.jwt_secret.is_none() {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
            }
        }

        Ok(Self {
            llm,
            connector,
            payments,
            host,
            port,
            max_iterations,
            history_capacity,
            payment_mode,
            scan,
            dev_mode,
            auth,
        })
    }

    /// Create a dev-mode config pointing at the given upstream base URLs
    /// (useful for testing).
    pub fn new(llm_base_url: String, connector_base_url: String, payments_base_url: String) -> Self {
        Self {
            llm: LlmConfig {
                api_key: "test-openai-key".to_string(),
                base_url: llm_base_url,
                model: "gpt-4".to_string(),
            },
            connector: ConnectorConfig {
                api_key: "test-composio-key".to_string(),
                base_url: connector_base_url,
                gmail_integration_id: Some("gmail-integration".to_string()),
            },
            payments: PaymentsConfig {
                api_secret: "test-payman-secret".to_string(),
                base_url: payments_base_url,
            },
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_iterations: 10,
            history_capacity: 100,
            payment_mode: PaymentMode::Agent,
            scan: ScanConfig::default(),
            dev_mode: true,
            auth: AuthConfig::default(),
        }
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn parsed<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}
