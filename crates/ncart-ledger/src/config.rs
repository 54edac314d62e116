//! Ledger RPC client configuration.
//!
//! Points at a single JSON-RPC endpoint. Defaults target a local node.
//! Override via environment variables or explicit construction for tests.

use ncart_core::ChecksumPolicy;
use url::Url;

/// Configuration for connecting to a ledger node.
///
/// Custom `Debug` implementation redacts the `password` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint.
    /// Default: <http://localhost:8648>
    pub rpc_url: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Basic-auth user name, if the node requires one.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Whether address strings must carry valid check digits.
    pub checksum_policy: ChecksumPolicy,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("rpc_url", &self.rpc_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("checksum_policy", &self.checksum_policy)
            .finish()
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `NIMIQ_RPC_URL` (default: `http://localhost:8648`)
    /// - `NIMIQ_RPC_TIMEOUT_SECS` (default: 30)
    /// - `NIMIQ_RPC_USERNAME` / `NIMIQ_RPC_PASSWORD` (optional, both or neither)
    /// - `NIMIQ_ADDRESS_CHECKSUM` (`lenient` or `strict`, default: `lenient`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let username = std::env::var("NIMIQ_RPC_USERNAME").ok().filter(|s| !s.is_empty());
        let password = std::env::var("NIMIQ_RPC_PASSWORD").ok().filter(|s| !s.is_empty());
        if username.is_some() != password.is_some() {
            return Err(ConfigError::IncompleteCredentials);
        }

        let checksum_policy = match std::env::var("NIMIQ_ADDRESS_CHECKSUM") {
            Ok(v) => parse_policy(&v)?,
            Err(_) => ChecksumPolicy::default(),
        };

        Ok(Self {
            rpc_url: env_url("NIMIQ_RPC_URL", "http://localhost:8648")?,
            timeout_secs: std::env::var("NIMIQ_RPC_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            username,
            password,
            checksum_policy,
        })
    }

    /// Create a configuration pointing to a local mock server (for testing).
    pub fn local(port: u16) -> Result<Self, ConfigError> {
        let rpc_url = Url::parse(&format!("http://127.0.0.1:{port}"))
            .map_err(|e| ConfigError::InvalidUrl("localhost".to_string(), e.to_string()))?;
        Ok(Self {
            rpc_url,
            timeout_secs: 5,
            username: None,
            password: None,
            checksum_policy: ChecksumPolicy::Lenient,
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn parse_policy(raw: &str) -> Result<ChecksumPolicy, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "lenient" => Ok(ChecksumPolicy::Lenient),
        "strict" => Ok(ChecksumPolicy::Strict),
        other => Err(ConfigError::InvalidChecksumPolicy(other.to_string())),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A URL variable does not parse.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    /// Only one of user name and password is set.
    #[error("NIMIQ_RPC_USERNAME and NIMIQ_RPC_PASSWORD must be set together")]
    IncompleteCredentials,
    /// Unrecognized checksum policy.
    #[error("invalid address checksum policy \"{0}\" (expected lenient or strict)")]
    InvalidChecksumPolicy(String),
}
