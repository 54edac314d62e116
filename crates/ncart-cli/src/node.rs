//! # Ledger Node Arguments
//!
//! Connection flags shared by every subcommand that talks to a node. Each
//! flag falls back to the same environment variable that
//! [`LedgerConfig::from_env`](ncart_ledger::LedgerConfig::from_env) reads.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use ncart_core::{parse_u32_field, ChecksumPolicy, CodecError, Identity};
use ncart_ledger::{Ledger, LedgerConfig, RpcLedger};
use url::Url;

/// Address check digit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChecksumArg {
    /// Accept addresses whose check digits do not match.
    Lenient,
    /// Reject addresses whose check digits do not match.
    Strict,
}

impl From<ChecksumArg> for ChecksumPolicy {
    fn from(arg: ChecksumArg) -> Self {
        match arg {
            ChecksumArg::Lenient => ChecksumPolicy::Lenient,
            ChecksumArg::Strict => ChecksumPolicy::Strict,
        }
    }
}

/// Ledger node connection flags.
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// JSON-RPC endpoint of the ledger node.
    #[arg(long, env = "NIMIQ_RPC_URL", default_value = "http://localhost:8648")]
    pub rpc_url: Url,

    /// Request timeout in seconds.
    #[arg(long, env = "NIMIQ_RPC_TIMEOUT_SECS", default_value_t = 30)]
    pub rpc_timeout: u64,

    /// Basic-auth user name.
    #[arg(long, env = "NIMIQ_RPC_USERNAME", requires = "rpc_password")]
    pub rpc_username: Option<String>,

    /// Basic-auth password.
    #[arg(long, env = "NIMIQ_RPC_PASSWORD", hide_env_values = true, requires = "rpc_username")]
    pub rpc_password: Option<String>,

    /// Address check digit policy.
    #[arg(long, env = "NIMIQ_ADDRESS_CHECKSUM", value_enum, default_value = "lenient")]
    pub checksum: ChecksumArg,
}

impl NodeArgs {
    /// Check digit policy for address arguments.
    pub fn policy(&self) -> ChecksumPolicy {
        self.checksum.into()
    }

    /// Parse an address argument under the configured policy.
    pub fn identity(&self, flag: &str, value: &str) -> Result<Identity> {
        Identity::parse(value, self.policy()).with_context(|| format!("invalid {flag}: {value:?}"))
    }

    /// Client configuration from these flags.
    pub fn config(&self) -> LedgerConfig {
        LedgerConfig {
            rpc_url: self.rpc_url.clone(),
            timeout_secs: self.rpc_timeout,
            username: self.rpc_username.clone(),
            password: self.rpc_password.clone(),
            checksum_policy: self.policy(),
        }
    }

    /// JSON-RPC client for the configured node.
    pub fn connect(&self) -> Result<Arc<dyn Ledger>> {
        let config = self.config();
        tracing::debug!(?config, "connecting to ledger node");
        let ledger = RpcLedger::new(config).context("failed to build ledger client")?;
        Ok(Arc::new(ledger))
    }
}

/// Value parser for id flags. Decimal digits only: signs, fractions and
/// values above `u32::MAX` are rejected instead of wrapped.
pub fn parse_id(text: &str) -> Result<u32, CodecError> {
    parse_u32_field("id", text)
}

/// Single-threaded runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        node: NodeArgs,
    }

    #[test]
    fn password_is_redacted_in_config_debug() {
        let h = Harness::try_parse_from([
            "t",
            "--rpc-url",
            "http://node:8648",
            "--rpc-username",
            "alice",
            "--rpc-password",
            "hunter2",
        ])
        .unwrap();
        let debug = format!("{:?}", h.node.config());
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn id_parser_rejects_signs_and_overflow() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("-1").is_err());
        assert!(parse_id("+1").is_err());
        assert!(parse_id("1.0").is_err());
        assert!(parse_id("4294967296").is_err());
    }

    #[test]
    fn username_requires_password() {
        assert!(Harness::try_parse_from(["t", "--rpc-username", "alice"]).is_err());
    }

    #[test]
    fn strict_policy_rejects_bad_check_digits() {
        let h = Harness::try_parse_from(["t", "--checksum", "strict"]).unwrap();
        let good = Identity::from_bytes([7; 20]).to_user_friendly();
        assert!(h.node.identity("--address", &good).is_ok());
        let mut bad = good.clone();
        let digits = if &bad[2..4] == "00" { "01" } else { "00" };
        bad.replace_range(2..4, digits);
        assert!(h.node.identity("--address", &bad).is_err());
    }
}
