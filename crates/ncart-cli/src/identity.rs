//! # Identity Subcommand
//!
//! Converts between an identity's address string and its 20 raw bytes and
//! checks address check digits.

use anyhow::{bail, Context, Result};
use clap::Args;
use ncart_core::{from_hex, to_hex, ChecksumPolicy, Identity};

/// Arguments for `ncart identity`.
#[derive(Args, Debug)]
pub struct IdentityArgs {
    /// Address string, or 40 hex digits with `--from-hex`.
    pub value: String,

    /// Treat the value as raw identity bytes in hex.
    #[arg(long)]
    pub from_hex: bool,

    /// Reject addresses whose check digits do not match.
    #[arg(long)]
    pub strict: bool,
}

/// Execute the identity subcommand.
pub fn run_identity(args: &IdentityArgs) -> Result<u8> {
    let identity = resolve(args)?;
    println!("Address: {}", identity.to_spaced());
    println!("Compact: {}", identity.to_user_friendly());
    println!("Hex: {}", to_hex(identity.as_bytes()));
    Ok(0)
}

fn resolve(args: &IdentityArgs) -> Result<Identity> {
    if args.from_hex {
        let raw = args.value.trim().trim_start_matches("0x");
        let bytes = from_hex(raw).with_context(|| format!("invalid hex: {:?}", args.value))?;
        let Ok(bytes) = <[u8; Identity::LEN]>::try_from(bytes.as_slice()) else {
            bail!("expected {} bytes, got {}", Identity::LEN, bytes.len());
        };
        return Ok(Identity::from_bytes(bytes));
    }
    let policy = if args.strict {
        ChecksumPolicy::Strict
    } else {
        ChecksumPolicy::Lenient
    };
    Identity::parse(&args.value, policy).with_context(|| format!("invalid address: {:?}", args.value))
}
