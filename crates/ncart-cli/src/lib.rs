//! # ncart-cli: Cartridge Command-Line Tool
//!
//! Provides the `ncart` binary.
//!
//! ## Subcommands
//!
//! - `ncart preview`: Encode a file into records and print the plan. Offline.
//! - `ncart upload`: Publish a file as a cartridge.
//! - `ncart sync`: Rebuild and verify a cartridge from its identity.
//! - `ncart inspect`: Show a cartridge identity's header and records.
//! - `ncart catalog`: Next app id, title lookup, entry listing.
//! - `ncart identity`: Address and raw byte conversion.
//! - `ncart cache`: List and clear the local cartridge cache.
//!
//! ```bash
//! ncart preview keen.zip --app-id 4 --cartridge-id 1700000000 \
//!     --title "Keen" --semver 1.0.0 --cartridge-address "NQ.." --out-dir payloads
//! ncart upload keen.zip --title Keen --sender "NQ.." --cartridge-address "NQ.." --catalog test
//! ncart sync "NQ.." --out keen.zip
//! ```
//!
//! Every handler returns the process exit code. 0 is success, 1 a hard
//! error, 2 a partial result that a later run can complete.

pub mod cache;
pub mod catalog;
pub mod identity;
pub mod inspect;
pub mod node;
pub mod preview;
pub mod sync;
pub mod upload;
