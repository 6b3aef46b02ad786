//! CLI module for nodedb
//!
//! Provides command-line tools for:
//! - hash: Content hash of source files
//! - fingerprint: File fingerprint as stored in the index
//! - schema: Layout of the built-in index kinds
//! - verify: Integrity check of a store image

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{fingerprint, hash_files, run, run_command, schema, verify};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::write_response;
