//! CLI argument definitions using clap
//!
//! Commands:
//! - nodedb hash <FILE>...
//! - nodedb fingerprint <FILE>
//! - nodedb schema
//! - nodedb verify --image <PATH>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// nodedb - schema-driven node database for code indexes
#[derive(Parser, Debug)]
#[command(name = "nodedb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the content hash of each file
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the fingerprint (time, size, hash) of a file
    Fingerprint {
        /// File to fingerprint
        file: PathBuf,
    },

    /// Print the built-in index schema: tags, kinds and field offsets
    Schema,

    /// Check a store image for corruption
    Verify {
        /// Path to the image file
        #[arg(long)]
        image: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
