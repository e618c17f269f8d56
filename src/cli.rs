// src/cli.rs
//! CLI definitions for knxkit
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "knxkit")]
#[command(version)]
#[command(about = "Fetch, cache and export KNX device releases", long_about = None)]
pub struct Cli {
    /// Configuration file (default: <config dir>/knxkit/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage root, overrides the configured one
    #[arg(long, global = true)]
    pub storage: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Refresh the release catalog from the remote source
    Refresh {
        /// Include prereleases in the listing
        #[arg(long)]
        prereleases: bool,
    },

    /// List repositories in the cached catalog
    Repos,

    /// List the releases of a repository
    Releases {
        /// Repository name
        repository: String,
    },

    /// Download, extract and register a release
    Acquire {
        /// Repository name
        repository: String,

        /// Release (archive) name, e.g. OGM-1.2.3.zip
        release: String,
    },

    /// List acquired releases and their products
    Local,

    /// Delete an acquired release
    Remove {
        /// Repository name
        repository: String,

        /// Release (archive) name
        release: String,
    },

    /// Sign a product of an acquired release into a .knxprod file
    Export {
        /// Repository name
        repository: String,

        /// Release (archive) name
        release: String,

        /// Product name
        product: String,

        /// Output directory (default: <storage>/Temp)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate an Ed25519 key pair for signing exports
    Keygen {
        /// Private key output path
        private_key: PathBuf,

        /// Public key output path
        public_key: PathBuf,

        /// Key identifier embedded in signatures
        #[arg(long)]
        key_id: Option<String>,

        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_with_globals() {
        let cli = Cli::parse_from([
            "knxkit", "export", "OGM", "OGM-1.2.3.zip", "Logic", "--storage", "/tmp/s", "-v",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.storage, Some(PathBuf::from("/tmp/s")));
        match cli.command {
            Commands::Export {
                repository,
                release,
                product,
                output,
            } => {
                assert_eq!(repository, "OGM");
                assert_eq!(release, "OGM-1.2.3.zip");
                assert_eq!(product, "Logic");
                assert!(output.is_none());
            }
            _ => panic!("expected export"),
        }
    }
}
