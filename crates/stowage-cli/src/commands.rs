//! CLI command definitions.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Restore the outputs cached under a hash
    Fetch {
        /// Content hash of the task inputs
        hash: String,
    },

    /// Cache files under a hash
    Put {
        /// Content hash of the task inputs
        hash: String,

        /// Files or directories, relative to the working directory
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show and validate the resolved storage configuration
    Config,
}
