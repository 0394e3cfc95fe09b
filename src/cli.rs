//! Command-line interface definitions.
//!
//! Global options are accepted before or after the subcommand.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Blog-aware static site generator
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Source root containing `_config.yml`
    #[arg(short, long, global = true, default_value = ".")]
    pub source: PathBuf,

    /// Output directory (relative to the source root)
    #[arg(short, long, global = true)]
    pub destination: Option<PathBuf>,

    /// Do not load extensions from `_plugins`
    #[arg(long, global = true)]
    pub safe: bool,

    /// Render posts in `_drafts`
    #[arg(short = 'D', long, global = true)]
    pub drafts: bool,

    /// Overwrite a destination that is not marked as ours
    #[arg(long, global = true)]
    pub force: bool,

    /// Keep building after errors and fail at the end
    #[arg(long, global = true)]
    pub keep_going: bool,

    /// Interface to bind on when serving
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Port to serve on
    #[arg(short = 'P', long, global = true)]
    pub port: Option<u16>,

    /// URL prefix the site is served under, e.g. `/blog`
    #[arg(short, long, global = true)]
    pub baseurl: Option<String>,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print the full error chain on failure
    #[arg(short, long, global = true)]
    pub trace: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Wipe the destination and build the site
    Build,

    /// Build the site and serve it until Ctrl+C
    Serve {
        /// Rebuild when sources change
        #[arg(short, long)]
        watch: bool,
    },

    /// Scaffold a new site
    New {
        /// Directory to create, must be missing or empty
        path: PathBuf,
    },
}
