//! Error kinds raised by the build pipeline.
//!
//! Orchestration code works with `anyhow::Result`; these types are the
//! concrete causes callers can `downcast_ref` to.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed front matter, configuration or extension descriptors.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("front matter in `{0}` has no closing `---` line")]
    Unterminated(PathBuf),

    #[error("front matter in `{0}` is not a mapping")]
    NotAMapping(PathBuf),

    #[error("invalid YAML in `{0}`")]
    Yaml(PathBuf, #[source] serde_yaml_ng::Error),

    #[error("`{0}` is not valid UTF-8")]
    Encoding(PathBuf),

    #[error("invalid date `{value}` in `{path}`")]
    Date { path: PathBuf, value: String },
}

/// Failures while expanding a page or one of its layouts.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot load layout `{name}` for `{path}`: {layout} not found")]
    MissingLayout {
        name: String,
        path: String,
        layout: PathBuf,
    },

    #[error("layout chain of `{path}` is deeper than {depth} levels (cycle?): {chain}")]
    LayoutCycle {
        path: String,
        depth: usize,
        chain: String,
    },

    #[error("cannot render `{path}`: {message}")]
    Render { path: String, message: String },

    #[error("{failed} of {total} pages failed to render")]
    PagesFailed { failed: usize, total: usize },
}

/// Fatal configuration problems, raised before any output is written.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("cannot merge `{left}` and `{right}`")]
    Merge { left: String, right: String },

    #[error(
        "use --force to overwrite the contents of `{0}`, it is not marked as a destination directory yet"
    )]
    UnmarkedDestination(PathBuf),

    #[error("Config validation error: {0}")]
    Validation(String),
}
