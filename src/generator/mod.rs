//! Built-in generators writing the destination tree.
//!
//! | Generator | Output                                        |
//! |-----------|-----------------------------------------------|
//! | `pages`   | rendered posts and pages (unless unpublished) |
//! | `files`   | byte-for-byte copies of static files          |

pub mod files;
pub mod pages;

use crate::utils::url::url_to_path;
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Destination path of a URL, with parent directories created.
pub fn prepare_output(destination: &Path, url: &str) -> Result<PathBuf> {
    let output = destination.join(url_to_path(url));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(output)
}
