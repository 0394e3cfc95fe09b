//! Source path classification for loading and watch mode.
//!
//! All paths are relative to the source root and `/`-separated.
//!
//! | Question                | Rule                                                   |
//! |-------------------------|--------------------------------------------------------|
//! | visible?                | in `include` → yes; component matches an exclude      |
//! |                         | pattern or path has an `exclude` prefix → no; else yes |
//! | hidden?                 | any component starts with `_`                          |
//! | full rebuild on change? | any component matches a `full_build_patterns` regex    |

use crate::{config::SiteConfig, error::ConfigError, utils::url::to_slash};
use regex::Regex;
use rustc_hash::FxHashSet;
use std::path::Path;

/// Compiled visibility and rebuild rules of a site.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    include: FxHashSet<String>,
    exclude: Vec<String>,
    exclude_patterns: Vec<Regex>,
    full_build_patterns: Vec<Regex>,
}

impl PathClassifier {
    pub fn new(config: &SiteConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            include: config.include.iter().cloned().collect(),
            exclude: config.exclude.clone(),
            exclude_patterns: compile("exclude_patterns", &config.exclude_patterns)?,
            full_build_patterns: compile("full_build_patterns", &config.full_build_patterns)?,
        })
    }

    /// Whether `path` takes part in the build at all.
    pub fn is_visible(&self, path: &str) -> bool {
        if self.include.contains(path) {
            return true;
        }
        if components(path).any(|part| self.exclude_patterns.iter().any(|re| re.is_match(part))) {
            return false;
        }
        !self.exclude.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Whether a change to `path` invalidates more than the file itself.
    pub fn requires_full_build(&self, path: &str) -> bool {
        components(path).any(|part| self.full_build_patterns.iter().any(|re| re.is_match(part)))
    }
}

/// Whether any component of `path` starts with `_`.
pub fn is_hidden(path: &str) -> bool {
    components(path).any(|part| part.starts_with('_'))
}

/// Whether any component of `path` equals `name`.
pub fn has_component(path: &str, name: &str) -> bool {
    components(path).any(|part| part == name)
}

/// `/`-separated path of `path` relative to `root`, or `None` if outside.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let rel = to_slash(rel);
    (!rel.is_empty()).then_some(rel)
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

/// Patterns match at the start of a component only.
fn compile(field: &str, patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})")).map_err(|err| {
                ConfigError::Validation(format!("[{field}] invalid pattern `{pattern}`: {err}"))
            })
        })
        .collect()
}
