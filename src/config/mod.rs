//! Site configuration loaded from `_config.yml` at the source root.
//!
//! Every key is optional; missing keys fall back to [`defaults`]. Keys the
//! generator does not know about are kept in [`SiteConfig::extra`] and end
//! up in the site model, where templates and extensions can read them.
//!
//! # Example
//!
//! ```yaml
//! destination: public
//! permalink: /blog/{year}/{title}.html
//! exclude: [README.md, node_modules]
//! port: 4000
//!
//! # anything else is site data
//! title: My Blog
//! author: { name: Alice }
//! ```

pub mod defaults;

use crate::{
    cli::{Cli, Commands},
    error::{ConfigError, ParseError},
};
use anyhow::{Result, bail};
use chrono::{NaiveDateTime, Utc};
use educe::Educe;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Configuration file name, looked up in the source root.
pub const CONFIG_FILE: &str = "_config.yml";

/// Root configuration structure representing `_config.yml`.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
pub struct SiteConfig {
    /// Absolute source root (set after loading)
    #[serde(skip)]
    #[educe(Default = PathBuf::from("./"))]
    pub source: PathBuf,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build start timestamp, shared by every build of this invocation
    #[serde(skip)]
    pub time: NaiveDateTime,

    /// Output directory, relative to the source root.
    #[serde(default = "defaults::destination")]
    #[educe(Default = defaults::destination())]
    pub destination: PathBuf,

    /// Paths that are always visible, even when excluded.
    #[serde(default = "defaults::include")]
    #[educe(Default = defaults::include())]
    pub include: Vec<String>,

    /// Path prefixes that are never loaded.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Regexes matched against the start of every path component.
    #[serde(default = "defaults::exclude_patterns")]
    #[educe(Default = defaults::exclude_patterns())]
    pub exclude_patterns: Vec<String>,

    /// Regexes on path components that force a full rebuild in watch mode.
    #[serde(default = "defaults::full_build_patterns")]
    #[educe(Default = defaults::full_build_patterns())]
    pub full_build_patterns: Vec<String>,

    /// URL pattern for posts and drafts.
    #[serde(default = "defaults::permalink")]
    #[educe(Default = defaults::permalink())]
    pub permalink: String,

    #[serde(default = "defaults::serve::host")]
    #[educe(Default = defaults::serve::host())]
    pub host: String,

    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// URL prefix the site is served under, e.g. `/blog`.
    #[serde(default)]
    pub baseurl: String,

    /// Render posts from `_drafts`.
    #[serde(default)]
    pub drafts: bool,

    /// Skip extensions from `_plugins`.
    #[serde(default)]
    pub safe: bool,

    /// Overwrite a destination directory that lacks the marker file.
    #[serde(default)]
    pub force: bool,

    /// Report every failing page instead of stopping at the first one.
    #[serde(default)]
    pub keep_going: bool,

    /// User-defined site data
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SiteConfig {
    /// Parse configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    pub fn from_str(content: &str, path: &Path) -> Result<Self> {
        let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(content)
            .map_err(|err| ParseError::Yaml(path.to_path_buf(), err))?;
        if value.is_null() {
            return Ok(Self::default());
        }
        let config = serde_yaml_ng::from_value(value)
            .map_err(|err| ParseError::Yaml(path.to_path_buf(), err))?;
        Ok(config)
    }

    /// Load `_config.yml` from `source`, falling back to defaults when absent.
    ///
    /// The returned config has absolute paths and its build timestamp set.
    pub fn load(source: &Path) -> Result<Self> {
        let config_path = source.join(CONFIG_FILE);
        let mut config = if config_path.is_file() {
            let content = fs::read_to_string(&config_path)
                .map_err(|err| ConfigError::Io(config_path.clone(), err))?;
            Self::from_str(&content, &config_path)?
        } else {
            Self::default()
        };
        config.set_source(source);
        config.time = Utc::now().naive_utc();
        Ok(config)
    }

    /// Set the source root and resolve the destination against it.
    pub fn set_source(&mut self, source: &Path) {
        let source = normalize_path(source);
        self.config_path = source.join(CONFIG_FILE);
        self.destination = normalize_path(&source.join(&self.destination));
        self.source = source;
    }

    /// Update configuration with CLI arguments.
    ///
    /// Must be called after [`SiteConfig::load`]; a `--destination` flag is
    /// resolved against the source root like the config key.
    pub fn update_with_cli(&mut self, cli: &Cli) {
        if let Some(destination) = &cli.destination {
            self.destination = normalize_path(&self.source.join(destination));
        }

        self.drafts |= cli.drafts;
        self.safe |= cli.safe;
        self.force |= cli.force;
        self.keep_going |= cli.keep_going;

        if let Commands::Serve { .. } = &cli.command {
            Self::update_option(&mut self.host, cli.host.as_ref());
            Self::update_option(&mut self.port, cli.port.as_ref());
            Self::update_option(&mut self.baseurl, cli.baseurl.as_ref());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Directory holding layout templates.
    pub fn layouts_dir(&self) -> PathBuf {
        self.source.join("_layouts")
    }

    /// Directory searched by `{% include %}`.
    pub fn includes_dir(&self) -> PathBuf {
        self.source.join("_includes")
    }

    /// Directory holding extension descriptors.
    pub fn plugins_dir(&self) -> PathBuf {
        self.source.join("_plugins")
    }

    /// URL printed when serving, always ending with `/`.
    pub fn serve_url(&self) -> String {
        self.serve_url_on(self.port)
    }

    /// Like [`SiteConfig::serve_url`] for the port actually bound.
    pub fn serve_url_on(&self, port: u16) -> String {
        let url = format!("http://{}:{}{}", self.host, port, self.baseurl);
        if url.ends_with('/') { url } else { format!("{url}/") }
    }

    /// Validate patterns and serving settings.
    pub fn validate(&self) -> Result<()> {
        for (field, patterns) in [
            ("exclude_patterns", &self.exclude_patterns),
            ("full_build_patterns", &self.full_build_patterns),
        ] {
            for pattern in patterns {
                if let Err(err) = Regex::new(pattern) {
                    bail!(ConfigError::Validation(format!(
                        "[{field}] invalid pattern `{pattern}`: {err}"
                    )));
                }
            }
        }

        if !self.baseurl.is_empty() && !self.baseurl.starts_with('/') {
            bail!(ConfigError::Validation(
                "[baseurl] must be empty or start with `/`".into()
            ));
        }

        if !self.permalink.contains("{title}") {
            bail!(ConfigError::Validation(
                "[permalink] must contain `{title}`".into()
            ));
        }

        Ok(())
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}
