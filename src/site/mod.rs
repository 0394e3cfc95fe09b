//! The site model: one schema-less mapping shared by every build stage.
//!
//! Reserved keys have typed accessors:
//!
//! | Key           | Shape                          | Filled by            |
//! |---------------|--------------------------------|----------------------|
//! | `source`      | absolute path string           | seed                 |
//! | `destination` | absolute path string           | seed                 |
//! | `time`        | `YYYY-MM-DD HH:MM:SS` string   | seed                 |
//! | `pages`       | sequence of page mappings      | page loader          |
//! | `posts`       | sequence of post mappings      | post/draft loaders   |
//! | `files`       | sequence of `{url, path}`      | file loader          |
//! | `tags`        | tag name → sequence of posts   | post/draft loaders   |
//!
//! Everything else (config keys, extension data) lives next to them and is
//! reached through [`Site::get`] / [`Site::insert`].

mod merge;

pub use merge::merge;

use crate::{config::SiteConfig, error::ConfigError, utils::date::format_date};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// A page, post, file or layout: a plain mapping.
pub type Page = Map<String, Value>;

/// A loader result, deep-merged into the site.
pub type Fragment = Map<String, Value>;

pub const PAGES: &str = "pages";
pub const POSTS: &str = "posts";
pub const FILES: &str = "files";
pub const TAGS: &str = "tags";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Site {
    data: Map<String, Value>,
}

impl Site {
    /// Seed a fresh site model from configuration.
    ///
    /// Config keys (known and extra) become site keys; the reserved
    /// `source`, `destination` and `time` keys are always set from the
    /// resolved configuration.
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        let mut data = match serde_json::to_value(config).context("Failed to serialize config")? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        data.insert(
            "source".into(),
            Value::String(config.source.to_string_lossy().into_owned()),
        );
        data.insert(
            "destination".into(),
            Value::String(config.destination.to_string_lossy().into_owned()),
        );
        data.insert("time".into(), Value::String(format_date(&config.time)));
        Ok(Self { data })
    }

    #[cfg(test)]
    pub(crate) fn from_map(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Deep-merge a loader fragment into the site.
    pub fn merge(&mut self, fragment: Fragment) -> Result<(), ConfigError> {
        merge::merge_map_into(&mut self.data, fragment)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    pub fn source(&self) -> PathBuf {
        self.path_key("source")
    }

    pub fn destination(&self) -> PathBuf {
        self.path_key("destination")
    }

    /// Build timestamp as stored in the site.
    pub fn time(&self) -> &str {
        self.data.get("time").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn pages(&self) -> &[Value] {
        self.collection(PAGES)
    }

    pub fn posts(&self) -> &[Value] {
        self.collection(POSTS)
    }

    pub fn files(&self) -> &[Value] {
        self.collection(FILES)
    }

    pub fn tags(&self) -> Option<&Map<String, Value>> {
        self.data.get(TAGS).and_then(Value::as_object)
    }

    pub fn pages_mut(&mut self) -> Result<&mut Vec<Value>, ConfigError> {
        self.collection_mut(PAGES)
    }

    pub fn posts_mut(&mut self) -> Result<&mut Vec<Value>, ConfigError> {
        self.collection_mut(POSTS)
    }

    pub fn files_mut(&mut self) -> Result<&mut Vec<Value>, ConfigError> {
        self.collection_mut(FILES)
    }

    /// A sequence-valued key, empty when absent or not a sequence.
    pub fn collection(&self, key: &str) -> &[Value] {
        self.data
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// A sequence-valued key, created empty when absent.
    pub fn collection_mut(&mut self, key: &str) -> Result<&mut Vec<Value>, ConfigError> {
        self.data
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| ConfigError::Validation(format!("site key `{key}` must be a sequence")))
    }

    fn path_key(&self, key: &str) -> PathBuf {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_default()
    }
}

/// String field of a page, if present.
pub fn page_str<'a>(page: &'a Page, key: &str) -> Option<&'a str> {
    page.get(key).and_then(Value::as_str)
}

/// Boolean field of a page, `default` when absent or not a boolean.
pub fn page_flag(page: &Page, key: &str, default: bool) -> bool {
    page.get(key).and_then(Value::as_bool).unwrap_or(default)
}
