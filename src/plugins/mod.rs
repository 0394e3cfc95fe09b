//! Declarative extensions from `_plugins/*.yml`.
//!
//! Each descriptor names a built-in extension kind and its settings:
//!
//! ```yaml
//! # _plugins/10-tags.yml
//! kind: tags
//! pages:
//!   - url: /tags/{tag}.html
//!     layout: tag
//! ```
//!
//! | Kind      | Hooks                   | Purpose                                   |
//! |-----------|-------------------------|-------------------------------------------|
//! | `tags`    | processor               | one page per tag and page set             |
//! | `command` | processor + generator   | build matching files with a program       |
//! | `data`    | loader                  | merge a YAML/JSON file into the site      |
//!
//! Descriptors are registered once, in file-name order, before the first
//! build. Safe mode skips the directory entirely.

pub mod command;
pub mod data;
pub mod tags;

use crate::{
    config::SiteConfig,
    error::{ConfigError, ParseError},
    log,
    pipeline::{Extension, Pipeline},
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub use command::CommandExtension;
pub use data::DataExtension;
pub use tags::TagsExtension;

/// One `_plugins/*.yml` file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Descriptor {
    Tags(TagsExtension),
    Command(CommandExtension),
    Data(DataExtension),
}

impl Descriptor {
    pub fn into_extension(self) -> Box<dyn Extension> {
        match self {
            Self::Tags(ext) => Box::new(ext),
            Self::Command(ext) => Box::new(ext),
            Self::Data(ext) => Box::new(ext),
        }
    }
}

/// Descriptor files in `dir`, sorted by file name.
fn descriptor_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|err| ConfigError::Io(dir.to_path_buf(), err))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == "yml" || ext == "yaml")
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Parse every descriptor under `<source>/_plugins`.
pub fn load_descriptors(config: &SiteConfig) -> Result<Vec<(PathBuf, Descriptor)>> {
    descriptor_files(&config.plugins_dir())?
        .into_iter()
        .map(|path| -> Result<(PathBuf, Descriptor)> {
            let content = fs::read_to_string(&path)
                .map_err(|err| ConfigError::Io(path.clone(), err))?;
            let descriptor = serde_yaml_ng::from_str(&content)
                .map_err(|err| ParseError::Yaml(path.clone(), err))?;
            Ok((path, descriptor))
        })
        .collect()
}

/// Register `_plugins` extensions into `pipeline`, returning how many.
pub fn register_plugins(pipeline: &mut Pipeline, config: &SiteConfig) -> Result<usize> {
    let descriptors = load_descriptors(config)?;
    let count = descriptors.len();
    for (path, descriptor) in descriptors {
        let extension = descriptor.into_extension();
        pipeline
            .register_extension(extension.as_ref())
            .with_context(|| format!("Failed to register {}", path.display()))?;
        log!("plugins"; "{} ({})", extension.name(), path.display());
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site_with_plugins(files: &[(&str, &str)]) -> (tempfile::TempDir, SiteConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("_plugins")).unwrap();
        for (name, content) in files {
            fs::write(dir.path().join("_plugins").join(name), content).unwrap();
        }
        let mut config = SiteConfig::default();
        config.set_source(dir.path());
        (dir, config)
    }

    #[test]
    fn test_descriptors_in_file_name_order() {
        let (_dir, config) = site_with_plugins(&[
            ("20-data.yml", "kind: data\npath: capitals.yml\nkey: capitals\n"),
            ("10-tags.yaml", "kind: tags\n"),
            ("notes.txt", "ignored"),
        ]);

        let descriptors = load_descriptors(&config).unwrap();
        let kinds: Vec<_> = descriptors
            .iter()
            .map(|(_, d)| match d {
                Descriptor::Tags(_) => "tags",
                Descriptor::Command(_) => "command",
                Descriptor::Data(_) => "data",
            })
            .collect();
        assert_eq!(kinds, ["tags", "data"]);
    }

    #[test]
    fn test_unknown_kind_is_parse_error() {
        let (_dir, config) = site_with_plugins(&[("x.yml", "kind: python\n")]);
        let err = load_descriptors(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ParseError>(),
            Some(ParseError::Yaml(..))
        ));
    }

    #[test]
    fn test_no_plugins_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::default();
        config.set_source(dir.path());
        let mut pipeline = Pipeline::with_builtins();

        assert_eq!(register_plugins(&mut pipeline, &config).unwrap(), 0);
    }

    #[test]
    fn test_register_plugins() {
        let (_dir, config) = site_with_plugins(&[
            ("a.yml", "kind: tags\n"),
            ("b.yml", "kind: data\npath: extra.json\nkey: extra\n"),
        ]);
        let mut pipeline = Pipeline::with_builtins();

        assert_eq!(register_plugins(&mut pipeline, &config).unwrap(), 2);
        let processors: Vec<_> = pipeline.processors().map(|p| p.name()).collect();
        assert_eq!(processors, ["tags", "posts"]);
        let loaders: Vec<_> = pipeline.loaders().map(|l| l.name()).collect();
        assert_eq!(loaders, ["data", "post", "draft", "page", "file"]);
    }
}
