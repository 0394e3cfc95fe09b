//! `kind: data`: merge one YAML or JSON file into the site model.
//!
//! ```yaml
//! kind: data
//! path: _data/authors.yml
//! key: authors
//! ```
//!
//! The file is claimed before any built-in loader sees it, so it is never
//! copied to the destination.

use crate::{
    error::ParseError,
    pipeline::{BuildContext, Extension, Loader, Pipeline},
    site::Fragment,
    utils::url::suffix,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct DataExtension {
    /// Source-relative path of the data file.
    pub path: String,

    /// Site key the decoded value is merged under.
    pub key: String,
}

impl Extension for DataExtension {
    fn name(&self) -> &str {
        "data"
    }

    fn register(&self, pipeline: &mut Pipeline) -> Result<()> {
        pipeline.register_loader(DataLoader {
            path: self.path.trim_start_matches('/').to_owned(),
            key: self.key.clone(),
        });
        Ok(())
    }
}

struct DataLoader {
    path: String,
    key: String,
}

impl Loader for DataLoader {
    fn name(&self) -> &str {
        "data"
    }

    fn load(&self, path: &str, cx: &BuildContext) -> Result<Option<Fragment>> {
        if path != self.path {
            return Ok(None);
        }
        let file = cx.config.source.join(path);
        let content = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;

        let value: Value = if suffix(path) == ".json" {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", file.display()))?
        } else {
            serde_yaml_ng::from_str(&content).map_err(|err| ParseError::Yaml(file.clone(), err))?
        };

        let mut fragment = Fragment::new();
        fragment.insert(self.key.clone(), value);
        Ok(Some(fragment))
    }
}
