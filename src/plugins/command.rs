//! `kind: command`: build files of one extension with an external program.
//!
//! ```yaml
//! kind: command
//! extension: .less
//! output_extension: .css
//! command: [lessc, "{src}", "{dst}"]
//! ```
//!
//! A processor moves matching entries out of `files` (so they are not
//! copied) into `<key>`, default `<ext>_files`, rewriting their URL to the
//! output extension. A generator then runs the command once per entry with
//! `{src}` and `{dst}` replaced by absolute paths.

use crate::{
    generator::prepare_output,
    log,
    pipeline::{BuildContext, Extension, Generator, Pipeline, Processor},
    site::{Site, page_str},
    utils::{
        exec::exec,
        url::{strip_suffix, suffix},
    },
};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use std::ffi::OsString;

#[derive(Debug, Clone, Deserialize)]
pub struct CommandExtension {
    /// Source extension including the dot, e.g. `.less`.
    pub extension: String,

    /// Output extension; the source extension is kept when absent.
    #[serde(default)]
    pub output_extension: Option<String>,

    /// Program and arguments.
    pub command: Vec<String>,

    /// Site key holding the claimed files.
    #[serde(default)]
    pub key: Option<String>,
}

impl CommandExtension {
    fn key(&self) -> String {
        self.key.clone().unwrap_or_else(|| {
            format!("{}_files", self.extension.trim_start_matches('.'))
        })
    }
}

impl Extension for CommandExtension {
    fn name(&self) -> &str {
        "command"
    }

    fn register(&self, pipeline: &mut Pipeline) -> Result<()> {
        if self.command.is_empty() {
            bail!("`command` must name a program");
        }
        if !self.extension.starts_with('.') {
            bail!("`extension` must start with `.`, got `{}`", self.extension);
        }
        pipeline.register_processor(CollectFiles {
            extension: self.extension.clone(),
            output_extension: self.output_extension.clone(),
            key: self.key(),
        });
        pipeline.register_generator(RunCommand {
            command: self.command.clone(),
            key: self.key(),
        });
        Ok(())
    }
}

struct CollectFiles {
    extension: String,
    output_extension: Option<String>,
    key: String,
}

impl Processor for CollectFiles {
    fn name(&self) -> &str {
        "command"
    }

    fn process(&self, site: &mut Site, _cx: &BuildContext) -> Result<()> {
        let files = site.files_mut()?;
        let (mut claimed, kept): (Vec<Value>, Vec<Value>) =
            files.drain(..).partition(|file| {
                file.get("path")
                    .and_then(Value::as_str)
                    .is_some_and(|path| suffix(path) == self.extension)
            });
        *files = kept;

        if let Some(output_extension) = &self.output_extension {
            for file in &mut claimed {
                let Some(map) = file.as_object_mut() else {
                    continue;
                };
                let url = map.get("url").and_then(Value::as_str).unwrap_or_default();
                let url = format!("{}{output_extension}", strip_suffix(url));
                map.insert("url".into(), Value::String(url));
            }
        }

        site.collection_mut(&self.key)?.extend(claimed);
        Ok(())
    }
}

struct RunCommand {
    command: Vec<String>,
    key: String,
}

impl Generator for RunCommand {
    fn name(&self) -> &str {
        "command"
    }

    fn generate(&self, site: &Site, _cx: &BuildContext) -> Result<()> {
        let source = site.source();
        let destination = site.destination();

        for file in site.collection(&self.key).iter().filter_map(Value::as_object) {
            let (Some(url), Some(path)) = (page_str(file, "url"), page_str(file, "path")) else {
                continue;
            };
            let src = source.join(path);
            let dst = prepare_output(&destination, url)?;
            let cmd: Vec<OsString> = self
                .command
                .iter()
                .map(|arg| {
                    arg.replace("{src}", &src.to_string_lossy())
                        .replace("{dst}", &dst.to_string_lossy())
                        .into()
                })
                .collect();

            exec(Some(&source), &cmd).with_context(|| format!("Failed to build {path}"))?;
            log!("command"; "{path} -> {url}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SiteConfig, utils::category::PathClassifier};
    use serde_json::json;

    fn descriptor(yaml: &str) -> CommandExtension {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn test_register_validates() {
        let mut pipeline = Pipeline::default();
        assert!(descriptor("extension: .less\ncommand: []\n").register(&mut pipeline).is_err());
        assert!(descriptor("extension: less\ncommand: [lessc]\n").register(&mut pipeline).is_err());
        assert!(descriptor("extension: .less\ncommand: [lessc]\n").register(&mut pipeline).is_ok());
    }

    #[test]
    fn test_collect_files() {
        let ext = descriptor("extension: .less\noutput_extension: .css\ncommand: [lessc]\n");
        let collect = CollectFiles {
            extension: ext.extension.clone(),
            output_extension: ext.output_extension.clone(),
            key: ext.key(),
        };
        let mut site = Site::from_map(
            json!({"files": [
                {"url": "/css/site.less", "path": "css/site.less"},
                {"url": "/logo.png", "path": "logo.png"},
            ]})
            .as_object()
            .cloned()
            .unwrap(),
        );

        let config = SiteConfig::default();
        let classifier = PathClassifier::new(&config).unwrap();
        let pipeline = Pipeline::default();
        collect
            .process(&mut site, &BuildContext::new(&config, &classifier, &pipeline))
            .unwrap();

        assert_eq!(site.files(), [json!({"url": "/logo.png", "path": "logo.png"})]);
        assert_eq!(
            site.collection("less_files"),
            [json!({"url": "/css/site.css", "path": "css/site.less"})]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.up"), "shout").unwrap();
        let mut config = SiteConfig::default();
        config.set_source(dir.path());

        let mut site = Site::from_config(&config).unwrap();
        site.insert("up_files", json!([{"url": "/a.txt", "path": "a.up"}]));
        let run = RunCommand {
            command: ["sh", "-c", "tr a-z A-Z < \"$0\" > \"$1\"", "{src}", "{dst}"]
                .map(String::from)
                .to_vec(),
            key: "up_files".into(),
        };

        let classifier = PathClassifier::new(&config).unwrap();
        let pipeline = Pipeline::default();
        run.generate(&site, &BuildContext::new(&config, &classifier, &pipeline))
            .unwrap();

        let out = std::fs::read_to_string(config.destination.join("a.txt")).unwrap();
        assert_eq!(out, "SHOUT");
    }
}
