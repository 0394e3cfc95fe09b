//! File generator: copies static files unchanged.

use super::prepare_output;
use crate::{
    logger::Progress,
    pipeline::{BuildContext, Generator},
    site::{Site, page_str},
};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;

pub struct FileGenerator;

impl Generator for FileGenerator {
    fn name(&self) -> &str {
        "files"
    }

    fn generate(&self, site: &Site, _cx: &BuildContext) -> Result<()> {
        let source = site.source();
        let destination = site.destination();
        let files: Vec<_> = site.files().iter().filter_map(Value::as_object).collect();

        let progress = Progress::new("files", files.len());
        for file in files {
            let (Some(url), Some(path)) = (page_str(file, "url"), page_str(file, "path")) else {
                continue;
            };
            let src = source.join(path);
            let dst = prepare_output(&destination, url)?;
            fs::copy(&src, &dst).with_context(|| {
                format!("Failed to copy {} to {}", src.display(), dst.display())
            })?;
            progress.inc();
        }
        progress.finish();

        Ok(())
    }
}
