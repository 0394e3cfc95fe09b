//! Page generator: renders every published post and page.

use super::prepare_output;
use crate::{
    error::TemplateError,
    log,
    logger::Progress,
    pipeline::{BuildContext, Generator},
    render::{render_page, site_value},
    site::{Page, Site, page_flag, page_str},
};
use anyhow::{Context, Result, bail};
use minijinja::Value as TemplateValue;
use serde_json::Value;
use std::fs;

pub struct PageGenerator;

impl Generator for PageGenerator {
    fn name(&self) -> &str {
        "pages"
    }

    fn generate(&self, site: &Site, cx: &BuildContext) -> Result<()> {
        let pages: Vec<&Page> = site
            .posts()
            .iter()
            .chain(site.pages())
            .filter_map(Value::as_object)
            .filter(|page| page_flag(page, "published", true))
            .collect();

        let site_view = site_value(site);
        let progress = Progress::new("pages", pages.len());
        let mut failed = 0;
        for page in &pages {
            if let Err(err) = generate_page(page, site, &site_view, cx) {
                if !cx.config.keep_going {
                    return Err(err);
                }
                log!("error"; "{:#}", err);
                failed += 1;
            }
            progress.inc();
        }
        progress.finish();

        if failed > 0 {
            bail!(TemplateError::PagesFailed {
                failed,
                total: pages.len(),
            });
        }
        Ok(())
    }
}

fn generate_page(
    page: &Page,
    site: &Site,
    site_view: &TemplateValue,
    cx: &BuildContext,
) -> Result<()> {
    let path = page_str(page, "path").unwrap_or_default();
    let Some(url) = page_str(page, "url") else {
        bail!("page `{path}` has no url");
    };

    // render first so a failure leaves the previous output in place
    let rendered = render_page(page, site_view, cx)?;
    let output = prepare_output(&site.destination(), url)?;
    fs::write(&output, rendered)
        .with_context(|| format!("Failed to write {}", output.display()))
}
