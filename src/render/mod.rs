//! Page rendering: template expansion, content filters and the layout chain.
//!
//! ```text
//! page body ──template──▶ ──filter(.md)──▶ content
//!                                             │
//!         _layouts/<page.layout>.html ◀───────┘  {site, page, content}
//!                      │
//!         _layouts/<layout.layout>.html ...      until no layout is named
//! ```

pub mod markdown;
pub mod template;

use crate::{
    content::read_front_matter,
    error::TemplateError,
    pipeline::BuildContext,
    site::{Page, Site, page_flag, page_str},
    utils::url::suffix,
};
use anyhow::{Context, Result};
use minijinja::Value as TemplateValue;
use serde_json::Value;
use std::{collections::BTreeMap, fs, path::Path};

/// Layout chains longer than this are treated as cycles.
pub const MAX_LAYOUT_DEPTH: usize = 32;

/// Layout name meaning "no layout".
const NO_LAYOUT: &str = "nil";

/// Template view of the site model.
///
/// Convert once per generator run and pass the result to every
/// [`render_page`] call; cloning it is cheap.
pub fn site_value(site: &Site) -> TemplateValue {
    TemplateValue::from_serialize(site)
}

/// `{site, page}` plus `content` when rendering a layout.
fn template_context(site: &TemplateValue, page: &Page, content: Option<&str>) -> TemplateValue {
    let mut context = BTreeMap::new();
    context.insert("site", site.clone());
    context.insert("page", TemplateValue::from_serialize(page));
    if let Some(content) = content {
        context.insert("content", TemplateValue::from(content));
    }
    TemplateValue::from(context)
}

/// Render one page to its final output text.
///
/// `site` comes from [`site_value`].
pub fn render_page(page: &Page, site: &TemplateValue, cx: &BuildContext) -> Result<String> {
    let path = page_str(page, "path").unwrap_or_default();
    let mut page = page.clone();
    let mut content = page_str(&page, "content").unwrap_or_default().to_owned();

    if !page_flag(&page, "raw_content", false) {
        let context = template_context(site, &page, None);
        content = cx
            .render_template(&content, &context)
            .map_err(|err| TemplateError::Render {
                path: path.to_owned(),
                message: format!("{err:#}"),
            })?;
    }

    if let Some(filter) = cx.pipeline.content_filter(suffix(path)) {
        content = filter
            .apply(&content)
            .with_context(|| format!("Failed to convert {path}"))?;
    }

    page.insert("content".into(), Value::String(content.clone()));
    render_layouts(content, page, site, cx, path)
}

fn render_layouts(
    mut content: String,
    mut current: Page,
    site: &TemplateValue,
    cx: &BuildContext,
    path: &str,
) -> Result<String> {
    let mut chain: Vec<String> = Vec::new();

    while let Some(name) = layout_name(&current) {
        if chain.len() == MAX_LAYOUT_DEPTH {
            return Err(TemplateError::LayoutCycle {
                path: path.to_owned(),
                depth: MAX_LAYOUT_DEPTH,
                chain: chain.join(" -> "),
            }
            .into());
        }
        chain.push(name.clone());

        let layout_file = cx.config.layouts_dir().join(format!("{name}.html"));
        if !layout_file.is_file() {
            return Err(TemplateError::MissingLayout {
                name,
                path: path.to_owned(),
                layout: layout_file,
            }
            .into());
        }
        let mut layout = read_layout(&layout_file)
            .with_context(|| format!("Failed to load layout {}", layout_file.display()))?;
        let body = match layout.remove("content") {
            Some(Value::String(body)) => body,
            _ => String::new(),
        };

        for (key, value) in current {
            if key != "layout" && key != "content" {
                layout.insert(key, value);
            }
        }
        layout.insert("content".into(), Value::String(content.clone()));

        let context = template_context(site, &layout, Some(&content));
        content = cx
            .render_template(&body, &context)
            .map_err(|err| TemplateError::Render {
                path: format!("{path} (layout `{name}`)"),
                message: format!("{err:#}"),
            })?;
        current = layout;
    }

    Ok(content)
}

/// Layout named by a page; absent, null, empty and `nil` mean none.
fn layout_name(page: &Page) -> Option<String> {
    match page.get("layout") {
        Some(Value::String(name)) if !name.is_empty() && name != NO_LAYOUT => {
            Some(name.clone())
        }
        _ => None,
    }
}

/// A layout file; one without front matter is all body.
fn read_layout(path: &Path) -> Result<Page> {
    let bytes = fs::read(path)?;
    if let Some(layout) = read_front_matter(&bytes, path)? {
        return Ok(layout);
    }
    let body = String::from_utf8(bytes)?;
    let mut layout = Page::new();
    layout.insert("content".into(), Value::String(body));
    Ok(layout)
}
