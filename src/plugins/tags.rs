//! `kind: tags`: one generated page per tag.
//!
//! Page sets come from the descriptor's `pages`, else from the site's
//! `tags_plugin.pages`, else a single `/tags/{tag}.html` set using the `tag`
//! layout. Each page carries `tag` and `posts` (newest first) and an empty
//! body, so all output comes from the layout.

use crate::{
    pipeline::{BuildContext, Extension, Pipeline, Processor},
    site::Site,
    utils::url::encode_url,
};
use anyhow::{Context, Result};
use educe::Educe;
use serde::Deserialize;
use serde_json::{Value, json};

mod defaults {
    pub fn url() -> String {
        "/tags/{tag}.html".into()
    }

    pub fn layout() -> String {
        "tag".into()
    }
}

/// One set of tag pages, e.g. HTML pages and feeds.
#[derive(Debug, Clone, Educe, Deserialize)]
#[educe(Default)]
pub struct TagPageSet {
    /// URL pattern containing `{tag}`.
    #[serde(default = "defaults::url")]
    #[educe(Default = defaults::url())]
    pub url: String,

    #[serde(default = "defaults::layout")]
    #[educe(Default = defaults::layout())]
    pub layout: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsExtension {
    #[serde(default)]
    pub pages: Option<Vec<TagPageSet>>,
}

impl Extension for TagsExtension {
    fn name(&self) -> &str {
        "tags"
    }

    fn register(&self, pipeline: &mut Pipeline) -> Result<()> {
        pipeline.register_processor(TagPages {
            pages: self.pages.clone(),
        });
        Ok(())
    }
}

struct TagPages {
    pages: Option<Vec<TagPageSet>>,
}

impl TagPages {
    fn page_sets(&self, site: &Site) -> Result<Vec<TagPageSet>> {
        if let Some(pages) = &self.pages {
            return Ok(pages.clone());
        }
        match site.get("tags_plugin").and_then(|settings| settings.get("pages")) {
            Some(pages) => serde_json::from_value(pages.clone())
                .context("Invalid `tags_plugin.pages` in site config"),
            None => Ok(vec![TagPageSet::default()]),
        }
    }
}

impl Processor for TagPages {
    fn name(&self) -> &str {
        "tags"
    }

    fn process(&self, site: &mut Site, _cx: &BuildContext) -> Result<()> {
        let sets = self.page_sets(site)?;
        let Some(tags) = site.tags().cloned() else {
            return Ok(());
        };

        let pages = site.pages_mut()?;
        for set in &sets {
            for (tag, posts) in &tags {
                let mut posts = posts.as_array().cloned().unwrap_or_default();
                posts.sort_by(|a, b| date_of(b).cmp(date_of(a)));
                pages.push(json!({
                    "url": encode_url(&set.url.replace("{tag}", tag)),
                    "layout": set.layout,
                    "content": "",
                    "tag": tag,
                    "posts": posts,
                }));
            }
        }
        Ok(())
    }
}

fn date_of(post: &Value) -> &str {
    post.get("date").and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SiteConfig, utils::category::PathClassifier};

    fn run(extension: &TagsExtension, site: &mut Site) -> Result<()> {
        let config = SiteConfig::default();
        let classifier = PathClassifier::new(&config).unwrap();
        let pipeline = Pipeline::default();
        let cx = BuildContext::new(&config, &classifier, &pipeline);
        TagPages {
            pages: extension.pages.clone(),
        }
        .process(site, &cx)
    }

    fn site_with_tags() -> Site {
        Site::from_map(
            json!({
                "pages": [],
                "tags": {
                    "rust": [
                        {"id": "old", "date": "2020-01-01 00:00:00"},
                        {"id": "new", "date": "2021-01-01 00:00:00"},
                    ],
                    "web dev": [{"id": "new", "date": "2021-01-01 00:00:00"}],
                },
            })
            .as_object()
            .cloned()
            .unwrap(),
        )
    }

    #[test]
    fn test_default_page_set() {
        let mut site = site_with_tags();
        run(&TagsExtension::default(), &mut site).unwrap();

        let pages = site.pages();
        assert_eq!(pages.len(), 2);
        let rust = pages.iter().find(|p| p["tag"] == "rust").unwrap();
        assert_eq!(rust["url"], "/tags/rust.html");
        assert_eq!(rust["layout"], "tag");
        assert_eq!(rust["content"], "");
        assert_eq!(rust["posts"][0]["id"], "new");
        assert_eq!(rust["posts"][1]["id"], "old");

        let web = pages.iter().find(|p| p["tag"] == "web dev").unwrap();
        assert_eq!(web["url"], "/tags/web%20dev.html");
    }

    #[test]
    fn test_page_sets_from_site_config() {
        let mut site = site_with_tags();
        site.insert(
            "tags_plugin",
            json!({"pages": [
                {"url": "/t/{tag}/", "layout": "tag"},
                {"url": "/t/{tag}/feed.xml", "layout": "feed"},
            ]}),
        );
        run(&TagsExtension::default(), &mut site).unwrap();

        let urls: Vec<_> = site.pages().iter().map(|p| p["url"].as_str().unwrap()).collect();
        assert_eq!(urls.len(), 4);
        assert!(urls.contains(&"/t/rust/"));
        assert!(urls.contains(&"/t/rust/feed.xml"));
    }

    #[test]
    fn test_descriptor_wins_over_site_config() {
        let mut site = site_with_tags();
        site.insert("tags_plugin", json!({"pages": [{"url": "/ignored/{tag}.html"}]}));
        let extension: TagsExtension =
            serde_yaml_ng::from_str("pages:\n  - url: /label/{tag}.html\n").unwrap();
        run(&extension, &mut site).unwrap();

        assert!(site.pages().iter().all(|p| p["url"].as_str().unwrap().starts_with("/label/")));
        assert!(site.pages().iter().all(|p| p["layout"] == "tag"));
    }

    #[test]
    fn test_no_tags() {
        let mut site = Site::default();
        run(&TagsExtension::default(), &mut site).unwrap();
        assert!(site.pages().is_empty());
    }
}
