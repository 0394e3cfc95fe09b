//! Built-in loaders.
//!
//! | Loader  | Claims                                                     | Fragment                 |
//! |---------|------------------------------------------------------------|--------------------------|
//! | `post`  | visible `_posts/**/YYYY-MM-DD-title.*` with front matter   | `{posts: [..], tags}`    |
//! | `draft` | visible `_drafts/**` with front matter, `drafts` enabled   | `{posts: [..], tags}`    |
//! | `page`  | visible, non-hidden files with front matter                | `{pages: [..]}`          |
//! | `file`  | any other visible, non-hidden file (fallback)              | `{files: [{url, path}]}` |

use crate::{
    content::read_template,
    error::ParseError,
    pipeline::{BuildContext, Loader},
    site::{FILES, Fragment, PAGES, POSTS, TAGS},
    utils::{
        category::{has_component, is_hidden},
        date::{format_date, from_ymd, parse_date},
        url::{encode_url, path_to_url, stem, strip_suffix, suffix},
    },
};
use anyhow::Result;
use chrono::{Datelike, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::{path::Path, sync::LazyLock};

static POST_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})-(?P<title>.+)$")
        .expect("valid post name pattern")
});

pub struct PostLoader;

impl Loader for PostLoader {
    fn name(&self) -> &str {
        "post"
    }

    fn load(&self, path: &str, cx: &BuildContext) -> Result<Option<Fragment>> {
        if !has_component(path, "_posts") || !cx.classifier.is_visible(path) {
            return Ok(None);
        }
        let Some(caps) = POST_NAME.captures(stem(path)) else {
            return Ok(None);
        };

        let date = [&caps["year"], &caps["month"], &caps["day"]];
        let parsed = match date.map(str::parse::<u32>) {
            [Ok(year), Ok(month), Ok(day)] => from_ymd(year as i32, month, day),
            _ => None,
        };
        let Some(date) = parsed else {
            return Err(ParseError::Date {
                path: path.into(),
                value: date.join("-"),
            }
            .into());
        };

        read_post(path, date, &caps["title"], cx)
    }
}

pub struct DraftLoader;

impl Loader for DraftLoader {
    fn name(&self) -> &str {
        "draft"
    }

    fn load(&self, path: &str, cx: &BuildContext) -> Result<Option<Fragment>> {
        if !cx.config.drafts
            || !has_component(path, "_drafts")
            || !cx.classifier.is_visible(path)
        {
            return Ok(None);
        }
        read_post(path, cx.config.time, stem(path), cx)
    }
}

pub struct PageLoader;

impl Loader for PageLoader {
    fn name(&self) -> &str {
        "page"
    }

    fn load(&self, path: &str, cx: &BuildContext) -> Result<Option<Fragment>> {
        if !cx.classifier.is_visible(path) || is_hidden(path) {
            return Ok(None);
        }
        let Some(mut page) = read_template(&cx.config.source.join(path))? else {
            return Ok(None);
        };

        let output = if cx.pipeline.has_content_filter(suffix(path)) {
            format!("{}.html", strip_suffix(path))
        } else {
            path.to_owned()
        };
        page.insert("url".into(), Value::String(path_to_url(&output)));
        page.insert("path".into(), Value::String(path.to_owned()));

        Ok(Some(fragment(PAGES, vec![Value::Object(page)])))
    }
}

pub struct FileLoader;

impl Loader for FileLoader {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self, path: &str, cx: &BuildContext) -> Result<Option<Fragment>> {
        if !cx.classifier.is_visible(path) || is_hidden(path) {
            return Ok(None);
        }
        let file = json!({ "url": path_to_url(path), "path": path });
        Ok(Some(fragment(FILES, vec![file])))
    }
}

/// Shared by posts and drafts: `date` and `title` come from the file name
/// unless front matter sets `date`.
fn read_post(
    path: &str,
    date: NaiveDateTime,
    title: &str,
    cx: &BuildContext,
) -> Result<Option<Fragment>> {
    let Some(mut post) = read_template(&cx.config.source.join(path))? else {
        return Ok(None);
    };

    let date = match post.get("date") {
        None | Some(Value::Null) => date,
        Some(value) => front_matter_date(value, path)?,
    };
    let year = format!("{:04}", date.year());
    let month = format!("{:02}", date.month());
    let day = format!("{:02}", date.day());

    let url = cx
        .config
        .permalink
        .replace("{year}", &year)
        .replace("{month}", &month)
        .replace("{day}", &day)
        .replace("{title}", title);

    post.insert("url".into(), Value::String(encode_url(&url)));
    post.insert("path".into(), Value::String(path.to_owned()));
    post.insert("date".into(), Value::String(format_date(&date)));
    post.insert(
        "id".into(),
        Value::String(format!("/{year}/{month}/{day}/{title}")),
    );

    let post = Value::Object(post);
    let tags: Map<String, Value> = post_tags(&post)
        .into_iter()
        .map(|tag| (tag, Value::Array(vec![post.clone()])))
        .collect();

    let mut fragment = fragment(POSTS, vec![post]);
    fragment.insert(TAGS.into(), Value::Object(tags));
    Ok(Some(fragment))
}

fn front_matter_date(value: &Value, path: &str) -> Result<NaiveDateTime, ParseError> {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    parse_date(&text).ok_or_else(|| ParseError::Date {
        path: Path::new(path).to_path_buf(),
        value: text,
    })
}

/// `tags: [a, b]` or `tags: "a b"`.
fn post_tags(post: &Value) -> Vec<String> {
    match post.get("tags") {
        Some(Value::Array(tags)) => tags
            .iter()
            .map(|tag| match tag {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(tags)) => tags.split_whitespace().map(str::to_owned).collect(),
        _ => Vec::new(),
    }
}

fn fragment(key: &str, items: Vec<Value>) -> Fragment {
    let mut fragment = Map::new();
    fragment.insert(key.to_owned(), Value::Array(items));
    fragment
}
