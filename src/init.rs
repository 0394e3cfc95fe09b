//! Site scaffolding for `pressroom new`.
//!
//! Creates a minimal site that builds out of the box.

use crate::{config::CONFIG_FILE, log};
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use std::{fs, path::Path};

const DEFAULT_CONFIG: &str = "\
title: My Blog
permalink: /{year}/{month}/{day}/{title}.html
exclude: [README.md]
";

const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{{ page.title or site.title }}</title>
</head>
<body>
  <h1><a href="{{ site.baseurl }}/">{{ site.title }}</a></h1>
{{ content }}
</body>
</html>
"#;

const INDEX_PAGE: &str = r#"---
layout: default
title: Home
---
<ul>
{% for post in site.posts %}
  <li>{{ post.date }} <a href="{{ site.baseurl }}{{ post.url }}">{{ post.title }}</a></li>
{% endfor %}
</ul>
"#;

const WELCOME_POST: &str = "\
---
layout: default
title: Welcome
tags: [meta]
---
This is your first post. Edit or remove it, then run `pressroom serve --watch`.
";

/// Scaffold a new site at `root`, dating the welcome post today.
pub fn new_site(root: &Path) -> Result<()> {
    scaffold(root, Utc::now().date_naive())?;
    log!("new"; "created site at {}", root.display());
    Ok(())
}

/// Write the scaffold into `root`, which must be missing or empty.
fn scaffold(root: &Path, today: NaiveDate) -> Result<()> {
    if !is_dir_empty(root)? {
        bail!(
            "`{}` is not empty. Use `pressroom new <PATH>` with a new directory.",
            root.display()
        );
    }

    let post = format!("_posts/{}-welcome.md", today.format("%Y-%m-%d"));
    let files = [
        (CONFIG_FILE, DEFAULT_CONFIG),
        ("_layouts/default.html", DEFAULT_LAYOUT),
        ("index.md", INDEX_PAGE),
        (post.as_str(), WELCOME_POST),
    ];

    fs::create_dir_all(root.join("_includes"))
        .with_context(|| format!("Failed to create {}", root.display()))?;
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Check if a directory is missing or completely empty
fn is_dir_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(fs::read_dir(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .next()
        .is_none())
}
