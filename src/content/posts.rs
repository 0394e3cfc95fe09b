//! Post ordering and `next`/`previous` links.

use crate::{
    pipeline::{BuildContext, Processor},
    site::Site,
};
use anyhow::Result;
use serde_json::Value;

const NEXT: &str = "next";
const PREVIOUS: &str = "previous";

/// Sorts posts newest first and links neighbors.
///
/// `next` is the older neighbor, `previous` the newer one. Linked posts are
/// snapshots without their own links, so the model stays a tree.
pub struct ProcessPosts;

impl Processor for ProcessPosts {
    fn name(&self) -> &str {
        "posts"
    }

    fn process(&self, site: &mut Site, _cx: &BuildContext) -> Result<()> {
        let posts = site.posts_mut()?;
        link_posts(posts);
        Ok(())
    }
}

pub fn link_posts(posts: &mut [Value]) {
    // stable, so equal dates keep load order
    posts.sort_by(|a, b| date_of(b).cmp(date_of(a)));

    let snapshots: Vec<Value> = posts
        .iter()
        .map(|post| {
            let mut post = post.clone();
            if let Some(map) = post.as_object_mut() {
                map.remove(NEXT);
                map.remove(PREVIOUS);
            }
            post
        })
        .collect();

    let count = posts.len();
    for (i, post) in posts.iter_mut().enumerate() {
        let Some(map) = post.as_object_mut() else {
            continue;
        };
        map.remove(NEXT);
        map.remove(PREVIOUS);
        if i + 1 < count {
            map.insert(NEXT.into(), snapshots[i + 1].clone());
        }
        if i > 0 {
            map.insert(PREVIOUS.into(), snapshots[i - 1].clone());
        }
    }
}

fn date_of(post: &Value) -> &str {
    post.get("date").and_then(Value::as_str).unwrap_or_default()
}
