//! Mapping between source paths, URLs and destination paths.
//!
//! Source-relative paths always use `/` as separator.
//!
//! | Source path        | URL                | Destination path      |
//! |--------------------|--------------------|-----------------------|
//! | `about.html`       | `/about.html`      | `about.html`          |
//! | `docs/index.html`  | `/docs/`           | `docs/index.html`     |
//! | `index.html`       | `/`                | `index.html`          |
//! | `my notes.txt`     | `/my%20notes.txt`  | `my notes.txt`        |

use std::path::{Component, Path};

const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

/// Output-relative URL of a source-relative path.
pub fn path_to_url(path: &str) -> String {
    let path = path.trim_start_matches('/');
    let (dir, name) = match path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, path),
    };

    let collapsed = if INDEX_FILES.contains(&name) {
        match dir {
            Some(dir) => format!("{dir}/"),
            None => String::new(),
        }
    } else {
        path.to_owned()
    };

    encode_url(&format!("/{collapsed}"))
}

/// Destination-relative path of a URL; directory URLs get `index.html`.
///
/// `.` and `..` segments are dropped so a URL can never point outside the
/// destination directory.
pub fn url_to_path(url: &str) -> String {
    let decoded = urlencoding::decode(url)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| url.to_owned());
    let mut segments: Vec<&str> = decoded
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    if decoded.ends_with('/') || segments.is_empty() {
        segments.push("index.html");
    }
    segments.join("/")
}

/// Percent-encode every segment of a `/`-separated path.
pub fn encode_url(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `/`-separated form of a relative filesystem path.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Extension of a `/`-separated path including the dot (`.md`), or `""`.
pub fn suffix(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(i) => &name[i..],
    }
}

/// Path without its extension.
pub fn strip_suffix(path: &str) -> &str {
    let ext = suffix(path);
    &path[..path.len() - ext.len()]
}

/// File name without directory and extension.
pub fn stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    strip_suffix(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_path_to_url_plain() {
        assert_eq!(path_to_url("about.html"), "/about.html");
        assert_eq!(path_to_url("css/site.css"), "/css/site.css");
    }

    #[test]
    fn test_path_to_url_index_collapses() {
        assert_eq!(path_to_url("foo/index.html"), "/foo/");
        assert_eq!(path_to_url("foo/bar/index.htm"), "/foo/bar/");
        assert_eq!(path_to_url("index.html"), "/");
        // only exact index names collapse
        assert_eq!(path_to_url("foo/myindex.html"), "/foo/myindex.html");
    }

    #[test]
    fn test_path_to_url_encodes() {
        assert_eq!(path_to_url("my notes.txt"), "/my%20notes.txt");
        assert_eq!(path_to_url("a b/c.html"), "/a%20b/c.html");
    }

    #[test]
    fn test_url_to_path() {
        assert_eq!(url_to_path("/about.html"), "about.html");
        assert_eq!(url_to_path("/foo/"), "foo/index.html");
        assert_eq!(url_to_path("/"), "index.html");
        assert_eq!(url_to_path("/my%20notes.txt"), "my notes.txt");
    }

    #[test]
    fn test_url_to_path_stays_inside_destination() {
        assert_eq!(url_to_path("/../../etc/passwd"), "etc/passwd");
        assert_eq!(url_to_path("/a/./b.html"), "a/b.html");
    }

    #[test]
    fn test_url_path_inverse() {
        for path in ["foo/index.html", "index.html", "a b/c.css", "2021/05/01/x.html"] {
            assert_eq!(url_to_path(&path_to_url(path)), path);
        }
    }

    #[test]
    fn test_to_slash() {
        let path: PathBuf = ["_posts", "2021", "x.md"].iter().collect();
        assert_eq!(to_slash(&path), "_posts/2021/x.md");
    }

    #[test]
    fn test_suffix_and_stem() {
        assert_eq!(suffix("_posts/2021-05-01-hello.md"), ".md");
        assert_eq!(suffix("a.b/README"), "");
        assert_eq!(suffix(".htaccess"), "");
        assert_eq!(strip_suffix("docs/page.markdown"), "docs/page");
        assert_eq!(stem("_drafts/my-draft.md"), "my-draft");
    }
}
