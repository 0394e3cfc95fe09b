//! Site building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()                         build_delta(paths)
//!     │                                    │
//!     ├── check_destination()              │
//!     ├── collect_sources() ──┐            │
//!     │                       ▼            ▼
//!     │               load_site() ── offer each path to the loaders,
//!     │                       │          merge fragments into a fresh Site
//!     ├── clean_destination() │          (no wipe for delta builds)
//!     │                       ▼
//!     └─────────────▶ run_hooks() ── processors, then generators
//! ```

use crate::{
    config::SiteConfig,
    error::{ConfigError, ParseError, TemplateError},
    log,
    pipeline::{BuildContext, Pipeline},
    site::Site,
    utils::category::{PathClassifier, relative_path},
};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path, time::Instant};
use walkdir::WalkDir;

/// Marker file identifying a directory this tool may wipe.
pub const DESTINATION_MARKER: &str = ".pressroom_destination";

/// Build the entire site from scratch.
///
/// Every source file is loaded before the destination is touched, so a
/// malformed source leaves the previous output in place.
pub fn build_site(config: &SiteConfig, pipeline: &Pipeline) -> Result<Site> {
    let start = Instant::now();
    check_destination(config)?;

    let classifier = PathClassifier::new(config)?;
    let cx = BuildContext::new(config, &classifier, pipeline);

    let paths = collect_sources(config);
    let (mut site, load_failures) = load_site(&cx, &paths)?;
    log!(
        "load";
        "{} posts, {} pages, {} files",
        site.posts().len(),
        site.pages().len(),
        site.files().len()
    );

    clean_destination(&config.destination)?;
    let hook_failures = run_hooks(&mut site, &cx)?;

    finish(load_failures + hook_failures, start)?;
    log_build_result(&config.destination)?;
    Ok(site)
}

/// Rebuild only `paths` into the existing destination.
///
/// The site model holds just the changed files, so collections such as
/// `posts` and the `next`/`previous` links only cover them.
pub fn build_delta(config: &SiteConfig, pipeline: &Pipeline, paths: &[String]) -> Result<Site> {
    let start = Instant::now();
    check_destination(config)?;
    let classifier = PathClassifier::new(config)?;
    let cx = BuildContext::new(config, &classifier, pipeline);

    let existing: Vec<String> = paths
        .iter()
        .filter(|path| config.source.join(path.as_str()).is_file())
        .cloned()
        .collect();
    let (mut site, load_failures) = load_site(&cx, &existing)?;

    fs::create_dir_all(&config.destination).with_context(|| {
        format!("Failed to create {}", config.destination.display())
    })?;
    let hook_failures = run_hooks(&mut site, &cx)?;

    finish(load_failures + hook_failures, start)?;
    Ok(site)
}

// ============================================================================
// Destination
// ============================================================================

/// Refuse to wipe a directory that does not look like ours.
///
/// Accepted: missing, empty, or carrying [`DESTINATION_MARKER`]; anything
/// else needs `force`. A destination containing the source is always refused.
pub fn check_destination(config: &SiteConfig) -> Result<()> {
    let destination = &config.destination;

    if config.source.starts_with(destination) {
        bail!(ConfigError::Validation(format!(
            "[destination] `{}` contains the source directory",
            destination.display()
        )));
    }
    if !destination.exists() || config.force || destination.join(DESTINATION_MARKER).exists() {
        return Ok(());
    }
    if destination.is_dir() && is_empty_dir(destination)? {
        return Ok(());
    }

    bail!(ConfigError::UnmarkedDestination(destination.clone()))
}

fn is_empty_dir(path: &Path) -> Result<bool> {
    let mut entries =
        fs::read_dir(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
    Ok(entries.next().is_none())
}

/// Remove everything under `destination` and mark it as ours.
fn clean_destination(destination: &Path) -> Result<()> {
    if destination.exists() {
        let removed = if destination.is_dir() {
            fs::remove_dir_all(destination)
        } else {
            fs::remove_file(destination)
        };
        removed.with_context(|| {
            format!("Failed to clear output directory: {}", destination.display())
        })?;
    }
    fs::create_dir_all(destination)
        .with_context(|| format!("Failed to create {}", destination.display()))?;
    fs::write(destination.join(DESTINATION_MARKER), "")
        .with_context(|| format!("Failed to mark {}", destination.display()))?;
    Ok(())
}

// ============================================================================
// Loading
// ============================================================================

/// Every file under the source root, sorted, outside the destination.
///
/// Entries that cannot be read are logged and skipped.
pub fn collect_sources(config: &SiteConfig) -> Vec<String> {
    let source = &config.source;
    let destination = &config.destination;

    let mut paths = Vec::new();
    for entry in WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != destination.as_path())
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log!("warn"; "skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.path().is_file() {
            continue;
        }
        if let Some(path) = relative_path(source, entry.path()) {
            paths.push(path);
        }
    }
    paths
}

/// Offer `paths` to the loader chain and merge the results into a fresh site.
///
/// Returns the site and the number of sources skipped in `keep_going` mode.
fn load_site(cx: &BuildContext, paths: &[String]) -> Result<(Site, usize)> {
    let mut site = Site::from_config(cx.config)?;
    let mut failed = 0;

    for path in paths {
        match cx.load(path) {
            Ok(Some(fragment)) => site
                .merge(fragment)
                .with_context(|| format!("Failed to merge {path}"))?,
            Ok(None) => {}
            Err(err) if cx.config.keep_going && err.downcast_ref::<ParseError>().is_some() => {
                log!("error"; "{path}: {err:#}");
                failed += 1;
            }
            Err(err) => return Err(err.context(format!("Failed to load {path}"))),
        }
    }

    Ok((site, failed))
}

// ============================================================================
// Hooks
// ============================================================================

/// Run processors, then generators.
///
/// In `keep_going` mode a failing generator is reported and the remaining
/// generators still run; returns the number of failures, counting each
/// page a generator failed to render.
fn run_hooks(site: &mut Site, cx: &BuildContext) -> Result<usize> {
    for processor in cx.pipeline.processors() {
        processor
            .process(site, cx)
            .with_context(|| format!("Processor `{}` failed", processor.name()))?;
    }

    let mut failed = 0;
    for generator in cx.pipeline.generators() {
        if let Err(err) = generator.generate(site, cx) {
            let err = err.context(format!("Generator `{}` failed", generator.name()));
            if !cx.config.keep_going {
                return Err(err);
            }
            log!("error"; "{err:#}");
            failed += match err.downcast_ref::<TemplateError>() {
                Some(TemplateError::PagesFailed { failed, .. }) => *failed,
                _ => 1,
            };
        }
    }
    Ok(failed)
}

fn finish(failed: usize, start: Instant) -> Result<()> {
    if failed > 0 {
        bail!("build finished with {failed} error(s)");
    }
    log!("build"; "done in {:.2?}", start.elapsed());
    Ok(())
}

/// Log build result based on output directory contents
fn log_build_result(output: &Path) -> Result<()> {
    let file_count = fs::read_dir(output)?
        .filter_map(Result::ok)
        .filter(|e| e.file_name() != DESTINATION_MARKER)
        .count();

    if file_count == 0 {
        log!("warn"; "output is empty, check the source directory");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pipeline::{Processor, TemplateRenderer}, plugins::register_plugins};
    use std::{cell::Cell, collections::BTreeMap, path::PathBuf, rc::Rc};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let fx = Self {
                dir: tempfile::tempdir().unwrap(),
            };
            fx.write("_config.yml", "title: Test Blog\n");
            fx.write(
                "_layouts/base.html",
                "---\nlayout: nil\n---\n<html>{{ content }}</html>",
            );
            fx.write(
                "_layouts/post.html",
                "---\nlayout: base\n---\n<h1>{{ page.title }}</h1>{{ content }}\
                 {% if page.next %}<a href=\"{{ page.next.url }}\">older</a>{% endif %}",
            );
            fx.write("_posts/2021-01-01-first.md", "---\nlayout: post\ntitle: First\n---\nOne\n");
            fx.write("_posts/2021-01-02-second.md", "---\nlayout: post\ntitle: Second\ntags: [rust]\n---\nTwo\n");
            fx.write("_posts/2021-01-03-third.md", "---\nlayout: post\ntitle: Third\ntags: [rust]\n---\nThree\n");
            fx.write(
                "index.html",
                "---\nlayout: base\n---\n{% for post in site.posts %}{{ post.id }};{% endfor %}",
            );
            fx.write("about.md", "---\ntitle: About\n---\n# {{ site.title }}\n");
            fx.write("css/site.css", "body {}\n");
            fx.write("_drafts/idea.md", "---\nlayout: post\ntitle: Idea\n---\nMaybe\n");
            fx.write("notes.txt~", "backup");
            fx
        }

        fn write(&self, path: &str, content: &str) {
            let full = self.dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }

        fn config(&self) -> SiteConfig {
            SiteConfig::load(self.dir.path()).unwrap()
        }

        fn output(&self, config: &SiteConfig, path: &str) -> Option<String> {
            fs::read_to_string(config.destination.join(path)).ok()
        }
    }

    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
            .collect()
    }

    #[test]
    fn test_full_build() {
        let fx = Fixture::new();
        let config = fx.config();
        let site = build_site(&config, &Pipeline::with_builtins()).unwrap();

        assert_eq!(site.posts().len(), 3);
        assert_eq!(
            fx.output(&config, "index.html").unwrap(),
            "<html>/2021/01/03/third;/2021/01/02/second;/2021/01/01/first;</html>"
        );
        assert_eq!(fx.output(&config, "about.html").unwrap().trim(), "<h1>Test Blog</h1>");
        assert_eq!(fx.output(&config, "css/site.css").unwrap(), "body {}\n");
        assert!(config.destination.join(DESTINATION_MARKER).exists());

        // excluded, hidden and draft sources produce nothing
        assert!(fx.output(&config, "notes.txt~").is_none());
        assert!(fx.output(&config, "_config.yml").is_none());
        assert!(!config.destination.join("_layouts").exists());
        assert!(site.posts().iter().all(|p| p["title"] != "Idea"));
    }

    #[test]
    fn test_post_layout_chain_and_links() {
        let fx = Fixture::new();
        let config = fx.config();
        build_site(&config, &Pipeline::with_builtins()).unwrap();

        let second = fx.output(&config, "2021/01/02/second.html").unwrap();
        assert_eq!(
            second,
            "<html><h1>Second</h1><p>Two</p>\n<a href=\"/2021/01/01/first.html\">older</a></html>"
        );
        let first = fx.output(&config, "2021/01/01/first.html").unwrap();
        assert!(!first.contains("older"));
    }

    #[test]
    fn test_drafts_enabled() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.drafts = true;
        let site = build_site(&config, &Pipeline::with_builtins()).unwrap();

        assert_eq!(site.posts().len(), 4);
        assert!(site.posts().iter().any(|p| p["title"] == "Idea"));
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let fx = Fixture::new();
        let config = fx.config();
        let pipeline = Pipeline::with_builtins();

        build_site(&config, &pipeline).unwrap();
        let first = snapshot(&config.destination);
        build_site(&config, &pipeline).unwrap();
        let second = snapshot(&config.destination);

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_refuses_unmarked_destination() {
        let fx = Fixture::new();
        fx.write("_site/precious.txt", "keep me");
        let mut config = fx.config();

        let err = build_site(&config, &Pipeline::with_builtins()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnmarkedDestination(_))
        ));
        assert!(config.destination.join("precious.txt").exists());

        config.force = true;
        build_site(&config, &Pipeline::with_builtins()).unwrap();
        assert!(!config.destination.join("precious.txt").exists());
        assert!(config.destination.join(DESTINATION_MARKER).exists());
    }

    #[test]
    fn test_empty_destination_is_accepted() {
        let fx = Fixture::new();
        fs::create_dir(fx.dir.path().join("_site")).unwrap();
        build_site(&fx.config(), &Pipeline::with_builtins()).unwrap();
    }

    #[test]
    fn test_refuses_destination_containing_source() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.destination = config.source.clone();
        config.force = true;

        let err = build_site(&config, &Pipeline::with_builtins()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Validation(_))
        ));
        assert!(fx.dir.path().join("index.html").exists());
    }

    #[test]
    fn test_parse_error_aborts_before_wipe() {
        let fx = Fixture::new();
        let config = fx.config();
        let pipeline = Pipeline::with_builtins();
        build_site(&config, &pipeline).unwrap();

        fx.write("broken.md", "---\ntitle: never closed\n");
        let err = build_site(&config, &pipeline).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ParseError>(),
            Some(ParseError::Unterminated(_))
        ));
        assert!(fx.output(&config, "index.html").is_some());
    }

    #[test]
    fn test_keep_going_reports_at_end() {
        let fx = Fixture::new();
        fx.write("broken.md", "---\ntitle: never closed\n");
        fx.write("bad-template.html", "---\n---\n{% for %}");
        fx.write("bad-include.html", "---\n---\n{% include \"missing.html\" %}");
        let mut config = fx.config();
        config.keep_going = true;

        let err = build_site(&config, &Pipeline::with_builtins()).unwrap_err();

        // one skipped source plus one per page that failed to render
        assert_eq!(err.to_string(), "build finished with 3 error(s)");
        assert!(fx.output(&config, "index.html").is_some());
        assert!(fx.output(&config, "css/site.css").is_some());
        assert!(fx.output(&config, "bad-template.html").is_none());
    }

    #[test]
    fn test_missing_layout_fails_build() {
        let fx = Fixture::new();
        fx.write("page.html", "---\nlayout: nowhere\n---\nx");
        let err = build_site(&fx.config(), &Pipeline::with_builtins()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TemplateError>(),
            Some(TemplateError::MissingLayout { .. })
        ));
    }

    #[test]
    fn test_delta_build_touches_only_changed_paths() {
        let fx = Fixture::new();
        let config = fx.config();
        let pipeline = Pipeline::with_builtins();
        build_site(&config, &pipeline).unwrap();
        fs::remove_file(config.destination.join("about.html")).unwrap();

        fx.write("_posts/2021-01-02-second.md", "---\nlayout: post\ntitle: Changed\n---\nNew\n");
        let site = build_delta(&config, &pipeline, &["_posts/2021-01-02-second.md".into()]).unwrap();

        assert_eq!(site.posts().len(), 1);
        assert!(site.pages().is_empty());
        let second = fx.output(&config, "2021/01/02/second.html").unwrap();
        assert_eq!(second, "<html><h1>Changed</h1><p>New</p>\n</html>");
        assert!(fx.output(&config, "about.html").is_none());
        assert!(fx.output(&config, "index.html").is_some());
    }

    #[test]
    fn test_delta_build_refuses_unmarked_destination() {
        let fx = Fixture::new();
        fx.write("_site/precious.txt", "keep me");
        let config = fx.config();

        let err = build_delta(&config, &Pipeline::with_builtins(), &["about.md".into()])
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnmarkedDestination(_))
        ));
        assert!(fx.output(&config, "about.html").is_none());
    }

    #[test]
    fn test_delta_build_skips_vanished_paths() {
        let fx = Fixture::new();
        let config = fx.config();
        let pipeline = Pipeline::with_builtins();
        build_site(&config, &pipeline).unwrap();

        let site = build_delta(&config, &pipeline, &["gone.md".into()]).unwrap();
        assert!(site.pages().is_empty());
    }

    struct SawLinks(Rc<Cell<Option<bool>>>);

    impl Processor for SawLinks {
        fn name(&self) -> &str {
            "saw-links"
        }

        fn process(&self, site: &mut Site, _cx: &BuildContext) -> Result<()> {
            let linked = site.posts().iter().any(|p| p.get("next").is_some());
            self.0.set(Some(linked));
            Ok(())
        }
    }

    #[test]
    fn test_extension_processor_runs_before_post_processing() {
        let fx = Fixture::new();
        let saw = Rc::new(Cell::new(None));
        let mut pipeline = Pipeline::with_builtins();
        pipeline.register_processor(SawLinks(saw.clone()));

        build_site(&fx.config(), &pipeline).unwrap();

        assert_eq!(saw.get(), Some(false));
    }

    /// Prefixes the page title and leaves the template text alone.
    struct TitlePrefix;

    impl TemplateRenderer for TitlePrefix {
        fn render(
            &self,
            template: &str,
            context: &minijinja::Value,
            _cx: &BuildContext,
        ) -> Result<String> {
            let title = context.get_attr("page").and_then(|page| page.get_attr("title"))?;
            Ok(format!("[{title}]{template}"))
        }
    }

    #[test]
    fn test_custom_template_renderer() {
        let fx = Fixture::new();
        let config = fx.config();
        let mut pipeline = Pipeline::with_builtins();
        pipeline.set_template_renderer(TitlePrefix);

        build_site(&config, &pipeline).unwrap();

        // markdown conversion still runs on the renderer's output
        assert_eq!(
            fx.output(&config, "about.html").unwrap().trim(),
            "<p>[About]# {{ site.title }}</p>"
        );
    }

    #[test]
    fn test_plugins_end_to_end() {
        let fx = Fixture::new();
        fx.write("_plugins/tags.yml", "kind: tags\n");
        fx.write("_plugins/data.yml", "kind: data\npath: _data/nav.yml\nkey: nav\n");
        fx.write("_data/nav.yml", "- {title: Home, url: /}\n");
        fx.write(
            "_layouts/tag.html",
            "{{ page.tag }}:{% for p in page.posts %}{{ p.title }},{% endfor %}",
        );
        fx.write("nav.html", "---\n---\n{% for item in site.nav %}{{ item.title }}{% endfor %}");
        let config = fx.config();
        let mut pipeline = Pipeline::with_builtins();
        register_plugins(&mut pipeline, &config).unwrap();

        build_site(&config, &pipeline).unwrap();

        assert_eq!(fx.output(&config, "tags/rust.html").unwrap(), "rust:Third,Second,");
        assert_eq!(fx.output(&config, "nav.html").unwrap(), "Home");
        assert!(fx.output(&config, "_data/nav.yml").is_none());
    }

    #[test]
    fn test_collect_sources_skips_destination() {
        let fx = Fixture::new();
        let config = fx.config();
        build_site(&config, &Pipeline::with_builtins()).unwrap();

        let paths = collect_sources(&config);
        assert!(paths.iter().all(|p| !p.starts_with("_site")));
        assert!(paths.contains(&"_posts/2021-01-01-first.md".to_owned()));
        assert!(paths.contains(&"_config.yml".to_owned()));
        assert_eq!(paths.first().map(String::as_str), Some("_config.yml"));
    }

    #[test]
    fn test_collect_sources_skips_walk_errors() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.source = fx.dir.path().join("missing");

        assert!(collect_sources(&config).is_empty());
    }
}
