//! Hook registries of a build.
//!
//! A [`Pipeline`] holds every loader, processor, generator, filter and the
//! template renderer used by one invocation. It is assembled once (built-ins
//! first, then extensions) and handed to the build orchestrator.
//!
//! | Registry          | Registration | Runs                                  |
//! |-------------------|--------------|---------------------------------------|
//! | loaders           | prepend      | first claiming loader wins            |
//! | fallback loaders  | append       | after every other loader declined     |
//! | processors        | prepend      | once per build, in list order         |
//! | generators        | append       | after all processors, in list order   |

use crate::{
    config::SiteConfig,
    content::{
        loaders::{DraftLoader, FileLoader, PageLoader, PostLoader},
        posts::ProcessPosts,
    },
    generator::{files::FileGenerator, pages::PageGenerator},
    render::{markdown, template::JinjaRenderer},
    site::{Fragment, Site},
    utils::category::PathClassifier,
};
use anyhow::Result;
use minijinja::Value as TemplateValue;
use std::{collections::BTreeMap, sync::Arc};

/// Claims a source path and turns it into a site fragment.
pub trait Loader {
    fn name(&self) -> &str;

    /// `Ok(None)` leaves the path to the next loader.
    fn load(&self, path: &str, cx: &BuildContext) -> Result<Option<Fragment>>;
}

/// Mutates the site model after loading.
pub trait Processor {
    fn name(&self) -> &str;

    fn process(&self, site: &mut Site, cx: &BuildContext) -> Result<()>;
}

/// Writes output derived from the final site model.
pub trait Generator {
    fn name(&self) -> &str;

    fn generate(&self, site: &Site, cx: &BuildContext) -> Result<()>;
}

/// Text to text conversion, used for source extensions and template filters.
pub trait ContentFilter {
    fn apply(&self, text: &str) -> Result<String>;
}

impl<F> ContentFilter for F
where
    F: Fn(&str) -> Result<String>,
{
    fn apply(&self, text: &str) -> Result<String> {
        self(text)
    }
}

/// Expands a template string against a context.
///
/// The context is a map with `site`, `page` and, inside layouts, `content`.
/// `site` is converted once per generator run and shared by every page.
pub trait TemplateRenderer {
    fn render(
        &self,
        template: &str,
        context: &TemplateValue,
        cx: &BuildContext,
    ) -> Result<String>;
}

/// A bundle of hooks registered into a pipeline.
pub trait Extension {
    fn name(&self) -> &str;

    fn register(&self, pipeline: &mut Pipeline) -> Result<()>;
}

pub type SharedFilter = Arc<dyn ContentFilter + Send + Sync>;

pub struct Pipeline {
    loaders: Vec<Box<dyn Loader>>,
    fallback_loaders: Vec<Box<dyn Loader>>,
    processors: Vec<Box<dyn Processor>>,
    generators: Vec<Box<dyn Generator>>,
    content_filters: BTreeMap<String, SharedFilter>,
    template_filters: BTreeMap<String, SharedFilter>,
    renderer: Box<dyn TemplateRenderer>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            loaders: Vec::new(),
            fallback_loaders: Vec::new(),
            processors: Vec::new(),
            generators: Vec::new(),
            content_filters: BTreeMap::new(),
            template_filters: BTreeMap::new(),
            renderer: Box::new(JinjaRenderer),
        }
    }
}

impl Pipeline {
    /// Pipeline with the built-in hooks.
    ///
    /// Effective loader order is post, draft, page, then the file fallback.
    pub fn with_builtins() -> Self {
        let mut pipeline = Self::default();

        pipeline.register_loader(PageLoader);
        pipeline.register_loader(DraftLoader);
        pipeline.register_loader(PostLoader);
        pipeline.register_fallback_loader(FileLoader);

        pipeline.register_processor(ProcessPosts);

        pipeline.register_generator(PageGenerator);
        pipeline.register_generator(FileGenerator);

        let filter: SharedFilter = Arc::new(markdown::markdown_to_html);
        pipeline.register_content_filter_shared(&[".md", ".markdown"], filter.clone());
        pipeline.register_template_filter_shared("markdownify", filter);

        pipeline
    }

    pub fn register_loader(&mut self, loader: impl Loader + 'static) {
        self.loaders.insert(0, Box::new(loader));
    }

    pub fn register_fallback_loader(&mut self, loader: impl Loader + 'static) {
        self.fallback_loaders.push(Box::new(loader));
    }

    pub fn register_processor(&mut self, processor: impl Processor + 'static) {
        self.processors.insert(0, Box::new(processor));
    }

    pub fn register_generator(&mut self, generator: impl Generator + 'static) {
        self.generators.push(Box::new(generator));
    }

    /// Register a filter for source extensions such as `.md` (dot included).
    pub fn register_content_filter(
        &mut self,
        extensions: &[&str],
        filter: impl ContentFilter + Send + Sync + 'static,
    ) {
        self.register_content_filter_shared(extensions, Arc::new(filter));
    }

    pub fn register_content_filter_shared(&mut self, extensions: &[&str], filter: SharedFilter) {
        for ext in extensions {
            self.content_filters.insert((*ext).to_owned(), filter.clone());
        }
    }

    pub fn register_template_filter(
        &mut self,
        name: &str,
        filter: impl ContentFilter + Send + Sync + 'static,
    ) {
        self.register_template_filter_shared(name, Arc::new(filter));
    }

    pub fn register_template_filter_shared(&mut self, name: &str, filter: SharedFilter) {
        self.template_filters.insert(name.to_owned(), filter);
    }

    pub fn set_template_renderer(&mut self, renderer: impl TemplateRenderer + 'static) {
        self.renderer = Box::new(renderer);
    }

    pub fn register_extension(&mut self, extension: &dyn Extension) -> Result<()> {
        extension.register(self)
    }

    /// Loaders in the order a path is offered to them.
    pub fn loaders(&self) -> impl Iterator<Item = &Box<dyn Loader>> {
        self.loaders.iter().chain(&self.fallback_loaders)
    }

    pub fn processors(&self) -> impl Iterator<Item = &Box<dyn Processor>> {
        self.processors.iter()
    }

    pub fn generators(&self) -> impl Iterator<Item = &Box<dyn Generator>> {
        self.generators.iter()
    }

    pub fn content_filter(&self, extension: &str) -> Option<&SharedFilter> {
        self.content_filters.get(extension)
    }

    pub fn has_content_filter(&self, extension: &str) -> bool {
        self.content_filters.contains_key(extension)
    }

    pub fn template_filters(&self) -> &BTreeMap<String, SharedFilter> {
        &self.template_filters
    }

    pub fn renderer(&self) -> &dyn TemplateRenderer {
        self.renderer.as_ref()
    }
}

/// Everything a hook may consult besides the site model.
pub struct BuildContext<'a> {
    pub config: &'a SiteConfig,
    pub classifier: &'a PathClassifier,
    pub pipeline: &'a Pipeline,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        config: &'a SiteConfig,
        classifier: &'a PathClassifier,
        pipeline: &'a Pipeline,
    ) -> Self {
        Self {
            config,
            classifier,
            pipeline,
        }
    }

    /// Offer `path` to every loader in order.
    pub fn load(&self, path: &str) -> Result<Option<Fragment>> {
        for loader in self.pipeline.loaders() {
            if let Some(fragment) = loader.load(path, self)? {
                return Ok(Some(fragment));
            }
        }
        Ok(None)
    }

    pub fn render_template(&self, template: &str, context: &TemplateValue) -> Result<String> {
        self.pipeline.renderer().render(template, context, self)
    }
}
