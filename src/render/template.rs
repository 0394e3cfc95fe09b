//! Template rendering with minijinja.
//!
//! Every render gets a fresh environment: `{% include %}` resolves against
//! `<source>/_includes`, registered template filters are installed, and no
//! auto-escaping is applied (sources are trusted HTML).

use crate::pipeline::{BuildContext, TemplateRenderer};
use anyhow::{Result, anyhow};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, Value};

const TEMPLATE_NAME: &str = "<page>";

#[derive(Debug, Clone, Copy, Default)]
pub struct JinjaRenderer;

impl TemplateRenderer for JinjaRenderer {
    fn render(&self, template: &str, context: &Value, cx: &BuildContext) -> Result<String> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_loader(minijinja::path_loader(cx.config.includes_dir()));

        for (name, filter) in cx.pipeline.template_filters() {
            let filter = filter.clone();
            env.add_filter(name.clone(), move |value: String| -> Result<String, Error> {
                filter
                    .apply(&value)
                    .map_err(|err| Error::new(ErrorKind::InvalidOperation, format!("{err:#}")))
            });
        }

        env.add_template(TEMPLATE_NAME, template).map_err(|err| anyhow!("{err:#}"))?;
        let tmpl = env.get_template(TEMPLATE_NAME).map_err(|err| anyhow!("{err:#}"))?;
        tmpl.render(context).map_err(|err| anyhow!("{err:#}"))
    }
}
