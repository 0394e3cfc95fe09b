//! Markdown to HTML, used for `.md`/`.markdown` sources and `markdownify`.

use anyhow::Result;
use pulldown_cmark::{Options, Parser, html as md_html};

pub fn markdown_to_html(text: &str) -> Result<String> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(text, options);
    let mut html = String::with_capacity(text.len() * 3 / 2);
    md_html::push_html(&mut html, parser);
    Ok(html)
}
