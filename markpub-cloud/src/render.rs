//! Markdown to HTML rendering.

use pulldown_cmark::{Options, Parser, html};

/// Converts Markdown text to HTML. Must be pure: same input, same output.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// GitHub-flavored Markdown: tables, strikethrough, task lists, footnotes.
#[derive(Clone, Copy, Debug, Default)]
pub struct GfmRenderer;

impl GfmRenderer {
    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES
    }
}

impl MarkdownRenderer for GfmRenderer {
    fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

