//! Markdown rendering for article display
//!
//! Articles are stored as markdown. The HTTP layer ships a rendered HTML copy
//! next to the raw text so clients do not each need a markdown engine.

use pulldown_cmark::{html, Event, Options, Parser, TagEnd};

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// Render markdown to HTML (tables, strikethrough and task lists enabled)
///
/// # Examples
///
/// ```rust
/// # use knowledgetree_core::utils::render_html;
/// assert_eq!(render_html("# Title"), "<h1>Title</h1>\n");
/// ```
pub fn render_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, options());
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Plain text of a markdown document, one line per block element
pub fn strip_markdown(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());

    for event in Parser::new_ext(markdown, options()) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock) => {
                out.push('\n')
            }
            _ => {}
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table() {
        let html = render_html("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_render_fenced_code() {
        let html = render_html("```\nls -la\n```");
        assert!(html.contains("<pre><code>ls -la\n</code></pre>"));
    }

    #[test]
    fn test_strip_markdown() {
        assert_eq!(
            strip_markdown("# Ticket 551\n\n**Status:** Open\n\n- [link](http://x)"),
            "Ticket 551\nStatus: Open\nlink"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(render_html(""), "");
        assert_eq!(strip_markdown(""), "");
    }
}
