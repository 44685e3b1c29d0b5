//! HTML to Markdown conversion.
//!
//! Built on htmd with custom element handlers: anchors keep their title
//! attribute, definition lists render as bold term + indented
//! description, `<time>` keeps its datetime attribute, and
//! `<details>`/`<summary>` stay as expandable blocks with a bold summary.

use htmd::{Element, HtmlToMarkdown};
use std::sync::LazyLock;
use tracing::warn;

fn attr(element: &Element, name: &str) -> Option<String> {
    element
        .attrs
        .iter()
        .find(|a| &*a.name.local == name)
        .map(|a| a.value.to_string())
}

static CONVERTER: LazyLock<HtmlToMarkdown> = LazyLock::new(|| {
    HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style"])
        .add_handler(vec!["a"], |element: Element| {
            let text = element.content.trim().to_string();
            let href = attr(&element, "href").unwrap_or_default();
            if text.is_empty() || href.is_empty() {
                return Some(text);
            }
            // Pure in-page anchors degrade to plain text.
            if href == "#" {
                return Some(text);
            }
            match attr(&element, "title") {
                Some(title) if !title.is_empty() => Some(format!("[{text}]({href} \"{title}\")")),
                _ => Some(format!("[{text}]({href})")),
            }
        })
        .add_handler(vec!["img"], |element: Element| {
            let src = attr(&element, "src").unwrap_or_default();
            if src.is_empty() {
                return Some(String::new());
            }
            let alt = attr(&element, "alt").unwrap_or_default();
            Some(format!("![{alt}]({src})"))
        })
        .add_handler(vec!["dl"], |element: Element| {
            Some(format!("\n{}\n", element.content))
        })
        .add_handler(vec!["dt"], |element: Element| {
            Some(format!("\n**{}**\n", element.content.trim()))
        })
        .add_handler(vec!["dd"], |element: Element| {
            Some(format!(": {}\n", element.content.trim()))
        })
        .add_handler(vec!["time"], |element: Element| {
            let display = element.content.trim().to_string();
            match attr(&element, "datetime") {
                Some(dt) if !dt.is_empty() && dt != display => {
                    Some(format!("{display} ({dt})"))
                }
                _ => Some(display),
            }
        })
        .add_handler(vec!["details"], |element: Element| {
            Some(format!("\n{}\n", element.content))
        })
        .add_handler(vec!["summary"], |element: Element| {
            Some(format!("\n**{}**\n", element.content.trim()))
        })
        .build()
});

/// Convert cleaned HTML to Markdown and run the post-processing pipeline.
#[must_use]
pub fn html_to_markdown(html: &str) -> String {
    let markdown = match CONVERTER.convert(html) {
        Ok(md) => md,
        Err(e) => {
            warn!(error = %e, "markdown conversion failed");
            return String::new();
        }
    };
    super::postprocess::postprocess_markdown(&markdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_keeps_title() {
        let md = html_to_markdown(r#"<p><a href="https://example.com/x" title="Docs">the docs</a></p>"#);
        assert!(md.contains(r#"[the docs](https://example.com/x "Docs")"#), "got: {md}");
    }

    #[test]
    fn bare_hash_anchor_degrades_to_text() {
        let md = html_to_markdown(r##"<p><a href="#">top</a></p>"##);
        assert!(md.contains("top"));
        assert!(!md.contains("](#)"));
    }

    #[test]
    fn definition_list_renders_bold_terms() {
        let md = html_to_markdown("<dl><dt>Term</dt><dd>Its meaning</dd></dl>");
        assert!(md.contains("**Term**"), "got: {md}");
        assert!(md.contains(": Its meaning"), "got: {md}");
    }

    #[test]
    fn time_preserves_datetime() {
        let md = html_to_markdown(r#"<p><time datetime="2024-05-01">May 1st</time></p>"#);
        assert!(md.contains("May 1st (2024-05-01)"), "got: {md}");
    }

    #[test]
    fn details_summary_block() {
        let md = html_to_markdown("<details><summary>More info</summary><p>hidden body</p></details>");
        assert!(md.contains("**More info**"), "got: {md}");
        assert!(md.contains("hidden body"), "got: {md}");
    }

    #[test]
    fn images_render_with_alt() {
        let md = html_to_markdown(r#"<img src="https://example.com/a.png" alt="diagram">"#);
        assert!(md.contains("![diagram](https://example.com/a.png)"), "got: {md}");
    }
}
