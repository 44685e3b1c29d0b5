//! Markdown post-processing.
//!
//! Whitespace collapse and paragraph dedup, with fenced code segments
//! protected — indentation and ASCII art inside fences survive verbatim.
//! The whole pipeline is idempotent: running it twice yields the same
//! string.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static CODE_FENCE_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(```[^\n]*\n.*?```)")
        .expect("SAFETY: hardcoded code-fence regex is statically valid")
});

static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{3,}").expect("SAFETY: hardcoded newline regex is statically valid")
});

static TRAILING_SPACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]+\n").expect("SAFETY: hardcoded trailing-space regex is statically valid")
});

static EMPTY_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^#{1,6}\s*$").expect("SAFETY: hardcoded empty-heading regex is statically valid")
});

static LINK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]?\s*\[.{1,60}\]\(.*\)\s*$")
        .expect("SAFETY: hardcoded link-line regex is statically valid")
});

/// Paragraphs shorter than this never dedup — short repeats (dates, list
/// labels) are usually legitimate. Heuristic carried from production
/// tuning, not load-bearing.
const DEDUP_MIN_LEN: usize = 80;

/// Collapse whitespace and dedup paragraphs outside code fences.
#[must_use]
pub fn postprocess_markdown(markdown: &str) -> String {
    let mut cleaned_parts = Vec::new();
    let mut last_end = 0;

    // Walk fence matches, cleaning only the text between them.
    for m in CODE_FENCE_SPLIT.find_iter(markdown) {
        cleaned_parts.push(clean_segment(&markdown[last_end..m.start()]));
        cleaned_parts.push(markdown[m.range()].to_string());
        last_end = m.end();
    }
    cleaned_parts.push(clean_segment(&markdown[last_end..]));
    let merged = cleaned_parts.concat();

    let deduped = deduplicate_paragraphs(&merged);
    let no_empty_headings = EMPTY_HEADING.replace_all(&deduped, "");
    let collapsed = EXCESS_NEWLINES.replace_all(&no_empty_headings, "\n\n");
    collapsed.trim().to_string()
}

fn clean_segment(segment: &str) -> String {
    let collapsed = EXCESS_NEWLINES.replace_all(segment, "\n\n");
    TRAILING_SPACES.replace_all(&collapsed, "\n").into_owned()
}

/// Drop repeated paragraphs (carousel slides, duplicated sections).
/// Normalization for comparison: lowercase + whitespace collapse. Only
/// paragraphs of at least [`DEDUP_MIN_LEN`] chars participate.
fn deduplicate_paragraphs(markdown: &str) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();

    for block in markdown.split("\n\n") {
        let normalized: String = block
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if normalized.len() < DEDUP_MIN_LEN {
            kept.push(block);
            continue;
        }
        if seen.insert(normalized) {
            kept.push(block);
        }
    }

    kept.join("\n\n")
}

/// Drop runs of 5+ consecutive short link-only lines (nav menus that
/// survived cleaning).
#[must_use]
pub fn remove_link_clusters(markdown: &str) -> String {
    let mut result: Vec<&str> = Vec::new();
    let mut cluster: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        if LINK_LINE.is_match(line) {
            cluster.push(line);
        } else {
            if cluster.len() < 5 {
                result.append(&mut cluster);
            } else {
                cluster.clear();
            }
            result.push(line);
        }
    }
    if cluster.len() < 5 {
        result.append(&mut cluster);
    }

    result.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_newline_runs() {
        let md = "a\n\n\n\n\nb";
        assert_eq!(postprocess_markdown(md), "a\n\nb");
    }

    #[test]
    fn code_fences_are_protected() {
        let md = "before\n\n```text\nline   with   spaces    \n\n\n\nmore\n```\n\nafter";
        let processed = postprocess_markdown(md);
        assert!(processed.contains("line   with   spaces    \n\n\n\nmore"));
    }

    #[test]
    fn long_duplicate_paragraphs_removed() {
        let para = "This paragraph is quite long and repeats itself verbatim across the page like a carousel slide would.";
        let md = format!("{para}\n\n{para}\n\nshort\n\nshort");
        let processed = postprocess_markdown(&md);
        assert_eq!(processed.matches("carousel").count(), 1);
        // Short blocks never dedup.
        assert_eq!(processed.matches("short").count(), 2);
    }

    #[test]
    fn postprocess_is_idempotent() {
        let md = "# Title\n\n\n\ntext   \nwith trailing\n\n```rs\nlet x = 1;\n```\n\n\nmore";
        let once = postprocess_markdown(md);
        let twice = postprocess_markdown(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn link_clusters_removed() {
        let nav: Vec<String> = (0..6)
            .map(|i| format!("- [Item {i}](https://example.com/{i})"))
            .collect();
        let md = format!("intro\n{}\noutro", nav.join("\n"));
        let cleaned = remove_link_clusters(&md);
        assert!(cleaned.contains("intro"));
        assert!(cleaned.contains("outro"));
        assert!(!cleaned.contains("Item 3"));
    }

    #[test]
    fn short_link_lists_survive() {
        let md = "intro\n- [a](https://example.com/a)\n- [b](https://example.com/b)\noutro";
        assert_eq!(remove_link_clusters(md), md);
    }
}
