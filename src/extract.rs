//! DOM extraction collaborator: turns raw HTML into labeled text blocks.
//!
//! Non-content regions (scripts, navigation, footers, ...) are excluded and
//! blocks shorter than the minimum character threshold are filtered out, so
//! nothing that reaches the segmenter tokenizes to an empty sequence.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// Elements whose subtrees never contribute text.
const STRIP_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "iframe", "noscript",
];

/// Elements considered content-bearing.
const CONTENT_SELECTOR: &str = "p, div, article, section, li, td, h1, h2, h3, h4, h5, h6";

/// Extraction thresholds.
#[derive(Clone, Debug)]
pub struct ExtractConfig {
    /// Blocks with fewer visible characters than this are dropped.
    pub min_block_chars: usize,
    /// HTML snippets are capped at this many characters.
    pub snippet_max_chars: usize,
    /// Structural paths walk at most this many ancestor levels.
    pub path_depth: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_block_chars: 20,
            snippet_max_chars: 2000,
            path_depth: 6,
        }
    }
}

/// A labeled run of page text in document order.
///
/// `position` is a stable ordinal assigned during extraction;
/// `structural_path` is a short human-readable locator such as
/// `html > body > div.main > p`. Immutable once produced.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub html_snippet: String,
    pub structural_path: String,
    pub position: usize,
}

/// Walks a parsed document and emits [`TextBlock`]s for content elements.
#[derive(Clone, Debug)]
pub struct ContentExtractor {
    config: ExtractConfig,
    content_selector: Selector,
}

impl ContentExtractor {
    pub fn new(config: ExtractConfig) -> Self {
        let content_selector =
            Selector::parse(CONTENT_SELECTOR).expect("content selector is valid");
        Self {
            config,
            content_selector,
        }
    }

    /// Extracts content blocks from raw HTML.
    ///
    /// Returns blocks in document order with sequential positions. An empty
    /// result means the page had nothing worth indexing.
    pub fn extract(&self, html: &str) -> Vec<TextBlock> {
        let document = Html::parse_document(html);
        let mut blocks = Vec::new();
        let mut position = 0usize;

        for element in document.select(&self.content_selector) {
            if inside_stripped_region(element) {
                continue;
            }

            let text = visible_text(element);
            if text.chars().count() < self.config.min_block_chars {
                continue;
            }

            let html_snippet = truncate_chars(element.html(), self.config.snippet_max_chars);
            let structural_path = structural_path(element, self.config.path_depth);

            blocks.push(TextBlock {
                text,
                html_snippet,
                structural_path,
                position,
            });
            position += 1;
        }

        tracing::debug!(blocks = blocks.len(), "extracted content blocks");
        blocks
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(ExtractConfig::default())
    }
}

fn inside_stripped_region(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| STRIP_TAGS.contains(&ancestor.value().name()))
}

/// Collects the element's text, skipping stripped subtrees, with whitespace
/// runs collapsed to single spaces.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push(' ');
                out.push_str(&text.text);
            }
            Node::Element(el) if !STRIP_TAGS.contains(&el.name()) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
            }
            _ => {}
        }
    }
}

/// Ancestor-tag chain with the first class (or id) per element, capped at
/// `depth` levels, e.g. `body > div.main > p`.
fn structural_path(element: ElementRef<'_>, depth: usize) -> String {
    let mut parts = Vec::new();

    for node in std::iter::once(element).chain(element.ancestors().filter_map(ElementRef::wrap)) {
        let value = node.value();
        let mut selector = value.name().to_string();
        if let Some(class) = value.classes().next() {
            selector.push('.');
            selector.push_str(class);
        } else if let Some(id) = value.id() {
            selector.push('#');
            selector.push_str(id);
        }
        parts.push(selector);
        if parts.len() >= depth {
            break;
        }
    }

    parts.reverse();
    parts.join(" > ")
}

fn truncate_chars(input: String, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        input
    } else {
        input.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_html() -> &'static str {
        r#"<!DOCTYPE html>
<html>
<head><title>Doc</title><script>var tracking = true;</script></head>
<body>
    <nav><p>Site navigation links that are long enough to pass filters</p></nav>
    <div class="main">
        <p>The first paragraph carries enough text to be extracted as a block.</p>
        <p>tiny</p>
        <p>A second paragraph, also comfortably above the minimum threshold.</p>
    </div>
    <footer><p>Copyright notice that would otherwise be long enough too.</p></footer>
</body>
</html>"#
    }

    #[test]
    fn skips_stripped_regions_and_short_blocks() {
        let extractor = ContentExtractor::default();
        let blocks = extractor.extract(sample_html());

        assert!(!blocks.is_empty());
        for block in &blocks {
            assert!(!block.text.contains("navigation"), "nav text leaked");
            assert!(!block.text.contains("Copyright"), "footer text leaked");
            assert!(!block.text.contains("tracking"), "script text leaked");
            assert!(block.text.chars().count() >= 20);
        }
    }

    #[test]
    fn positions_are_sequential_document_order() {
        let extractor = ContentExtractor::default();
        let blocks = extractor.extract(sample_html());

        for (expected, block) in blocks.iter().enumerate() {
            assert_eq!(block.position, expected);
        }
        let first_para = blocks
            .iter()
            .find(|b| b.text.starts_with("The first paragraph"))
            .expect("first paragraph extracted");
        let second_para = blocks
            .iter()
            .find(|b| b.text.starts_with("A second paragraph"))
            .expect("second paragraph extracted");
        assert!(first_para.position < second_para.position);
    }

    #[test]
    fn structural_path_uses_classes_and_caps_depth() {
        let extractor = ContentExtractor::default();
        let blocks = extractor.extract(sample_html());
        let block = blocks
            .iter()
            .find(|b| b.text.starts_with("The first paragraph"))
            .expect("paragraph extracted");

        assert!(block.structural_path.contains("div.main"));
        assert!(block.structural_path.ends_with("> p"));
        assert!(block.structural_path.split(" > ").count() <= 6);
    }

    #[test]
    fn deep_nesting_respects_path_cap() {
        let html = "<html><body><div><div><div><div><div><div><div>\
                    <p>Nested content that is clearly long enough to extract.</p>\
                    </div></div></div></div></div></div></div></body></html>";
        let extractor = ContentExtractor::default();
        let blocks = extractor.extract(html);
        let para = blocks
            .iter()
            .find(|b| b.structural_path.ends_with("> p"))
            .expect("nested paragraph extracted");
        assert_eq!(para.structural_path.split(" > ").count(), 6);
    }

    #[test]
    fn snippet_is_truncated_on_char_boundary() {
        let long_text = "é".repeat(3000);
        let html = format!("<html><body><p>{long_text}</p></body></html>");
        let extractor = ContentExtractor::default();
        let blocks = extractor.extract(&html);
        assert!(!blocks.is_empty());
        assert!(blocks[0].html_snippet.chars().count() <= 2000);
    }

    #[test]
    fn empty_page_yields_no_blocks() {
        let extractor = ContentExtractor::default();
        assert!(extractor.extract("<html><body></body></html>").is_empty());
    }

    #[test]
    fn text_whitespace_is_collapsed() {
        let html = "<html><body><p>spread      across\n\n   multiple    lines of text here</p></body></html>";
        let extractor = ContentExtractor::default();
        let blocks = extractor.extract(html);
        assert_eq!(
            blocks[0].text,
            "spread across multiple lines of text here"
        );
    }
}
