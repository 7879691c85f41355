//! Boilerplate stripping and text normalization for fetched pages.
//!
//! The exclusion list is a curated set of selectors for non-content markup
//! (scripts, navigation, ads). Dropping real content on exotic layouts and
//! leaving boilerplate on others are both accepted tradeoffs; this is not a
//! generic readability algorithm.

use std::collections::HashSet;

use ego_tree::{NodeId, NodeRef};
use scraper::{Html, Node, Selector};

use pagewatch_shared::{PagewatchError, Result};

/// Compiled exclusion list applied before text extraction.
#[derive(Debug, Clone)]
pub struct StripList {
    selectors: Vec<Selector>,
}

impl StripList {
    /// Compile a list of CSS selectors. Fails on the first invalid selector
    /// so a bad config line surfaces at startup, not mid-pass.
    pub fn compile(selectors: &[String]) -> Result<Self> {
        let selectors = selectors
            .iter()
            .map(|s| {
                Selector::parse(s)
                    .map_err(|e| PagewatchError::config(format!("invalid strip selector '{s}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { selectors })
    }
}

/// Extract normalized text from an HTML document.
///
/// Elements matching the strip list are removed (with their subtrees), text
/// is taken from `<body>` only, and whitespace runs collapse to single
/// spaces with the ends trimmed.
pub fn extract_text(html: &str, strip: &StripList) -> String {
    let doc = Html::parse_document(html);

    // Collect the subtree roots to skip
    let mut excluded: HashSet<NodeId> = HashSet::new();
    for selector in &strip.selectors {
        for el in doc.select(selector) {
            excluded.insert(el.id());
        }
    }

    let body_sel = Selector::parse("body").expect("valid selector");
    let Some(body) = doc.select(&body_sel).next() else {
        return String::new();
    };

    let mut text = String::new();
    collect_text(*body, &excluded, &mut text);
    normalize_whitespace(&text)
}

/// Depth-first text collection, skipping excluded subtrees.
fn collect_text(node: NodeRef<'_, Node>, excluded: &HashSet<NodeId>, out: &mut String) {
    if excluded.contains(&node.id()) {
        return;
    }

    if let Node::Text(text) = node.value() {
        out.push_str(&text);
        return;
    }

    for child in node.children() {
        collect_text(child, excluded, out);
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_strip() -> StripList {
        let config = pagewatch_shared::FetchConfig::default();
        StripList::compile(&config.strip_selectors).expect("default list compiles")
    }

    #[test]
    fn normalize_collapses_runs() {
        assert_eq!(normalize_whitespace("a\n\n  b\t c"), "a b c");
        assert_eq!(normalize_whitespace("  leading and trailing  "), "leading and trailing");
        assert_eq!(normalize_whitespace(""), "");
        assert_eq!(normalize_whitespace(" \t\n "), "");
    }

    #[test]
    fn strips_script_and_style() {
        let html = r#"<html><body>
            <p>Price: $10</p>
            <script>trackVisit();</script>
            <style>.hidden { display: none; }</style>
        </body></html>"#;

        let text = extract_text(html, &default_strip());
        assert_eq!(text, "Price: $10");
    }

    #[test]
    fn strips_navigation_chrome() {
        let html = r#"<html><body>
            <header>Site Title</header>
            <nav><a href="/">Home</a><a href="/about">About</a></nav>
            <div role="banner">Banner text</div>
            <main>
                <h1>Plans</h1>
                <p>Starter plan now $29/mo</p>
            </main>
            <footer>© 2024 Example Corp</footer>
        </body></html>"#;

        let text = extract_text(html, &default_strip());
        assert_eq!(text, "Plans Starter plan now $29/mo");
    }

    #[test]
    fn strips_ad_classes() {
        let html = r#"<html><body>
            <div class="ad">Buy now!</div>
            <div class="advertisement">Sponsored</div>
            <p>Real content</p>
        </body></html>"#;

        let text = extract_text(html, &default_strip());
        assert_eq!(text, "Real content");
    }

    #[test]
    fn ignores_head_content() {
        let html = r#"<html>
            <head><title>Page Title</title><meta name="description" content="meta text"></head>
            <body><p>Body text</p></body>
        </html>"#;

        let text = extract_text(html, &default_strip());
        assert_eq!(text, "Body text");
    }

    #[test]
    fn keeps_nested_content_outside_excluded_subtrees() {
        let html = r#"<html><body>
            <div>
                <nav>skip me</nav>
                <section>
                    <p>First</p>
                    <p>Second</p>
                </section>
            </div>
        </body></html>"#;

        let text = extract_text(html, &default_strip());
        assert_eq!(text, "First Second");
    }

    #[test]
    fn custom_strip_list() {
        let strip = StripList::compile(&[".cookie-banner".to_string()]).unwrap();
        let html = r#"<html><body>
            <div class="cookie-banner">We use cookies</div>
            <script>var x = 1;</script>
            <p>Content</p>
        </body></html>"#;

        // Only the custom selector is stripped; script text survives
        let text = extract_text(html, &strip);
        assert_eq!(text, "var x = 1; Content");
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let result = StripList::compile(&["<<<".to_string()]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("strip selector"));
    }
}
