use std::sync::LazyLock;

use html_escape::decode_html_entities;
use regex::Regex;

use crate::app::{Result, SkufillError};
use crate::domain::LookupResult;
use crate::lookup::LookupConfig;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").expect("valid regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Pattern-based extraction of product fields from a raw lookup page.
///
/// This is a best-effort text match, not a document parse.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    description: Regex,
    image: Regex,
}

impl PageExtractor {
    pub fn new(description_pattern: &str, image_pattern: &str) -> Result<Self> {
        Ok(Self {
            description: compile_with_group("description_pattern", description_pattern)?,
            image: compile_with_group("image_pattern", image_pattern)?,
        })
    }

    pub fn from_config(config: &LookupConfig) -> Result<Self> {
        Self::new(&config.description_pattern, &config.image_pattern)
    }

    /// Extract the first description region and first image URL from `body`.
    pub fn extract(&self, body: &str) -> LookupResult {
        let description = self
            .description
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| strip_markup(m.as_str()))
            .filter(|d| !d.is_empty());

        let image_url = self
            .image
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| decode_html_entities(m.as_str().trim()).to_string())
            .filter(|u| !u.is_empty());

        LookupResult {
            description,
            image_url,
        }
    }
}

fn compile_with_group(name: &str, pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern)?;
    if regex.captures_len() < 2 {
        return Err(SkufillError::Config(format!(
            "{} must contain a capture group",
            name
        )));
    }
    Ok(regex)
}

/// Remove markup from an HTML fragment, leaving decoded, whitespace-collapsed text.
pub fn strip_markup(html: &str) -> String {
    let without_blocks = SCRIPT_OR_STYLE.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_blocks, " ");
    let decoded = decode_html_entities(&without_tags);
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <div id="largeProductImage">
            <img alt="Mouse" src="https://images.test/mouse.jpg?w=500&amp;h=500">
        </div>
        <div class="product-details">
            <div class="product-description col-md-12">
                <p>Wireless <b>optical</b> mouse</p>
                <p>2.4 GHz &amp; Bluetooth</p>
            </div>
        </div>
        <div class="product-description">Second description</div>
    </body></html>"#;

    fn extractor() -> PageExtractor {
        PageExtractor::from_config(&LookupConfig::default()).unwrap()
    }

    #[test]
    fn test_extracts_first_description_and_image() {
        let result = extractor().extract(PAGE);

        assert_eq!(
            result.description.as_deref(),
            Some("Wireless optical mouse 2.4 GHz & Bluetooth")
        );
        assert_eq!(
            result.image_url.as_deref(),
            Some("https://images.test/mouse.jpg?w=500&h=500")
        );
        assert!(result.is_found());
    }

    #[test]
    fn test_missing_image_is_independent() {
        let page = r#"<div class="product-description">Only text</div>"#;
        let result = extractor().extract(page);

        assert_eq!(result.description.as_deref(), Some("Only text"));
        assert_eq!(result.image_url, None);
    }

    #[test]
    fn test_missing_description_is_not_found() {
        let page = r#"<div id="largeProductImage"><img src="/a.png"></div>"#;
        let result = extractor().extract(page);

        assert!(!result.is_found());
        assert_eq!(result.image_url.as_deref(), Some("/a.png"));
    }

    #[test]
    fn test_markup_only_description_is_not_found() {
        let page = r#"<div class="product-description"><br/> <span></span></div>"#;
        assert!(!extractor().extract(page).is_found());
    }

    #[test]
    fn test_strip_markup_drops_scripts() {
        let html = "<p>Keep</p><script>var x = '<b>no</b>';</script><style>p{}</style> this";
        assert_eq!(strip_markup(html), "Keep this");
    }

    #[test]
    fn test_pattern_without_group_rejected() {
        let err = PageExtractor::new("product", DEFAULT_IMAGE).unwrap_err();
        assert!(matches!(err, SkufillError::Config(_)));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = PageExtractor::new("(unclosed", DEFAULT_IMAGE).unwrap_err();
        assert!(matches!(err, SkufillError::Pattern(_)));
    }

    const DEFAULT_IMAGE: &str = crate::lookup::config::DEFAULT_IMAGE_PATTERN;
}
