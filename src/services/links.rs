//! Outbound link harvesting.
//!
//! Walks every element carrying a link attribute (`href`, plus the
//! `data-href` / `data-src` lazy-loading variants) and resolves it
//! against the page URL.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use crate::utils::{dedup_preserving_order, resolve_url};

/// Attributes that can carry an outbound reference.
pub const LINK_ATTRIBUTES: [&str; 3] = ["href", "data-href", "data-src"];

static LINK_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("[href], [data-href], [data-src]").ok());

/// A resolved link and the text of the element that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub text: String,
}

/// Every outbound reference in the page, resolved and deduplicated in
/// document order.
pub fn harvest_links(html: &str, base: &Url) -> Vec<String> {
    dedup_preserving_order(harvest_link_elements(html, base).into_iter().map(|l| l.url))
}

/// Like [`harvest_links`] but keeps the anchor text and repeated URLs.
pub fn harvest_link_elements(html: &str, base: &Url) -> Vec<Link> {
    let Some(selector) = LINK_SELECTOR.as_ref() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for element in document.select(selector) {
        let text = element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        for attr in LINK_ATTRIBUTES {
            let Some(raw) = element.value().attr(attr) else {
                continue;
            };
            let raw = raw.trim();
            if raw.is_empty() || raw.starts_with('#') || is_non_http(raw) {
                continue;
            }
            let url = resolve_url(base, raw);
            if url.starts_with("http://") || url.starts_with("https://") {
                links.push(Link {
                    url,
                    text: text.clone(),
                });
            }
        }
    }
    links
}

fn is_non_http(href: &str) -> bool {
    let lower = href.to_lowercase();
    ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}
