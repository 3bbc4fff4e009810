//! Bulletin reference produced by source discovery.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Which discovery step produced a bulletin reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStrategy {
    DirectGuess,
    SiteSearch,
    ListingCrawl,
    HistoricalPattern,
    Cached,
}

impl DiscoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectGuess => "direct-guess",
            Self::SiteSearch => "site-search",
            Self::ListingCrawl => "listing-crawl",
            Self::HistoricalPattern => "historical-pattern",
            Self::Cached => "cached",
        }
    }
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bulletin chosen for this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletinReference {
    pub url: String,
    pub strategy: DiscoveryStrategy,
    pub discovered_at: DateTime<Utc>,
}

impl BulletinReference {
    /// Build a reference from a live discovery, enforcing the bulletin link rules.
    pub fn discovered(
        url: impl Into<String>,
        strategy: DiscoveryStrategy,
        radar_tokens: &[String],
    ) -> Result<Self> {
        let url = url.into();
        if !is_bulletin_link(&url, radar_tokens) {
            return Err(AppError::validation(format!(
                "{url} is not a radar bulletin link"
            )));
        }
        Ok(Self {
            url,
            strategy,
            discovered_at: Utc::now(),
        })
    }

    /// Build a reference from the last-known-good cache.
    ///
    /// Cached values were accepted by an earlier run, so only the document
    /// extension is re-checked.
    pub fn cached(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if !has_pdf_extension(&url) {
            return Err(AppError::validation(format!(
                "cached bulletin {url} is not a PDF link"
            )));
        }
        Ok(Self {
            url,
            strategy: DiscoveryStrategy::Cached,
            discovered_at: Utc::now(),
        })
    }
}

/// Whether the URL path ends in `.pdf` (case-insensitive).
pub fn has_pdf_extension(url: &str) -> bool {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    path.to_lowercase().ends_with(".pdf")
}

/// A PDF link whose URL mentions one of the radar tokens.
pub fn is_bulletin_link(url: &str, radar_tokens: &[String]) -> bool {
    if !has_pdf_extension(url) {
        return false;
    }
    let lower = url.to_lowercase();
    radar_tokens
        .iter()
        .any(|token| lower.contains(&token.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> Vec<String> {
        vec!["radar".to_string()]
    }

    #[test]
    fn test_bulletin_link_rules() {
        assert!(is_bulletin_link(
            "https://www.aytoleon.es/Documents/Radares%20Marzo%202025.pdf",
            &tokens()
        ));
        assert!(is_bulletin_link(
            "https://example.org/RADAR.PDF?download=1",
            &tokens()
        ));
        assert!(!is_bulletin_link("https://example.org/radares.html", &tokens()));
        assert!(!is_bulletin_link("https://example.org/agenda.pdf", &tokens()));
    }

    #[test]
    fn test_discovered_rejects_non_bulletin() {
        let result = BulletinReference::discovered(
            "https://example.org/agenda.pdf",
            DiscoveryStrategy::SiteSearch,
            &tokens(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_cached_only_checks_extension() {
        let reference = BulletinReference::cached("https://example.org/old.pdf").unwrap();
        assert_eq!(reference.strategy, DiscoveryStrategy::Cached);
        assert!(BulletinReference::cached("https://example.org/old.html").is_err());
    }
}
