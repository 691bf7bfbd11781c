//! # News Fetching
//!
//! `NewsFetcher` is the provider capability the pipeline consumes: ticker +
//! date range in, raw articles out. Providers retry transient failures
//! internally; whatever still fails surfaces as one `FetchError` that the
//! pipeline logs and treats as "no news for this company."

pub mod finnhub;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(u16),
}

/// Article as delivered by a provider, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RawArticle {
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: String,
    pub url: String,
    /// Unix seconds.
    pub published_at: i64,
}

#[async_trait]
pub trait NewsFetcher: Send + Sync {
    /// An empty list means "no news", not necessarily "error".
    async fn fetch(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawArticle>, FetchError>;

    fn name(&self) -> &'static str;
}

/// Clean a provider headline or summary: decode HTML entities, strip tags,
/// normalize typographic quotes, collapse whitespace, cap length.
pub fn normalize_headline(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_tags_entities_and_ws() {
        let s = "  <b>Apple&nbsp;beats</b>   estimates ";
        assert_eq!(normalize_headline(s), "Apple beats estimates");
    }

    #[test]
    fn normalize_converts_smart_quotes() {
        let s = "\u{201C}Record\u{201D} quarter, CEO \u{2018}pleased\u{2019}";
        assert_eq!(normalize_headline(s), "\"Record\" quarter, CEO 'pleased'");
    }

    #[test]
    fn normalize_caps_length() {
        let s = "x".repeat(2000);
        assert_eq!(normalize_headline(&s).chars().count(), 500);
    }
}
