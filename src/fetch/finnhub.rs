//! Finnhub company-news provider.
//!
//! Wraps `GET /api/v1/company-news?symbol=..&from=..&to=..` with bounded
//! exponential-backoff retry. Rate limiting across companies is the
//! pipeline's job (worker pool + inter-fetch delay); this client only
//! retries its own transient failures.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

use super::{FetchError, NewsFetcher, RawArticle};

const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// 3 attempts, 2s base delay doubling, capped at 10s.
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(2);
const BACKOFF_CAP: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct FinnhubArticle {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    url: String,
    /// Unix seconds.
    #[serde(default, rename = "datetime")]
    published_at: i64,
}

pub struct FinnhubFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FinnhubFetcher {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at a different host (tests, proxies).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn fetch_once(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawArticle>, FetchError> {
        let url = format!("{}/company-news", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("symbol", ticker),
                ("from", &from.format("%Y-%m-%d").to_string()),
                ("to", &to.format("%Y-%m-%d").to_string()),
                ("token", &self.api_key),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let rows: Vec<FinnhubArticle> = resp.json().await?;
        Ok(rows
            .into_iter()
            .map(|a| RawArticle {
                headline: a.headline,
                summary: a.summary,
                source: a.source,
                url: a.url,
                published_at: a.published_at,
            })
            .collect())
    }
}

#[async_trait]
impl NewsFetcher for FinnhubFetcher {
    async fn fetch(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawArticle>, FetchError> {
        let mut delay = BACKOFF_BASE;
        let mut attempt = 1;
        loop {
            match self.fetch_once(ticker, from, to).await {
                Ok(rows) => {
                    tracing::debug!(ticker, count = rows.len(), "finnhub fetch ok");
                    return Ok(rows);
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(ticker, attempt, error = %e, "finnhub fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = next_backoff(delay);
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(ticker, attempt, error = %e, "finnhub fetch exhausted retries");
                    return Err(e);
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "Finnhub"
    }
}

fn next_backoff(delay: Duration) -> Duration {
    (delay * 2).min(BACKOFF_CAP)
}
