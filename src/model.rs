//! # Domain Model
//!
//! Plain data types shared by the pipeline, aggregator, store, and read API.
//! Relations are ID-based: an `Article` points at its `Company` via
//! `company_id`, a `SentimentScore` at its `Article` via `article_id`.
//! Nothing here owns anything else; joins happen through the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type CompanyId = i64;
pub type ArticleId = i64;
pub type ScoreId = i64;

/// Labeling policy applied everywhere a label is derived from a compound
/// score: `>= 0.05` positive, `<= -0.05` negative, otherwise neutral.
pub const POSITIVE_THRESHOLD: f64 = 0.05;
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= POSITIVE_THRESHOLD {
            SentimentLabel::Positive
        } else if score <= NEGATIVE_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    /// Market-flavored spelling used by the overall-sentiment API field.
    pub fn as_market_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "BULLISH",
            SentimentLabel::Negative => "BEARISH",
            SentimentLabel::Neutral => "NEUTRAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    /// Exchange symbol, unique case-insensitively (stored uppercased).
    pub ticker: String,
    pub name: String,
    pub sector: String,
}

/// Company fields as provisioned from the seed file, before an ID exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCompany {
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub sector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub company_id: CompanyId,
    pub title: String,
    pub source: String,
    /// Natural dedup key, unique within the company scope.
    pub url: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub company_id: CompanyId,
    pub title: String,
    pub source: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub id: ScoreId,
    pub company_id: CompanyId,
    pub article_id: ArticleId,
    /// Compound score in `[-1, 1]`.
    pub score: f64,
    /// Scorer confidence in `[0, 1]`.
    pub confidence: f64,
    pub model_version: String,
}

impl SentimentScore {
    pub fn label(&self) -> SentimentLabel {
        SentimentLabel::from_score(self.score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewScore {
    pub company_id: CompanyId,
    pub article_id: ArticleId,
    pub score: f64,
    pub confidence: f64,
    pub model_version: String,
}

/// Headline entry inside `DailyAggregate::top_headlines`. Carries no score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
}

/// Per-company per-day summary, derived wholesale from stored scores.
/// Safe to drop and rebuild at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub company_id: CompanyId,
    pub date: NaiveDate,
    pub avg_sentiment: f64,
    pub total_count: u32,
    pub positive_count: u32,
    pub negative_count: u32,
    pub neutral_count: u32,
    /// Latest 5 articles published that day, newest first.
    pub top_headlines: Vec<Headline>,
}
