//! # Article Store
//!
//! Persistence contract consumed by the pipeline, the aggregator, and the
//! read API. The trait is what a SQL-backed store would implement; the
//! in-memory implementation in [`memory`] carries the same transaction
//! semantics (per-company staging, all-or-nothing commit) so the pipeline
//! can be exercised end to end without a database.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{
    Article, ArticleId, Company, CompanyId, DailyAggregate, NewArticle, NewCompany, NewScore,
    ScoreId, SentimentScore,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Uniqueness violated: duplicate ticker, duplicate (company, url),
    /// or a second score for the same article.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Connection loss / backend unavailable. Commit-stage instances of this
    /// roll back the whole company run.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Store contract. Writes issued between `begin_company_run` and
/// `commit_company_run` for a company are staged: visible to reads scoped to
/// that company, invisible to everyone else until commit.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    // -- provisioning / lookup --------------------------------------------

    async fn insert_company(&self, company: NewCompany) -> Result<Company, StoreError>;

    /// Case-insensitive ticker lookup.
    async fn find_company_by_ticker(&self, ticker: &str) -> Result<Option<Company>, StoreError>;

    async fn list_companies(&self) -> Result<Vec<Company>, StoreError>;

    // -- transaction scope (one per company run) --------------------------

    async fn begin_company_run(&self, company_id: CompanyId) -> Result<(), StoreError>;
    async fn commit_company_run(&self, company_id: CompanyId) -> Result<(), StoreError>;
    async fn rollback_company_run(&self, company_id: CompanyId) -> Result<(), StoreError>;

    // -- pipeline writes --------------------------------------------------

    async fn find_article_by_url(
        &self,
        company_id: CompanyId,
        url: &str,
    ) -> Result<Option<Article>, StoreError>;

    async fn insert_article(&self, article: NewArticle) -> Result<ArticleId, StoreError>;

    /// Fails with `ConstraintViolation` if the article already has a score.
    async fn insert_score(&self, score: NewScore) -> Result<ScoreId, StoreError>;

    async fn upsert_daily_aggregate(&self, aggregate: DailyAggregate) -> Result<(), StoreError>;

    /// Scores whose article's `published_at` lies in `[start, end)`,
    /// ordered by that timestamp ascending.
    async fn query_scores_in_window(
        &self,
        company_id: CompanyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SentimentScore>, StoreError>;

    /// Articles published in `[start, end)`, ordered ascending. The
    /// aggregator re-sorts descending for headline selection rather than
    /// relying on store order.
    async fn query_articles_in_window(
        &self,
        company_id: CompanyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Article>, StoreError>;

    // -- read side (query layer; committed state only) --------------------

    async fn recent_scored_articles(
        &self,
        company_id: CompanyId,
        limit: usize,
    ) -> Result<Vec<(Article, SentimentScore)>, StoreError>;

    async fn aggregates_since(
        &self,
        company_id: CompanyId,
        from: NaiveDate,
    ) -> Result<Vec<DailyAggregate>, StoreError>;

    /// Per-company article counts for articles published after `cutoff`,
    /// ordered by count descending. Feeds the trending endpoint.
    async fn article_counts_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(Company, u64)>, StoreError>;
}
