//! In-memory [`ArticleStore`] with per-company transaction staging.
//!
//! Writes land in a staging area while a company run is open and become
//! visible to outside readers only on commit. IDs come from global counters
//! at insert time, so a rolled-back run leaves ID gaps (same as a database
//! sequence would).

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{ArticleStore, StoreError};
use crate::model::{
    Article, ArticleId, Company, CompanyId, DailyAggregate, NewArticle, NewCompany, NewScore,
    ScoreId, SentimentScore,
};

#[derive(Debug, Default)]
struct Staged {
    articles: Vec<Article>,
    scores: Vec<SentimentScore>,
    aggregates: HashMap<NaiveDate, DailyAggregate>,
}

#[derive(Debug, Default)]
struct Inner {
    companies: BTreeMap<CompanyId, Company>,
    articles: BTreeMap<ArticleId, Article>,
    scores: BTreeMap<ScoreId, SentimentScore>,
    aggregates: BTreeMap<(CompanyId, NaiveDate), DailyAggregate>,
    staged: HashMap<CompanyId, Staged>,
    next_company_id: CompanyId,
    next_article_id: ArticleId,
    next_score_id: ScoreId,
}

impl Inner {
    /// Committed articles plus, for reads inside the company's own run
    /// scope, its staged articles.
    fn articles_for(&self, company_id: CompanyId) -> impl Iterator<Item = &Article> {
        self.articles
            .values()
            .filter(move |a| a.company_id == company_id)
            .chain(
                self.staged
                    .get(&company_id)
                    .into_iter()
                    .flat_map(|s| s.articles.iter()),
            )
    }

    fn scores_for(&self, company_id: CompanyId) -> impl Iterator<Item = &SentimentScore> {
        self.scores
            .values()
            .filter(move |s| s.company_id == company_id)
            .chain(
                self.staged
                    .get(&company_id)
                    .into_iter()
                    .flat_map(|s| s.scores.iter()),
            )
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn insert_company(&self, company: NewCompany) -> Result<Company, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let ticker = company.ticker.trim().to_ascii_uppercase();
        if inner
            .companies
            .values()
            .any(|c| c.ticker.eq_ignore_ascii_case(&ticker))
        {
            return Err(StoreError::ConstraintViolation(format!(
                "duplicate ticker {ticker}"
            )));
        }
        inner.next_company_id += 1;
        let row = Company {
            id: inner.next_company_id,
            ticker,
            name: company.name,
            sector: company.sector,
        };
        inner.companies.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_company_by_ticker(&self, ticker: &str) -> Result<Option<Company>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .companies
            .values()
            .find(|c| c.ticker.eq_ignore_ascii_case(ticker.trim()))
            .cloned())
    }

    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.companies.values().cloned().collect())
    }

    async fn begin_company_run(&self, company_id: CompanyId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if !inner.companies.contains_key(&company_id) {
            return Err(StoreError::NotFound(format!("company {company_id}")));
        }
        // A fresh scope discards anything an aborted earlier run left staged.
        inner.staged.insert(company_id, Staged::default());
        Ok(())
    }

    async fn commit_company_run(&self, company_id: CompanyId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let Some(staged) = inner.staged.remove(&company_id) else {
            return Ok(()); // nothing staged, commit is a no-op
        };
        for a in staged.articles {
            inner.articles.insert(a.id, a);
        }
        for s in staged.scores {
            inner.scores.insert(s.id, s);
        }
        for (date, agg) in staged.aggregates {
            inner.aggregates.insert((company_id, date), agg);
        }
        Ok(())
    }

    async fn rollback_company_run(&self, company_id: CompanyId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.staged.remove(&company_id);
        Ok(())
    }

    async fn find_article_by_url(
        &self,
        company_id: CompanyId,
        url: &str,
    ) -> Result<Option<Article>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let hit = inner
            .articles_for(company_id)
            .find(|a| a.url == url)
            .cloned();
        Ok(hit)
    }

    async fn insert_article(&self, article: NewArticle) -> Result<ArticleId, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if inner
            .articles_for(article.company_id)
            .any(|a| a.url == article.url)
        {
            return Err(StoreError::ConstraintViolation(format!(
                "duplicate url for company {}: {}",
                article.company_id, article.url
            )));
        }
        inner.next_article_id += 1;
        let row = Article {
            id: inner.next_article_id,
            company_id: article.company_id,
            title: article.title,
            source: article.source,
            url: article.url,
            published_at: article.published_at,
        };
        match inner.staged.get_mut(&row.company_id) {
            Some(staged) => staged.articles.push(row.clone()),
            None => {
                inner.articles.insert(row.id, row.clone());
            }
        }
        Ok(row.id)
    }

    async fn insert_score(&self, score: NewScore) -> Result<ScoreId, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if inner
            .scores_for(score.company_id)
            .any(|s| s.article_id == score.article_id)
        {
            return Err(StoreError::ConstraintViolation(format!(
                "article {} already scored",
                score.article_id
            )));
        }
        inner.next_score_id += 1;
        let row = SentimentScore {
            id: inner.next_score_id,
            company_id: score.company_id,
            article_id: score.article_id,
            score: score.score,
            confidence: score.confidence,
            model_version: score.model_version,
        };
        match inner.staged.get_mut(&row.company_id) {
            Some(staged) => staged.scores.push(row.clone()),
            None => {
                inner.scores.insert(row.id, row.clone());
            }
        }
        Ok(row.id)
    }

    async fn upsert_daily_aggregate(&self, aggregate: DailyAggregate) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let key = (aggregate.company_id, aggregate.date);
        match inner.staged.get_mut(&aggregate.company_id) {
            Some(staged) => {
                staged.aggregates.insert(aggregate.date, aggregate);
            }
            None => {
                inner.aggregates.insert(key, aggregate);
            }
        }
        Ok(())
    }

    async fn query_scores_in_window(
        &self,
        company_id: CompanyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SentimentScore>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let published: HashMap<ArticleId, DateTime<Utc>> = inner
            .articles_for(company_id)
            .map(|a| (a.id, a.published_at))
            .collect();
        let mut rows: Vec<(DateTime<Utc>, SentimentScore)> = inner
            .scores_for(company_id)
            .filter_map(|s| {
                let ts = *published.get(&s.article_id)?;
                (ts >= start && ts < end).then(|| (ts, s.clone()))
            })
            .collect();
        rows.sort_by_key(|(ts, s)| (*ts, s.id));
        Ok(rows.into_iter().map(|(_, s)| s).collect())
    }

    async fn query_articles_in_window(
        &self,
        company_id: CompanyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Article>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut rows: Vec<Article> = inner
            .articles_for(company_id)
            .filter(|a| a.published_at >= start && a.published_at < end)
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.published_at, a.id));
        Ok(rows)
    }

    async fn recent_scored_articles(
        &self,
        company_id: CompanyId,
        limit: usize,
    ) -> Result<Vec<(Article, SentimentScore)>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        // Committed state only: staged writes stay invisible to the read API.
        let mut rows: Vec<(Article, SentimentScore)> = inner
            .scores
            .values()
            .filter(|s| s.company_id == company_id)
            .filter_map(|s| {
                inner
                    .articles
                    .get(&s.article_id)
                    .map(|a| (a.clone(), s.clone()))
            })
            .collect();
        rows.sort_by_key(|(a, _)| std::cmp::Reverse((a.published_at, a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn aggregates_since(
        &self,
        company_id: CompanyId,
        from: NaiveDate,
    ) -> Result<Vec<DailyAggregate>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .aggregates
            .range((company_id, from)..(company_id, NaiveDate::MAX))
            .map(|(_, agg)| agg.clone())
            .collect())
    }

    async fn article_counts_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(Company, u64)>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut counts: HashMap<CompanyId, u64> = HashMap::new();
        for a in inner.articles.values() {
            if a.published_at >= cutoff {
                *counts.entry(a.company_id).or_default() += 1;
            }
        }
        let mut rows: Vec<(Company, u64)> = counts
            .into_iter()
            .filter_map(|(id, n)| inner.companies.get(&id).map(|c| (c.clone(), n)))
            .collect();
        rows.sort_by_key(|(c, n)| (std::cmp::Reverse(*n), c.id));
        Ok(rows)
    }
}
