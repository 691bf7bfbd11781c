// tests/pipeline_idempotence.rs
//
// Rerunning the pipeline over identical fetched input must not create
// duplicate articles, duplicate scores, or changed aggregates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use equity_sentiment::fetch::{FetchError, NewsFetcher, RawArticle};
use equity_sentiment::model::{Company, NewCompany};
use equity_sentiment::pipeline::{IngestionPipeline, PipelineOptions};
use equity_sentiment::scorer::LexiconScorer;
use equity_sentiment::store::{memory::MemoryStore, ArticleStore};

struct FixedFetcher {
    articles: Vec<RawArticle>,
}

#[async_trait]
impl NewsFetcher for FixedFetcher {
    async fn fetch(
        &self,
        _ticker: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<RawArticle>, FetchError> {
        Ok(self.articles.clone())
    }

    fn name(&self) -> &'static str {
        "Fixed"
    }
}

fn raw(headline: &str, url: &str, published_at: i64) -> RawArticle {
    RawArticle {
        headline: headline.to_string(),
        summary: String::new(),
        source: "Reuters".to_string(),
        url: url.to_string(),
        published_at,
    }
}

fn test_options() -> PipelineOptions {
    PipelineOptions {
        workers: 2,
        fetch_delay: Duration::ZERO,
        run_timeout: None,
    }
}

async fn seed_company(store: &MemoryStore, ticker: &str) -> Company {
    store
        .insert_company(NewCompany {
            ticker: ticker.to_string(),
            name: format!("{ticker} Inc"),
            sector: "Test".to_string(),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let company = seed_company(&store, "AAPL").await;

    let epoch = 1_748_822_400; // 2025-06-02 00:00:00 UTC
    let fetcher = Arc::new(FixedFetcher {
        articles: vec![
            raw("Apple profits surge", "https://n.test/a", epoch + 3_600),
            raw("Apple faces lawsuit", "https://n.test/b", epoch + 7_200),
        ],
    });
    let pipeline = IngestionPipeline::new(
        store.clone(),
        fetcher,
        Arc::new(LexiconScorer::new()),
        test_options(),
    );

    let first = pipeline.run_for_company(&company, 3).await.unwrap();
    assert_eq!(first.fetched, 2);
    assert_eq!(first.inserted, 2);
    assert_eq!(first.duplicates, 0);

    let articles_after_first = store.recent_scored_articles(company.id, 100).await.unwrap();
    let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    let aggs_after_first = store.aggregates_since(company.id, day).await.unwrap();
    assert_eq!(articles_after_first.len(), 2);
    assert_eq!(aggs_after_first.len(), 1);

    let second = pipeline.run_for_company(&company, 3).await.unwrap();
    assert_eq!(second.fetched, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(second.dirty_days, 0);

    let articles_after_second = store.recent_scored_articles(company.id, 100).await.unwrap();
    let aggs_after_second = store.aggregates_since(company.id, day).await.unwrap();
    assert_eq!(articles_after_first, articles_after_second);
    assert_eq!(aggs_after_first, aggs_after_second);
}

#[tokio::test]
async fn same_url_twice_in_one_batch_stores_once() {
    let store = Arc::new(MemoryStore::new());
    let company = seed_company(&store, "TSLA").await;

    let epoch = 1_748_822_400;
    let fetcher = Arc::new(FixedFetcher {
        articles: vec![
            raw("Tesla shares jump", "https://n.test/dup", epoch),
            raw("Tesla shares jump (syndicated)", "https://n.test/dup", epoch + 60),
        ],
    });
    let pipeline = IngestionPipeline::new(
        store.clone(),
        fetcher,
        Arc::new(LexiconScorer::new()),
        test_options(),
    );

    let report = pipeline.run_for_company(&company, 3).await.unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.duplicates, 1);

    let rows = store.recent_scored_articles(company.id, 100).await.unwrap();
    assert_eq!(rows.len(), 1, "one article, one score");
}

#[tokio::test]
async fn malformed_raw_articles_are_skipped() {
    let store = Arc::new(MemoryStore::new());
    let company = seed_company(&store, "MSFT").await;

    let epoch = 1_748_822_400;
    let fetcher = Arc::new(FixedFetcher {
        articles: vec![
            raw("", "https://n.test/no-title", epoch),
            raw("No url here", "   ", epoch),
            raw("Fine article on growth", "https://n.test/ok", epoch),
        ],
    });
    let pipeline = IngestionPipeline::new(
        store.clone(),
        fetcher,
        Arc::new(LexiconScorer::new()),
        test_options(),
    );

    let report = pipeline.run_for_company(&company, 3).await.unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.inserted, 1);
}
