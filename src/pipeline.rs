//! # Ingestion Pipeline
//!
//! Orchestrates fetch → dedup/store → score → aggregate per company.
//! Companies are independent: they run on a bounded worker pool, each inside
//! its own store transaction scope, and one company's failure never stops
//! the others. Within a company, per-article failures are counted and
//! skipped; only a commit-stage store failure fails the company.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::aggregate::DailyAggregator;
use crate::fetch::{normalize_headline, NewsFetcher, RawArticle};
use crate::model::{Company, CompanyId, NewArticle, NewScore};
use crate::scorer::SentimentScorer;
use crate::store::{ArticleStore, StoreError};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_fetched_total",
            "Raw articles returned by the news provider."
        );
        describe_counter!(
            "pipeline_inserted_total",
            "Articles newly stored and scored."
        );
        describe_counter!(
            "pipeline_duplicates_total",
            "Raw articles skipped by URL dedup."
        );
        describe_counter!(
            "pipeline_scoring_failed_total",
            "Articles whose sentiment scoring failed."
        );
        describe_counter!(
            "pipeline_store_failed_total",
            "Per-article store write failures."
        );
        describe_counter!(
            "pipeline_company_failures_total",
            "Company runs rolled back or timed out."
        );
        describe_histogram!("pipeline_company_run_ms", "Wall time per company run.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the pipeline last completed a full run."
        );
    });
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Store failure before any per-article work could start.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Aggregate recomputation failed; the company's run was rolled back.
    #[error("aggregate recompute failed for {day}: {source}")]
    Aggregate {
        day: NaiveDate,
        #[source]
        source: StoreError,
    },
    /// Commit-stage failure; staged writes were rolled back.
    #[error("commit failed: {0}")]
    Commit(#[source] StoreError),
    /// The run-level timeout elapsed before this company finished.
    #[error("run cancelled by timeout")]
    Timeout,
}

/// Per-company observability counters returned by `run_for_company`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingReport {
    pub company_id: CompanyId,
    pub ticker: String,
    /// Raw articles the provider returned.
    pub fetched: usize,
    /// Articles stored and scored for the first time.
    pub inserted: usize,
    /// Raw articles whose URL already existed for this company.
    pub duplicates: usize,
    /// Raw articles dropped during normalization (no URL/title/timestamp).
    pub skipped: usize,
    pub scoring_failed: usize,
    pub store_failed: usize,
    /// Calendar days whose aggregate was recomputed.
    pub dirty_days: usize,
}

#[derive(Debug)]
pub struct CompanyOutcome {
    pub ticker: String,
    pub outcome: Result<ProcessingReport, PipelineError>,
}

/// Result of a multi-company run. Order follows completion, not input.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<CompanyOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn total_inserted(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.outcome.as_ref().ok())
            .map(|r| r.inserted)
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Concurrent company workers.
    pub workers: usize,
    /// Pause a worker holds after each company's fetch, pacing the provider.
    pub fetch_delay: Duration,
    /// Abort companies still running once this elapses. Committed companies
    /// stay committed.
    pub run_timeout: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            fetch_delay: Duration::from_secs(1),
            run_timeout: None,
        }
    }
}

type DayLocks = Mutex<HashMap<(CompanyId, NaiveDate), Arc<tokio::sync::Mutex<()>>>>;

#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn ArticleStore>,
    fetcher: Arc<dyn NewsFetcher>,
    scorer: Arc<dyn SentimentScorer>,
    aggregator: DailyAggregator,
    options: PipelineOptions,
    /// Serializes aggregate recomputation against concurrent ingestion for
    /// the same (company, day) key.
    day_locks: Arc<DayLocks>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        fetcher: Arc<dyn NewsFetcher>,
        scorer: Arc<dyn SentimentScorer>,
        options: PipelineOptions,
    ) -> Self {
        ensure_metrics_described();
        Self {
            aggregator: DailyAggregator::new(store.clone()),
            store,
            fetcher,
            scorer,
            options,
            day_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn day_lock(&self, company_id: CompanyId, day: NaiveDate) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.day_locks.lock().expect("day lock map poisoned");
        map.entry((company_id, day))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the company's day locks once its run is over. Runs for one
    /// company never overlap, so nothing can still be waiting on them; left
    /// in place they would accumulate one entry per company per day.
    fn release_day_locks(&self, company_id: CompanyId) {
        self.day_locks
            .lock()
            .expect("day lock map poisoned")
            .retain(|(cid, _), _| *cid != company_id);
    }

    /// Run the full pipeline for one company. Fetch failure yields an empty
    /// report; a commit-stage store failure rolls the company back and
    /// returns an error. Rerunning with identical fetched input is a no-op.
    pub async fn run_for_company(
        &self,
        company: &Company,
        lookback_days: u32,
    ) -> Result<ProcessingReport, PipelineError> {
        let t0 = std::time::Instant::now();
        let mut report = ProcessingReport {
            company_id: company.id,
            ticker: company.ticker.clone(),
            ..Default::default()
        };

        let to = Utc::now().date_naive();
        let from = to
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .unwrap_or(to);

        let raw = match self.fetcher.fetch(&company.ticker, from, to).await {
            Ok(raw) => raw,
            Err(e) => {
                // Non-fatal: this company simply has no news this run.
                tracing::warn!(
                    ticker = %company.ticker,
                    provider = self.fetcher.name(),
                    error = %e,
                    "fetch failed, skipping company"
                );
                return Ok(report);
            }
        };
        report.fetched = raw.len();
        counter!("pipeline_fetched_total").increment(raw.len() as u64);

        self.store.begin_company_run(company.id).await?;

        let mut dirty: BTreeSet<NaiveDate> = BTreeSet::new();
        for article in raw {
            self.process_article(company, article, &mut report, &mut dirty)
                .await;
        }

        // Join barrier: every article is done before any day recomputes.
        if let Err(e) = self.recompute_dirty_days(company.id, &dirty).await {
            let _ = self.store.rollback_company_run(company.id).await;
            self.release_day_locks(company.id);
            counter!("pipeline_company_failures_total").increment(1);
            return Err(e);
        }
        report.dirty_days = dirty.len();

        if let Err(e) = self.store.commit_company_run(company.id).await {
            let _ = self.store.rollback_company_run(company.id).await;
            self.release_day_locks(company.id);
            counter!("pipeline_company_failures_total").increment(1);
            return Err(PipelineError::Commit(e));
        }
        self.release_day_locks(company.id);

        counter!("pipeline_inserted_total").increment(report.inserted as u64);
        counter!("pipeline_duplicates_total").increment(report.duplicates as u64);
        counter!("pipeline_scoring_failed_total").increment(report.scoring_failed as u64);
        counter!("pipeline_store_failed_total").increment(report.store_failed as u64);
        histogram!("pipeline_company_run_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        tracing::info!(
            ticker = %company.ticker,
            fetched = report.fetched,
            inserted = report.inserted,
            duplicates = report.duplicates,
            scoring_failed = report.scoring_failed,
            "company run committed"
        );
        Ok(report)
    }

    /// One raw article, in isolation: normalize, dedup, store, score.
    /// Every failure path is counted on the report and returns; nothing
    /// here aborts the batch.
    async fn process_article(
        &self,
        company: &Company,
        raw: RawArticle,
        report: &mut ProcessingReport,
        dirty: &mut BTreeSet<NaiveDate>,
    ) {
        let title = normalize_headline(&raw.headline);
        let url = raw.url.trim().to_string();
        if title.is_empty() || url.is_empty() {
            report.skipped += 1;
            return;
        }
        let Some(published_at) = DateTime::<Utc>::from_timestamp(raw.published_at, 0) else {
            report.skipped += 1;
            return;
        };

        match self.store.find_article_by_url(company.id, &url).await {
            Ok(Some(_)) => {
                // Idempotent re-ingestion: same URL, nothing to do.
                report.duplicates += 1;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(ticker = %company.ticker, url, error = %e, "dedup lookup failed");
                report.store_failed += 1;
                return;
            }
        }

        let day = published_at.date_naive();
        let lock = self.day_lock(company.id, day);
        let _guard = lock.lock().await;

        let article_id = match self
            .store
            .insert_article(NewArticle {
                company_id: company.id,
                title: title.clone(),
                source: raw.source.trim().to_string(),
                url,
                published_at,
            })
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(ticker = %company.ticker, error = %e, "article insert failed");
                report.store_failed += 1;
                return;
            }
        };

        // Title plus summary where present, as one scoring text.
        let summary = normalize_headline(&raw.summary);
        let text = if summary.is_empty() {
            title
        } else {
            format!("{title} {summary}")
        };

        let scored = match self.scorer.score(&text) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(ticker = %company.ticker, article_id, error = %e, "scoring failed");
                report.scoring_failed += 1;
                return;
            }
        };

        match self
            .store
            .insert_score(NewScore {
                company_id: company.id,
                article_id,
                score: scored.compound,
                confidence: scored.confidence,
                model_version: self.scorer.model_version().to_string(),
            })
            .await
        {
            Ok(_) => {
                dirty.insert(day);
                report.inserted += 1;
            }
            Err(e) => {
                tracing::warn!(ticker = %company.ticker, article_id, error = %e, "score insert failed");
                report.store_failed += 1;
            }
        }
    }

    /// Recompute each dirty day under its (company, day) lock. Days carry no
    /// data dependency on each other, so they run concurrently.
    async fn recompute_dirty_days(
        &self,
        company_id: CompanyId,
        dirty: &BTreeSet<NaiveDate>,
    ) -> Result<(), PipelineError> {
        let mut set = JoinSet::new();
        for day in dirty.iter().copied() {
            let aggregator = self.aggregator.clone();
            let lock = self.day_lock(company_id, day);
            set.spawn(async move {
                let _guard = lock.lock().await;
                (day, aggregator.recompute(company_id, day).await)
            });
        }
        let mut failure: Option<PipelineError> = None;
        while let Some(joined) = set.join_next().await {
            let Ok((day, result)) = joined else {
                continue; // task cancelled or panicked; surfaced elsewhere
            };
            if let Err(source) = result {
                failure.get_or_insert(PipelineError::Aggregate { day, source });
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run every company on a bounded worker pool. One company's failure
    /// never stops the others; the run-level timeout aborts whatever is
    /// still in flight and reports those companies as failed.
    pub async fn run_for_all(&self, companies: &[Company], lookback_days: u32) -> RunReport {
        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let mut set = JoinSet::new();
        for company in companies.iter().cloned() {
            let pipeline = self.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let outcome = pipeline.run_for_company(&company, lookback_days).await;
                if pipeline.options.fetch_delay > Duration::ZERO {
                    // Hold the permit through the pause so the pool as a
                    // whole stays under the provider's rate limit.
                    tokio::time::sleep(pipeline.options.fetch_delay).await;
                }
                CompanyOutcome {
                    ticker: company.ticker,
                    outcome,
                }
            });
        }

        let collected: Mutex<Vec<CompanyOutcome>> = Mutex::new(Vec::new());
        let drain = async {
            while let Some(joined) = set.join_next().await {
                if let Ok(outcome) = joined {
                    collected.lock().expect("outcome vec poisoned").push(outcome);
                }
            }
        };

        let timed_out = match self.options.run_timeout {
            None => {
                drain.await;
                false
            }
            Some(limit) => tokio::time::timeout(limit, drain).await.is_err(),
        };

        let mut outcomes = collected.into_inner().expect("outcome vec poisoned");
        if timed_out {
            set.abort_all();
            while let Some(joined) = set.join_next().await {
                if let Ok(outcome) = joined {
                    outcomes.push(outcome);
                }
            }
            for company in companies {
                if !outcomes.iter().any(|o| o.ticker == company.ticker) {
                    counter!("pipeline_company_failures_total").increment(1);
                    outcomes.push(CompanyOutcome {
                        ticker: company.ticker.clone(),
                        outcome: Err(PipelineError::Timeout),
                    });
                }
            }
            tracing::warn!("pipeline run hit timeout, remaining companies aborted");
        }

        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp().max(0) as f64);

        let report = RunReport { outcomes };
        tracing::info!(
            companies = companies.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            inserted = report.total_inserted(),
            "pipeline run finished"
        );
        report
    }
}
