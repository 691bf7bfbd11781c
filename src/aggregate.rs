//! # Daily Aggregator
//!
//! Recomputes the per-company per-day sentiment summary from stored scores.
//! Always a full recomputation over the day's score set, never an
//! incremental patch, so rerunning with identical stored state produces an
//! identical aggregate.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use crate::model::{CompanyId, DailyAggregate, Headline, SentimentLabel};
use crate::store::{ArticleStore, StoreError};

/// Bound on `top_headlines`.
const TOP_HEADLINES: usize = 5;

#[derive(Clone)]
pub struct DailyAggregator {
    store: Arc<dyn ArticleStore>,
}

impl DailyAggregator {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// Recompute and upsert the aggregate for `(company_id, day)`.
    ///
    /// Returns `false` when the day holds no scores; any existing aggregate
    /// is left untouched in that case.
    pub async fn recompute(
        &self,
        company_id: CompanyId,
        day: NaiveDate,
    ) -> Result<bool, StoreError> {
        let Some((start, end)) = day_window(day) else {
            return Ok(false);
        };

        let scores = self
            .store
            .query_scores_in_window(company_id, start, end)
            .await?;
        if scores.is_empty() {
            return Ok(false);
        }

        let total = scores.len();
        let avg_sentiment = scores.iter().map(|s| s.score).sum::<f64>() / total as f64;
        let positive = scores
            .iter()
            .filter(|s| s.label() == SentimentLabel::Positive)
            .count();
        let negative = scores
            .iter()
            .filter(|s| s.label() == SentimentLabel::Negative)
            .count();
        let neutral = total - positive - negative;

        // Store order is ascending; headline selection wants the latest
        // first, so sort explicitly instead of leaning on the store.
        let mut articles = self
            .store
            .query_articles_in_window(company_id, start, end)
            .await?;
        articles.sort_by_key(|a| std::cmp::Reverse((a.published_at, a.id)));
        let top_headlines = articles
            .into_iter()
            .take(TOP_HEADLINES)
            .map(|a| Headline {
                title: a.title,
                source: a.source,
                published_at: a.published_at,
            })
            .collect();

        self.store
            .upsert_daily_aggregate(DailyAggregate {
                company_id,
                date: day,
                avg_sentiment,
                total_count: total as u32,
                positive_count: positive as u32,
                negative_count: negative as u32,
                neutral_count: neutral as u32,
                top_headlines,
            })
            .await?;

        tracing::debug!(company_id, %day, total, "daily aggregate recomputed");
        Ok(true)
    }
}

/// UTC `[00:00 of day, 00:00 of next day)`. `None` only at the calendar edge.
fn day_window(day: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    let end = day
        .checked_add_days(Days::new(1))?
        .and_time(NaiveTime::MIN)
        .and_utc();
    Some((start, end))
}
