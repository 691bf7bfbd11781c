//! # Read API
//!
//! Thin query/formatting layer over the article store and daily aggregates.
//! All endpoints are read-only projections; ingestion happens in the
//! background scheduler. Ticker lookups are case-insensitive. An unknown
//! ticker and a known ticker without stored sentiment are distinct,
//! structured outcomes (`ticker_not_found` vs `no_data`).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::model::{Company, SentimentLabel};
use crate::store::{ArticleStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ArticleStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/v1/sentiment/{ticker}", get(get_sentiment))
        .route("/v1/sentiment/{ticker}/history", get(get_history))
        .route("/v1/sentiment/{ticker}/articles", get(get_articles))
        .route("/v1/trending", get(get_trending))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---- error envelope ----

enum ApiError {
    TickerNotFound(String),
    NoData(String),
    Internal,
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "store error serving read API");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match self {
            ApiError::TickerNotFound(t) => (
                StatusCode::NOT_FOUND,
                "ticker_not_found",
                format!("ticker {t} is not tracked"),
            ),
            ApiError::NoData(t) => (
                StatusCode::NOT_FOUND,
                "no_data",
                format!("no sentiment data stored for {t}"),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal error".to_string(),
            ),
        };
        let body = serde_json::json!({ "error": code, "detail": detail });
        (status, Json(body)).into_response()
    }
}

async fn lookup_company(state: &AppState, ticker: &str) -> Result<Company, ApiError> {
    state
        .store
        .find_company_by_ticker(ticker)
        .await?
        .ok_or_else(|| ApiError::TickerNotFound(ticker.to_uppercase()))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ---- GET /v1/sentiment/{ticker} ----

#[derive(Deserialize)]
struct SentimentQuery {
    #[serde(default = "default_sentiment_days")]
    days: u32,
}

fn default_sentiment_days() -> u32 {
    7
}

#[derive(Serialize)]
struct OverallSentiment {
    score: f64,
    label: &'static str,
    confidence: f64,
}

#[derive(Serialize)]
struct Summary {
    total_articles_analyzed: usize,
    positive_count: usize,
    negative_count: usize,
    neutral_count: usize,
}

#[derive(Serialize)]
struct HeadlineOut {
    title: String,
    source: String,
    published_at: DateTime<Utc>,
    sentiment: f64,
    sentiment_label: SentimentLabel,
    url: String,
}

#[derive(Serialize)]
struct Trend {
    dates: Vec<String>,
    sentiments: Vec<f64>,
    volumes: Vec<u32>,
}

#[derive(Serialize)]
struct SentimentResponse {
    ticker: String,
    company_name: String,
    timestamp: DateTime<Utc>,
    overall_sentiment: OverallSentiment,
    summary: Summary,
    top_headlines: Vec<HeadlineOut>,
    trending_topics: Vec<String>,
    historical_trend: Trend,
}

/// Number of recent scores the overall figure is computed from.
const OVERALL_WINDOW: usize = 50;

async fn get_sentiment(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(q): Query<SentimentQuery>,
) -> Result<Json<SentimentResponse>, ApiError> {
    let company = lookup_company(&state, &ticker).await?;

    let latest = state
        .store
        .recent_scored_articles(company.id, OVERALL_WINDOW)
        .await?;
    if latest.is_empty() {
        return Err(ApiError::NoData(company.ticker));
    }

    let n = latest.len() as f64;
    let avg_score = latest.iter().map(|(_, s)| s.score).sum::<f64>() / n;
    let avg_confidence = latest.iter().map(|(_, s)| s.confidence).sum::<f64>() / n;
    let positive = latest
        .iter()
        .filter(|(_, s)| s.label() == SentimentLabel::Positive)
        .count();
    let negative = latest
        .iter()
        .filter(|(_, s)| s.label() == SentimentLabel::Negative)
        .count();

    let cutoff = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(u64::from(q.days)))
        .unwrap_or_else(|| Utc::now().date_naive());
    let daily = state.store.aggregates_since(company.id, cutoff).await?;

    let top_headlines = latest
        .iter()
        .take(5)
        .map(|(a, s)| HeadlineOut {
            title: a.title.clone(),
            source: a.source.clone(),
            published_at: a.published_at,
            sentiment: s.score,
            sentiment_label: s.label(),
            url: a.url.clone(),
        })
        .collect();

    Ok(Json(SentimentResponse {
        ticker: company.ticker,
        company_name: company.name,
        timestamp: Utc::now(),
        overall_sentiment: OverallSentiment {
            score: round2(avg_score),
            label: SentimentLabel::from_score(avg_score).as_market_str(),
            confidence: round2(avg_confidence),
        },
        summary: Summary {
            total_articles_analyzed: latest.len(),
            positive_count: positive,
            negative_count: negative,
            neutral_count: latest.len() - positive - negative,
        },
        top_headlines,
        trending_topics: trending_topics(latest.iter().map(|(a, _)| a.title.as_str())),
        historical_trend: Trend {
            dates: daily.iter().map(|d| d.date.format("%Y-%m-%d").to_string()).collect(),
            sentiments: daily.iter().map(|d| d.avg_sentiment).collect(),
            volumes: daily.iter().map(|d| d.total_count).collect(),
        },
    }))
}

/// Most frequent words (length > 4) across recent headlines. Deterministic:
/// ties break alphabetically.
fn trending_topics<'a>(titles: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for title in titles {
        for word in title.split_whitespace() {
            let w: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if w.chars().count() > 4 {
                *counts.entry(w).or_default() += 1;
            }
        }
    }
    let mut rows: Vec<(String, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.into_iter().take(5).map(|(w, _)| w).collect()
}

// ---- GET /v1/sentiment/{ticker}/history ----

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_history_days")]
    days: u32,
}

fn default_history_days() -> u32 {
    30
}

#[derive(Serialize)]
struct DailyOut {
    date: String,
    avg_sentiment: f64,
    total_articles: u32,
    positive_count: u32,
    negative_count: u32,
    neutral_count: u32,
}

async fn get_history(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<DailyOut>>, ApiError> {
    let company = lookup_company(&state, &ticker).await?;

    let cutoff = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(u64::from(q.days)))
        .unwrap_or_else(|| Utc::now().date_naive());
    let daily = state.store.aggregates_since(company.id, cutoff).await?;
    if daily.is_empty() {
        return Err(ApiError::NoData(company.ticker));
    }

    Ok(Json(
        daily
            .into_iter()
            .map(|d| DailyOut {
                date: d.date.format("%Y-%m-%d").to_string(),
                avg_sentiment: d.avg_sentiment,
                total_articles: d.total_count,
                positive_count: d.positive_count,
                negative_count: d.negative_count,
                neutral_count: d.neutral_count,
            })
            .collect(),
    ))
}

// ---- GET /v1/sentiment/{ticker}/articles ----

#[derive(Deserialize)]
struct ArticlesQuery {
    #[serde(default = "default_articles_limit")]
    limit: usize,
}

fn default_articles_limit() -> usize {
    20
}

#[derive(Serialize)]
struct ArticleOut {
    title: String,
    source: String,
    published_at: DateTime<Utc>,
    sentiment_score: f64,
    sentiment_label: SentimentLabel,
    confidence: f64,
    url: String,
}

async fn get_articles(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(q): Query<ArticlesQuery>,
) -> Result<Json<Vec<ArticleOut>>, ApiError> {
    let company = lookup_company(&state, &ticker).await?;

    let rows = state
        .store
        .recent_scored_articles(company.id, q.limit)
        .await?;
    if rows.is_empty() {
        return Err(ApiError::NoData(company.ticker));
    }

    Ok(Json(
        rows.into_iter()
            .map(|(a, s)| ArticleOut {
                title: a.title,
                source: a.source,
                published_at: a.published_at,
                sentiment_score: s.score,
                sentiment_label: s.label(),
                confidence: s.confidence,
                url: a.url,
            })
            .collect(),
    ))
}

// ---- GET /v1/trending ----

#[derive(Deserialize)]
struct TrendingQuery {
    #[serde(default = "default_trending_limit")]
    limit: usize,
}

fn default_trending_limit() -> usize {
    5
}

#[derive(Serialize)]
struct TrendingOut {
    ticker: String,
    company_name: String,
    article_count: u64,
}

async fn get_trending(
    State(state): State<AppState>,
    Query(q): Query<TrendingQuery>,
) -> Result<Json<Vec<TrendingOut>>, ApiError> {
    let cutoff = Utc::now() - chrono::Duration::days(1);
    let rows = state.store.article_counts_since(cutoff).await?;

    Ok(Json(
        rows.into_iter()
            .take(q.limit)
            .map(|(c, n)| TrendingOut {
                ticker: c.ticker,
                company_name: c.name,
                article_count: n,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trending_topics_counts_and_breaks_ties_alphabetically() {
        let titles = [
            "Apple shares surge after earnings",
            "Apple earnings beat estimates",
            "Analysts praise earnings quality",
        ];
        let topics = trending_topics(titles.iter().copied());
        assert_eq!(topics[0], "earnings"); // 3 hits
        assert!(topics.contains(&"apple".to_string()));
        // short words filtered out
        assert!(!topics.contains(&"beat".to_string()));
    }
}
