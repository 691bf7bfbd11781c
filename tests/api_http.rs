// tests/api_http.rs
//
// HTTP-level tests for the read API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - unknown ticker vs known-ticker-without-data (distinct outcomes)
// - GET /v1/sentiment/{ticker} happy path (case-insensitive)
// - GET /v1/sentiment/{ticker}/history
// - GET /v1/sentiment/{ticker}/articles
// - GET /v1/trending

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use equity_sentiment::aggregate::DailyAggregator;
use equity_sentiment::api::{create_router, AppState};
use equity_sentiment::model::{Company, NewArticle, NewCompany, NewScore};
use equity_sentiment::store::{memory::MemoryStore, ArticleStore};

const BODY_LIMIT: usize = 1024 * 1024;

async fn seeded_router() -> (Router, Company) {
    let store = Arc::new(MemoryStore::new());

    let aapl = store
        .insert_company(NewCompany {
            ticker: "AAPL".into(),
            name: "Apple Inc".into(),
            sector: "Technology".into(),
        })
        .await
        .unwrap();
    // Tracked but has no stored sentiment.
    store
        .insert_company(NewCompany {
            ticker: "MSFT".into(),
            name: "Microsoft Corporation".into(),
            sector: "Technology".into(),
        })
        .await
        .unwrap();

    let now = Utc::now();
    for (i, score) in [0.4, 0.3, -0.1].into_iter().enumerate() {
        let article_id = store
            .insert_article(NewArticle {
                company_id: aapl.id,
                title: format!("Apple headline {i}"),
                source: "Reuters".into(),
                url: format!("https://n.test/{i}"),
                published_at: now - Duration::minutes(i as i64),
            })
            .await
            .unwrap();
        store
            .insert_score(NewScore {
                company_id: aapl.id,
                article_id,
                score,
                confidence: 0.8,
                model_version: "lexicon-v1.0".into(),
            })
            .await
            .unwrap();
    }
    DailyAggregator::new(store.clone())
        .recompute(aapl.id, now.date_naive())
        .await
        .unwrap();

    (create_router(AppState::new(store)), aapl)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

#[tokio::test]
async fn health_returns_200_ok() {
    let (app, _) = seeded_router().await;
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_ticker_is_not_found() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/v1/sentiment/ZZZZ").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["error"], "ticker_not_found");
}

#[tokio::test]
async fn tracked_ticker_without_data_is_no_data_not_not_found() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/v1/sentiment/MSFT").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["error"], "no_data");
}

#[tokio::test]
async fn sentiment_happy_path_is_case_insensitive() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/v1/sentiment/aapl").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(v["ticker"], "AAPL");
    assert_eq!(v["company_name"], "Apple Inc");
    // avg of (0.4, 0.3, -0.1) = 0.2 → bullish
    assert_eq!(v["overall_sentiment"]["label"], "BULLISH");
    assert_eq!(v["summary"]["total_articles_analyzed"], 3);
    assert_eq!(v["summary"]["positive_count"], 2);
    assert_eq!(v["summary"]["negative_count"], 1);
    assert_eq!(v["summary"]["neutral_count"], 0);
    assert!(v["top_headlines"].as_array().unwrap().len() <= 5);
    assert!(v["historical_trend"]["dates"].as_array().unwrap().len() >= 1);
}

#[tokio::test]
async fn history_returns_daily_rows() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/v1/sentiment/AAPL/history?days=7").await;
    assert_eq!(status, StatusCode::OK);
    let rows = v.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["total_articles"], 3);
    assert_eq!(
        rows[0]["positive_count"].as_u64().unwrap()
            + rows[0]["negative_count"].as_u64().unwrap()
            + rows[0]["neutral_count"].as_u64().unwrap(),
        3
    );
}

#[tokio::test]
async fn articles_respects_limit_and_orders_newest_first() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/v1/sentiment/AAPL/articles?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let rows = v.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    // Newest first: headline 0 was published last.
    assert_eq!(rows[0]["title"], "Apple headline 0");
    assert_eq!(rows[0]["sentiment_label"], "positive");
}

#[tokio::test]
async fn trending_ranks_by_article_count() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/v1/trending").await;
    assert_eq!(status, StatusCode::OK);
    let rows = v.as_array().unwrap();
    assert_eq!(rows.len(), 1, "only AAPL has articles in the last day");
    assert_eq!(rows[0]["ticker"], "AAPL");
    assert_eq!(rows[0]["article_count"], 3);
}
