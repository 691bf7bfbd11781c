//! Equity Sentiment Service — Binary Entrypoint
//! Boots config, store, the background ingestion scheduler, and the Axum
//! read API.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use equity_sentiment::api::{self, AppState};
use equity_sentiment::config::{self, AppConfig};
use equity_sentiment::fetch::finnhub::FinnhubFetcher;
use equity_sentiment::metrics::Metrics;
use equity_sentiment::pipeline::IngestionPipeline;
use equity_sentiment::scheduler::{spawn_ingest_scheduler, SchedulerCfg};
use equity_sentiment::scorer::LexiconScorer;
use equity_sentiment::store::{memory::MemoryStore, ArticleStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when vars come from the environment.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Missing provider credentials are fatal here, not mid-run.
    let cfg = AppConfig::from_env().context("loading configuration")?;

    let metrics = Metrics::init();

    let store: Arc<dyn ArticleStore> = Arc::new(MemoryStore::new());
    let companies = config::load_companies(&cfg.companies_path)
        .with_context(|| format!("seeding companies from {}", cfg.companies_path.display()))?;
    for company in companies {
        match store.insert_company(company).await {
            Ok(c) => tracing::info!(ticker = %c.ticker, "tracking company"),
            Err(e) => tracing::warn!(error = %e, "skipping company from seed"),
        }
    }

    let pipeline = IngestionPipeline::new(
        store.clone(),
        Arc::new(FinnhubFetcher::new(cfg.finnhub_key.clone())),
        Arc::new(LexiconScorer::new()),
        cfg.pipeline_options(),
    );
    spawn_ingest_scheduler(
        pipeline,
        store.clone(),
        SchedulerCfg {
            interval: cfg.ingest_interval,
            lookback_days: cfg.lookback_days,
        },
    );

    let app = api::create_router(AppState::new(store)).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "serving read API");
    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
