//! Background ingestion scheduler: runs the full pipeline for every
//! provisioned company on a fixed interval.

use std::sync::Arc;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::pipeline::IngestionPipeline;
use crate::store::ArticleStore;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: std::time::Duration,
    pub lookback_days: u32,
}

pub fn spawn_ingest_scheduler(
    pipeline: IngestionPipeline,
    store: Arc<dyn ArticleStore>,
    cfg: SchedulerCfg,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        loop {
            ticker.tick().await;

            let companies = match store.list_companies().await {
                Ok(companies) => companies,
                Err(e) => {
                    tracing::warn!(error = %e, "scheduler: listing companies failed");
                    continue;
                }
            };
            if companies.is_empty() {
                tracing::debug!("scheduler: no companies provisioned, skipping tick");
                continue;
            }

            counter!("pipeline_runs_total").increment(1);
            let report = pipeline.run_for_all(&companies, cfg.lookback_days).await;

            tracing::info!(
                target: "scheduler",
                companies = companies.len(),
                succeeded = report.succeeded(),
                failed = report.failed(),
                inserted = report.total_inserted(),
                "scheduled ingest tick"
            );
        }
    })
}
