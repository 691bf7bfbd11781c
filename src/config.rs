//! Runtime configuration.
//!
//! Everything comes from the environment (a local `.env` is loaded by the
//! binary before this runs). The provider key is the only hard requirement;
//! absence is fatal at startup rather than discovered mid-run. Companies to
//! track are provisioned from a TOML seed file.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::model::NewCompany;
use crate::pipeline::PipelineOptions;

pub const ENV_FINNHUB_KEY: &str = "FINNHUB_KEY";
const ENV_LOOKBACK_DAYS: &str = "PIPELINE_LOOKBACK_DAYS";
const ENV_WORKERS: &str = "PIPELINE_WORKERS";
const ENV_FETCH_DELAY_MS: &str = "PIPELINE_FETCH_DELAY_MS";
const ENV_RUN_TIMEOUT_SECS: &str = "PIPELINE_RUN_TIMEOUT_SECS";
const ENV_INTERVAL_SECS: &str = "PIPELINE_INTERVAL_SECS";
const ENV_BIND_ADDR: &str = "BIND_ADDR";
const ENV_COMPANIES_PATH: &str = "COMPANIES_PATH";

const DEFAULT_COMPANIES_PATH: &str = "config/companies.toml";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub finnhub_key: String,
    pub lookback_days: u32,
    pub workers: usize,
    pub fetch_delay: Duration,
    pub run_timeout: Option<Duration>,
    /// Pause between scheduled full-pipeline runs.
    pub ingest_interval: Duration,
    pub bind_addr: String,
    pub companies_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let finnhub_key = std::env::var(ENV_FINNHUB_KEY)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{ENV_FINNHUB_KEY} is not set; cannot fetch news"))?;

        Ok(Self {
            finnhub_key,
            lookback_days: env_parse(ENV_LOOKBACK_DAYS, 3u32),
            workers: env_parse(ENV_WORKERS, 4usize),
            fetch_delay: Duration::from_millis(env_parse(ENV_FETCH_DELAY_MS, 1_000u64)),
            run_timeout: std::env::var(ENV_RUN_TIMEOUT_SECS)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs),
            ingest_interval: Duration::from_secs(env_parse(ENV_INTERVAL_SECS, 900u64)),
            bind_addr: std::env::var(ENV_BIND_ADDR)
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            companies_path: std::env::var(ENV_COMPANIES_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_COMPANIES_PATH)),
        })
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            workers: self.workers,
            fetch_delay: self.fetch_delay,
            run_timeout: self.run_timeout,
        }
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Load the companies seed file.
pub fn load_companies(path: &Path) -> Result<Vec<NewCompany>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading companies seed from {}", path.display()))?;
    parse_companies(&content)
}

fn parse_companies(s: &str) -> Result<Vec<NewCompany>> {
    #[derive(serde::Deserialize)]
    struct Seed {
        #[serde(default)]
        companies: Vec<NewCompany>,
    }
    let seed: Seed = toml::from_str(s).context("parsing companies seed")?;
    Ok(seed
        .companies
        .into_iter()
        .filter(|c| !c.ticker.trim().is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companies_seed_parses_and_drops_blank_tickers() {
        let s = r#"
            [[companies]]
            ticker = "AAPL"
            name = "Apple Inc"
            sector = "Technology"

            [[companies]]
            ticker = "TSLA"
            name = "Tesla Inc"

            [[companies]]
            ticker = "  "
            name = "nameless"
        "#;
        let rows = parse_companies(s).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticker, "AAPL");
        assert_eq!(rows[1].sector, ""); // sector optional
    }

    #[test]
    fn empty_seed_is_fine() {
        assert!(parse_companies("").unwrap().is_empty());
    }
}
