// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod api;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod scheduler;
pub mod scorer;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::DailyAggregator;
pub use crate::api::{create_router, AppState};
pub use crate::pipeline::{IngestionPipeline, PipelineOptions, ProcessingReport, RunReport};
pub use crate::scorer::{LexiconScorer, SentimentScorer};
pub use crate::store::{memory::MemoryStore, ArticleStore, StoreError};
