pub mod aggregate;
pub mod brief;
pub mod config;
pub mod data_utils;
pub mod error;
pub mod extremes;
pub mod ingest;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod pivot;
pub mod prompt;
pub mod safety;
pub mod scan;

pub use config::{LlmSettings, PulseConfig, RetrySettings, ScanConfig};
pub use error::{PulseError, Result};
pub use model::{AggregateRow, AnomalyRecord, RankDirection, RunSummary, ScanResult, Timeframe};
pub use pipeline::{BriefOutput, BriefPipeline};
pub use safety::{NarrativeService, ResilientClient, RetryPolicy};
pub use scan::ScanOrchestrator;
