pub mod config;
pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod stages;
pub mod web;

pub use config::{BatchSettings, PipelineConfig};
pub use error::{PrepError, PrepResult};
pub use llm::{ChatClient, LlmConfig, TextGenerator};
pub use models::{ProposalRecord, StageKind, StageStatus};
pub use stages::{
    execute_clean, execute_enrich, execute_ingest, execute_inspect, execute_merge,
    execute_multilang, execute_restructure, execute_shape, execute_translate, BatchOptions,
    BatchReport, CleanPass,
};
pub use web::{HttpFetcher, PageFetcher};
