pub mod aggregate;
pub mod checkpoint;
pub mod chunker;
mod config;
pub mod dedup;
pub mod outcome;
pub mod parser;
pub mod prompts;
pub mod rehydrate;
mod trace;
mod translator;

pub use aggregate::{Aggregator, MergePolicy};
pub use config::{
    init_default_config, PipelineConfig, PipelineOverrides, ServiceSettings, DEFAULT_BASE_URL,
};
pub use outcome::{BatchFailure, BatchOutcome, BatchStatus, RunReport};
pub use prompts::{OutputFormat, PromptPolicy, PromptSet};
pub use trace::TraceWriter;
pub use translator::{TranslationClient, TranslatorPipeline};
