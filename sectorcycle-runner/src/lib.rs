//! SectorCycle Runner: configuration, pipeline orchestration, report export.
//!
//! This crate builds on `sectorcycle-core` to provide:
//! - TOML analysis configuration with validation
//! - The end-to-end pipeline with typed fatal errors and recorded stage notes
//! - A deterministic, fingerprinted analysis report
//! - JSON and CSV artifact export

pub mod config;
pub mod export;
pub mod pipeline;
pub mod report;

pub use config::{AnalysisConfig, BrokerConfig, ConfigError, FetchConfig, MacroSeriesConfig, SectorConfig};
pub use export::{load_report, save_report};
pub use pipeline::{Collaborators, Pipeline, PipelineError};
pub use report::{AnalysisReport, FetchRecord, FetchSource, Stage, StageNote, SCHEMA_VERSION};
