pub mod api;
pub mod browser;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod error;
pub mod harvest;
pub mod pipeline;
pub mod profile;
pub mod query;
pub mod stealth;
pub mod tasks;

pub use browser::{ChromeFetcher, FetchKind, FetchRequest, PageFetcher, RenderedPage};
pub use config::{DelayRange, LlmSettings, ScrapeConfig, Settings};
pub use error::{Result, ScrapeError};
pub use pipeline::{ExtractionOutcome, Pipeline, RunSummary};
pub use profile::Profile;
pub use query::QueryGenerator;
