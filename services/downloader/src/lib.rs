//! Chunked, resumable transfer of ocean datasets to object storage.
//!
//! A job's domain is split into chunks by a planner. Each chunk is fetched,
//! staged locally, uploaded, and then recorded in a completion ledger, so a
//! restarted run skips everything that already finished:
//! - [`planner`]: time windows or key-prefix listings
//! - [`ledger`]: durable set of completed chunk ids
//! - [`retry`]: fixed-delay bounded retry
//! - [`worker`]: fetch, stage, upload, commit for one chunk
//! - [`runner`]: sequential loop over a plan

pub mod chunk;
pub mod config;
pub mod error;
pub mod job;
pub mod ledger;
pub mod planner;
pub mod report;
pub mod retry;
pub mod runner;
pub mod source;
pub mod staging;
pub mod worker;

pub use chunk::{ChunkDescriptor, ChunkId};
pub use config::{load_job_configs, JobConfig, SourceConfig};
pub use error::{
    ChunkError, ConfigError, LedgerError, PipelineError, PlanError, ReportError,
    RetryPolicyError, SourceError, StagingError,
};
pub use job::{run_job, run_key_prefix, JobPaths};
pub use ledger::CompletionLedger;
pub use planner::{Granularity, KeyLister, KeyPrefixPlanner, TimeWindowPlanner};
pub use retry::{run_with_retry, RetryPolicy};
pub use runner::{PipelineRunner, RunSummary};
pub use source::{DatasetSource, LazyDataset};
pub use staging::StagingArea;
pub use worker::{ChunkReport, Destination, TransferWorker};
