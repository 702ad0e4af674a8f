//! Write-behind decoupling for an external key/value store.
//!
//! Callers enqueue save and discard intents on an [`AsyncCacheWriter`]; two background workers
//! apply them through the injected [`Keeper`] and [`Remover`] hooks so that store latency stays
//! off the caller's path.
pub mod config;
pub mod error;
pub mod hooks;
pub mod intent;
pub mod store;
pub mod writer;

pub use config::WriterConfig;
pub use error::{Result, WriterError};
pub use hooks::{HookContext, HookError, HookReport, HookResult, Keeper, OutcomeSink, Remover};
pub use intent::{DrainSummary, Pipeline, PipelineStats};
pub use writer::{AsyncCacheWriter, Pending, WriterState};
