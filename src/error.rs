//! Lifecycle and enqueue errors reported by [`AsyncCacheWriter`](crate::writer::AsyncCacheWriter).
//!
//! Failures returned by the keeper and remover hooks never show up here. They
//! are swallowed by the workers and only reach an installed outcome sink.

use crate::intent::Pipeline;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WriterError>;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("writer is already watching")]
    AlreadyWatching,

    #[error("writer is not watching")]
    NotWatching,

    #[error("writer has been stopped")]
    Stopped,

    #[error("{0} queue is closed")]
    Closed(Pipeline),

    #[error("{pipeline} queue is full after enqueueing {enqueued} intents")]
    Full { pipeline: Pipeline, enqueued: usize },

    #[error("{0} worker panicked")]
    WorkerPanicked(Pipeline),

    #[error("invalid worker thread name: {0:?}")]
    InvalidThreadName(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
