use serde::{Deserialize, Serialize};

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_THREAD_NAME: &str = "write-behind";

/// Sizing and naming for an [`AsyncCacheWriter`](crate::writer::AsyncCacheWriter).
///
/// A capacity of 0 turns the queue into a rendezvous channel: every enqueue blocks until the
/// worker is ready to take it, so nothing can be enqueued before `watch`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Intents the save queue buffers before `to_save` blocks
    pub save_capacity: usize,
    /// Intents the discard queue buffers before `to_discard` blocks
    pub discard_capacity: usize,
    /// Prefix for the worker thread names, suffixed with `-save` and `-discard`
    pub thread_name: String,
}

impl WriterConfig {
    /// Same capacity for both queues.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            save_capacity: capacity,
            discard_capacity: capacity,
            ..Self::default()
        }
    }

    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            save_capacity: DEFAULT_CAPACITY,
            discard_capacity: DEFAULT_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}
