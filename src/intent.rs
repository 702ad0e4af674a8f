use std::fmt;
use std::time::Duration;

/// Identifies which of the two queues an intent or event belongs to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Pipeline {
    /// Intents applied through the keeper hook.
    Save,

    /// Intents applied through the remover hook.
    Discard,
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipeline::Save => f.write_str("save"),
            Pipeline::Discard => f.write_str("discard"),
        }
    }
}

/// A pending write, consumed exactly once by the save worker.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SaveIntent<Key, Value> {
    pub key: Key,
    pub value: Value,
    pub expiration: Duration,
}

impl<Key, Value> SaveIntent<Key, Value> {
    pub fn new(key: Key, value: Value, expiration: Duration) -> Self {
        SaveIntent {
            key,
            value,
            expiration,
        }
    }
}

/// A pending removal, consumed exactly once by the discard worker.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DiscardIntent<Key> {
    pub key: Key,
}

impl<Key> DiscardIntent<Key> {
    pub fn new(key: Key) -> Self {
        DiscardIntent { key }
    }
}

/// Counters for one pipeline, accumulated by its worker until the queue is drained.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct PipelineStats {
    /// Hook invocations made, successful or not.
    pub attempted: u64,

    /// Hook invocations that returned an error.
    pub failed: u64,
}

impl PipelineStats {
    pub fn record(&mut self, succeeded: bool) {
        self.attempted += 1;
        if !succeeded {
            self.failed += 1;
        }
    }

    pub fn succeeded(&self) -> u64 {
        self.attempted - self.failed
    }
}

/// What both workers did between `watch` and the end of `wait`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DrainSummary {
    pub saves: PipelineStats,
    pub discards: PipelineStats,
}

impl DrainSummary {
    pub fn attempted(&self) -> u64 {
        self.saves.attempted + self.discards.attempted
    }

    pub fn failed(&self) -> u64 {
        self.saves.failed + self.discards.failed
    }
}
