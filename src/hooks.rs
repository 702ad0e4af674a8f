use crate::intent::Pipeline;
use std::error::Error;
use std::time::Duration;
use uuid::Uuid;

pub type HookError = Box<dyn Error + Send + Sync>;

pub type HookResult = Result<(), HookError>;

/// Handed to every hook invocation. It carries no cancellation signal: hooks that need a
/// deadline must enforce it themselves, otherwise a stuck call stalls the whole pipeline.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct HookContext {
    writer_id: Uuid,
    pipeline: Pipeline,
    sequence: u64,
}

impl HookContext {
    pub(crate) fn new(writer_id: Uuid, pipeline: Pipeline, sequence: u64) -> Self {
        HookContext {
            writer_id,
            pipeline,
            sequence,
        }
    }

    pub fn writer_id(&self) -> Uuid {
        self.writer_id
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    /// Position of the intent within its own queue, starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Applies a save to the external store. Only ever called from the save worker, once per
/// intent, in enqueue order.
pub trait Keeper<Key, Value>: Send {
    fn keep(&mut self, ctx: &HookContext, key: Key, value: Value, expiration: Duration)
        -> HookResult;
}

/// Applies a discard to the external store. Only ever called from the discard worker.
pub trait Remover<Key>: Send {
    fn remove(&mut self, ctx: &HookContext, key: Key) -> HookResult;
}

impl<Key, Value, F> Keeper<Key, Value> for F
where
    F: FnMut(&HookContext, Key, Value, Duration) -> HookResult + Send,
{
    fn keep(
        &mut self,
        ctx: &HookContext,
        key: Key,
        value: Value,
        expiration: Duration,
    ) -> HookResult {
        self(ctx, key, value, expiration)
    }
}

impl<Key, F> Remover<Key> for F
where
    F: FnMut(&HookContext, Key) -> HookResult + Send,
{
    fn remove(&mut self, ctx: &HookContext, key: Key) -> HookResult {
        self(ctx, key)
    }
}

/// Outcome of a single hook invocation.
#[derive(Debug)]
pub struct HookReport {
    pub pipeline: Pipeline,
    pub sequence: u64,
    pub result: HookResult,
}

impl HookReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Receives hook outcomes that the workers would otherwise drop. Shared by both workers, so
/// reports from the two pipelines interleave arbitrarily.
pub trait OutcomeSink: Send + Sync {
    fn report(&self, report: HookReport);
}

impl<F> OutcomeSink for F
where
    F: Fn(HookReport) + Send + Sync,
{
    fn report(&self, report: HookReport) {
        self(report)
    }
}
