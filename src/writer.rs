use crate::config::WriterConfig;
use crate::error::{Result, WriterError};
use crate::hooks::{HookContext, HookReport, HookResult, Keeper, OutcomeSink, Remover};
use crate::intent::{DiscardIntent, DrainSummary, Pipeline, PipelineStats, SaveIntent};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WriterState {
    /// Intents are accepted and buffered, hooks can still be replaced.
    Idle,

    /// Both workers are running.
    Watching,

    /// `wait` closed the queues and is joining the workers.
    Draining,

    /// Workers have exited. The writer cannot be reused.
    Stopped,
}

/// Intents buffered in each queue and not yet taken by a worker.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Pending {
    pub save: usize,
    pub discard: usize,
}

type SharedSink = Arc<dyn OutcomeSink>;

// Everything the workers take ownership of when they start.
struct Hooks<Key, Value> {
    keeper: Box<dyn Keeper<Key, Value>>,
    remover: Box<dyn Remover<Key>>,
    sink: Option<SharedSink>,
    save_receiver: Receiver<SaveIntent<Key, Value>>,
    discard_receiver: Receiver<DiscardIntent<Key>>,
}

struct Workers {
    save: JoinHandle<PipelineStats>,
    discard: JoinHandle<PipelineStats>,
}

enum Lifecycle<Key, Value> {
    Idle(Hooks<Key, Value>),
    Watching(Workers),
    Draining,
    Stopped,
}

/// Buffers save and discard intents and applies them through the keeper and remover hooks on
/// two dedicated worker threads, one per queue.
///
/// Producers on any thread call [`to_save`](Self::to_save) and [`to_discard`](Self::to_discard);
/// both only block when their queue is full. Each queue is strictly FIFO, but nothing orders a
/// save relative to a discard. Hook failures never reach the producer: the worker moves on to
/// the next intent and, if one is installed, reports the outcome to the [`OutcomeSink`].
///
/// Dropping a writer that is watching drains it like [`wait`](Self::wait). Dropping one that
/// was never watched discards whatever it buffered without calling any hook.
///
/// ```
/// use std::time::Duration;
/// use write_behind::store::memory::MemoryStore;
/// use write_behind::writer::AsyncCacheWriter;
///
/// let store = MemoryStore::new();
/// let writer = AsyncCacheWriter::new(store.clone(), store.clone(), 16);
///
/// writer.to_save("session:1", 42, Duration::from_secs(60)).unwrap();
/// writer.to_discard(["session:0"]).unwrap();
/// writer.watch().unwrap();
/// writer.wait().unwrap();
///
/// assert_eq!(store.get("session:1"), Some(42));
/// ```
pub struct AsyncCacheWriter<Key, Value> {
    id: Uuid,
    config: WriterConfig,
    save_sender: RwLock<Option<Sender<SaveIntent<Key, Value>>>>,
    discard_sender: RwLock<Option<Sender<DiscardIntent<Key>>>>,
    lifecycle: Mutex<Lifecycle<Key, Value>>,
}

impl<Key, Value> AsyncCacheWriter<Key, Value>
where
    Key: Send + 'static,
    Value: Send + 'static,
{
    /// Both queues get `capacity` slots.
    pub fn new(
        keeper: impl Keeper<Key, Value> + 'static,
        remover: impl Remover<Key> + 'static,
        capacity: usize,
    ) -> Self {
        Self::with_config(keeper, remover, WriterConfig::with_capacity(capacity))
    }

    pub fn with_config(
        keeper: impl Keeper<Key, Value> + 'static,
        remover: impl Remover<Key> + 'static,
        config: WriterConfig,
    ) -> Self {
        let (save_sender, save_receiver) = bounded(config.save_capacity);
        let (discard_sender, discard_receiver) = bounded(config.discard_capacity);

        AsyncCacheWriter {
            id: Uuid::new_v4(),
            config,
            save_sender: RwLock::new(Some(save_sender)),
            discard_sender: RwLock::new(Some(discard_sender)),
            lifecycle: Mutex::new(Lifecycle::Idle(Hooks {
                keeper: Box::new(keeper),
                remover: Box::new(remover),
                sink: None,
                save_receiver,
                discard_receiver,
            })),
        }
    }

    /// Only allowed before [`watch`](Self::watch); the running workers own their hooks.
    pub fn set_keeper(&self, keeper: impl Keeper<Key, Value> + 'static) -> Result<()> {
        self.with_idle_hooks(|hooks| hooks.keeper = Box::new(keeper))
    }

    /// Only allowed before [`watch`](Self::watch); the running workers own their hooks.
    pub fn set_remover(&self, remover: impl Remover<Key> + 'static) -> Result<()> {
        self.with_idle_hooks(|hooks| hooks.remover = Box::new(remover))
    }

    /// Routes every hook outcome to `sink` instead of dropping it. Only allowed before
    /// [`watch`](Self::watch).
    pub fn set_outcome_sink(&self, sink: impl OutcomeSink + 'static) -> Result<()> {
        let sink: SharedSink = Arc::new(sink);
        self.with_idle_hooks(|hooks| hooks.sink = Some(sink))
    }

    /// Starts the save and discard workers. Intents enqueued while idle are applied first, in
    /// the order they were enqueued.
    pub fn watch(&self) -> Result<()> {
        // `thread::Builder::spawn` panics on a NUL in the name instead of returning an error.
        if self.config.thread_name.contains('\0') {
            return Err(WriterError::InvalidThreadName(self.config.thread_name.clone()));
        }

        let mut lifecycle = self.lifecycle.lock();
        let hooks = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(hooks) => hooks,
            other => {
                let err = if matches!(other, Lifecycle::Watching(_)) {
                    WriterError::AlreadyWatching
                } else {
                    WriterError::Stopped
                };
                *lifecycle = other;
                return Err(err);
            }
        };

        let Hooks {
            mut keeper,
            mut remover,
            sink,
            save_receiver,
            discard_receiver,
        } = hooks;

        // On spawn failure the lifecycle stays Stopped. A failed spawn drops the closure and
        // with it that pipeline's receiver.
        let save = match self.spawn_worker(
            Pipeline::Save,
            save_receiver,
            sink.clone(),
            move |ctx, intent: SaveIntent<Key, Value>| {
                keeper.keep(ctx, intent.key, intent.value, intent.expiration)
            },
        ) {
            Ok(save) => save,
            Err(err) => {
                drop(lifecycle);
                self.abandon(discard_receiver);
                return Err(err.into());
            }
        };

        let discard = match self.spawn_worker(
            Pipeline::Discard,
            discard_receiver,
            sink,
            move |ctx, intent: DiscardIntent<Key>| remover.remove(ctx, intent.key),
        ) {
            Ok(discard) => discard,
            Err(err) => {
                drop(lifecycle);
                self.close();
                let _ = join_worker(Pipeline::Save, save);
                return Err(err.into());
            }
        };

        *lifecycle = Lifecycle::Watching(Workers { save, discard });
        debug!(writer = %self.id, thread_name = %self.config.thread_name, "watching");

        Ok(())
    }

    fn with_idle_hooks(&self, update: impl FnOnce(&mut Hooks<Key, Value>)) -> Result<()> {
        match &mut *self.lifecycle.lock() {
            Lifecycle::Idle(hooks) => {
                update(hooks);
                Ok(())
            }
            Lifecycle::Watching(_) => Err(WriterError::AlreadyWatching),
            Lifecycle::Draining | Lifecycle::Stopped => Err(WriterError::Stopped),
        }
    }

    fn spawn_worker<Intent, Apply>(
        &self,
        pipeline: Pipeline,
        receiver: Receiver<Intent>,
        sink: Option<SharedSink>,
        apply: Apply,
    ) -> std::io::Result<JoinHandle<PipelineStats>>
    where
        Intent: Send + 'static,
        Apply: FnMut(&HookContext, Intent) -> HookResult + Send + 'static,
    {
        let writer_id = self.id;
        thread::Builder::new()
            .name(format!("{}-{}", self.config.thread_name, pipeline))
            .spawn(move || drain(writer_id, pipeline, receiver, sink, apply))
    }
}

impl<Key, Value> AsyncCacheWriter<Key, Value> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn state(&self) -> WriterState {
        match &*self.lifecycle.lock() {
            Lifecycle::Idle(_) => WriterState::Idle,
            Lifecycle::Watching(_) => WriterState::Watching,
            Lifecycle::Draining => WriterState::Draining,
            Lifecycle::Stopped => WriterState::Stopped,
        }
    }

    /// Queue depths. Both are 0 once the queues are closed.
    pub fn pending(&self) -> Pending {
        Pending {
            save: self.save_sender.read().as_ref().map_or(0, Sender::len),
            discard: self.discard_sender.read().as_ref().map_or(0, Sender::len),
        }
    }

    /// Enqueues a save, blocking while the save queue is full.
    ///
    /// Before `watch` nothing drains the queue, so with capacity 0 (or a full queue) this
    /// blocks until another thread calls `watch`.
    pub fn to_save(&self, key: Key, value: Value, expiration: Duration) -> Result<()> {
        let sender = self.save_sender.read();
        let sender = sender.as_ref().ok_or(WriterError::Closed(Pipeline::Save))?;

        sender
            .send(SaveIntent::new(key, value, expiration))
            .map_err(|_| WriterError::Closed(Pipeline::Save))
    }

    /// Enqueues one discard per key, in order. Each key may block on a full queue, so if an
    /// error is returned the keys before it are already enqueued.
    pub fn to_discard<I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = Key>,
    {
        let sender = self.discard_sender.read();
        let sender = sender
            .as_ref()
            .ok_or(WriterError::Closed(Pipeline::Discard))?;

        for key in keys {
            sender
                .send(DiscardIntent::new(key))
                .map_err(|_| WriterError::Closed(Pipeline::Discard))?;
        }

        Ok(())
    }

    /// Like [`to_save`](Self::to_save) but fails with [`WriterError::Full`] instead of
    /// blocking. The rejected intent is dropped.
    pub fn try_to_save(&self, key: Key, value: Value, expiration: Duration) -> Result<()> {
        let sender = self.save_sender.read();
        let sender = sender.as_ref().ok_or(WriterError::Closed(Pipeline::Save))?;

        sender
            .try_send(SaveIntent::new(key, value, expiration))
            .map_err(|err| try_send_error(Pipeline::Save, err, 0))
    }

    /// Like [`to_discard`](Self::to_discard) but fails with [`WriterError::Full`] instead of
    /// blocking. Keys before the one that hit the full queue stay enqueued.
    pub fn try_to_discard<I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = Key>,
    {
        let sender = self.discard_sender.read();
        let sender = sender
            .as_ref()
            .ok_or(WriterError::Closed(Pipeline::Discard))?;

        for (enqueued, key) in keys.into_iter().enumerate() {
            sender
                .try_send(DiscardIntent::new(key))
                .map_err(|err| try_send_error(Pipeline::Discard, err, enqueued))?;
        }

        Ok(())
    }

    /// Closes both queues and blocks until the workers have applied every buffered intent
    /// and exited. Producers must be done before this is called; any later enqueue fails with
    /// [`WriterError::Closed`].
    ///
    /// On an idle writer this returns [`WriterError::NotWatching`] and leaves the queues open,
    /// so buffered intents can still be applied by calling `watch` first.
    pub fn wait(&self) -> Result<DrainSummary> {
        let workers = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Draining) {
                Lifecycle::Watching(workers) => workers,
                other => {
                    let err = if matches!(other, Lifecycle::Idle(_)) {
                        WriterError::NotWatching
                    } else {
                        WriterError::Stopped
                    };
                    *lifecycle = other;
                    return Err(err);
                }
            }
        };

        debug!(writer = %self.id, "closing queues");
        self.close();

        let saves = join_worker(Pipeline::Save, workers.save);
        let discards = join_worker(Pipeline::Discard, workers.discard);
        *self.lifecycle.lock() = Lifecycle::Stopped;

        let summary = DrainSummary {
            saves: saves?,
            discards: discards?,
        };
        debug!(
            writer = %self.id,
            attempted = summary.attempted(),
            failed = summary.failed(),
            "stopped"
        );

        Ok(summary)
    }

    // Dropping the only sender disconnects the channel; the worker sees that once the buffer
    // is empty.
    fn close(&self) {
        self.save_sender.write().take();
        self.discard_sender.write().take();
    }

    // Receivers that no worker will ever read go first: that wakes producers blocked on a full
    // queue with `Closed`, so they release their read guard before `close` takes the write one.
    fn abandon<Leftover>(&self, leftover: Leftover) {
        drop(leftover);
        self.close();
    }
}

impl<Key, Value> Drop for AsyncCacheWriter<Key, Value> {
    fn drop(&mut self) {
        match self.state() {
            WriterState::Watching => {
                let _ = self.wait();
            }
            WriterState::Idle => {
                let pending = self.pending();
                if pending.save > 0 || pending.discard > 0 {
                    warn!(
                        writer = %self.id,
                        save = pending.save,
                        discard = pending.discard,
                        "dropped without watching, buffered intents discarded"
                    );
                }
            }
            WriterState::Draining | WriterState::Stopped => {}
        }
    }
}

fn drain<Intent, Apply>(
    writer_id: Uuid,
    pipeline: Pipeline,
    receiver: Receiver<Intent>,
    sink: Option<SharedSink>,
    mut apply: Apply,
) -> PipelineStats
where
    Apply: FnMut(&HookContext, Intent) -> HookResult,
{
    let mut stats = PipelineStats::default();

    for (sequence, intent) in (0u64..).zip(receiver.iter()) {
        let ctx = HookContext::new(writer_id, pipeline, sequence);
        let result = apply(&ctx, intent);
        stats.record(result.is_ok());

        if let Some(sink) = &sink {
            sink.report(HookReport {
                pipeline,
                sequence,
                result,
            });
        }
    }

    debug!(
        writer = %writer_id,
        %pipeline,
        attempted = stats.attempted,
        failed = stats.failed,
        "worker drained"
    );
    stats
}

fn join_worker(pipeline: Pipeline, handle: JoinHandle<PipelineStats>) -> Result<PipelineStats> {
    handle.join().map_err(|_| {
        warn!(%pipeline, "worker panicked");
        WriterError::WorkerPanicked(pipeline)
    })
}

fn try_send_error<T>(pipeline: Pipeline, err: TrySendError<T>, enqueued: usize) -> WriterError {
    match err {
        TrySendError::Full(_) => WriterError::Full { pipeline, enqueued },
        TrySendError::Disconnected(_) => WriterError::Closed(pipeline),
    }
}
