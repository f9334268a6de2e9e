use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::cache::{AlignmentCache, CacheEntry, CacheKey, CacheStats};
use crate::config::SyncConfig;
use crate::error::{ConfigError, SchedulerError};
use crate::highlight::HighlightCursor;
use crate::pipeline::builder::PhonemeAlignerBuilder;
use crate::pipeline::runtime::PhonemeAligner;
use crate::pipeline::traits::SynthesisEngine;
use crate::types::{
    Document, DocumentId, Speed, SynthesisSettings, SynthesisUnit, UnitOutput, UnitState, VoiceId,
};

mod state;
mod worker;

use state::{SchedulerState, Slot, UnitResult};
use worker::{Origin, UnitJob};

/// Sequences synthesis and alignment per unit, prefetches ahead of playback and
/// drops stale work when the voice, speed or document changes.
///
/// All bookkeeping lives behind one mutex that is never held across an await.
/// Engine calls, alignment and persistent IO run on the blocking pool and
/// rejoin shared state only through `commit`, which discards results from a
/// superseded generation. Audio is held by the cache alone, so its memory
/// bound also bounds the scheduler.
pub struct SynthesisScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    prefetch_depth: usize,
    engine: Arc<dyn SynthesisEngine>,
    aligner: Arc<PhonemeAligner>,
    cache: Arc<AlignmentCache>,
    runtime: Handle,
    generation: AtomicU64,
    state: Mutex<SchedulerState>,
    /// Workers touch the cache under the read side after checking they are
    /// current; invalidation clears it under the write side.
    cache_gate: RwLock<()>,
}

pub struct SynthesisSchedulerBuilder {
    config: SyncConfig,
    engine: Option<Arc<dyn SynthesisEngine>>,
    aligner: Option<PhonemeAligner>,
    cache: Option<Arc<AlignmentCache>>,
    settings: SynthesisSettings,
    runtime: Option<Handle>,
}

impl SynthesisSchedulerBuilder {
    pub const DEFAULT_VOICE: &'static str = "default";

    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            engine: None,
            aligner: None,
            cache: None,
            settings: SynthesisSettings::new(VoiceId::new(Self::DEFAULT_VOICE), Speed::NORMAL),
            runtime: None,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn SynthesisEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_aligner(mut self, aligner: PhonemeAligner) -> Self {
        self.aligner = Some(aligner);
        self
    }

    pub fn with_cache(mut self, cache: Arc<AlignmentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_settings(mut self, settings: SynthesisSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<SynthesisScheduler, ConfigError> {
        self.config.validate()?;
        let engine = self
            .engine
            .ok_or_else(|| ConfigError::invalid("a synthesis engine is required"))?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| {
                ConfigError::invalid("scheduler must be built inside a tokio runtime or given a handle")
            })?,
        };
        let aligner = self
            .aligner
            .unwrap_or_else(|| PhonemeAlignerBuilder::from_config(&self.config).build());
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(AlignmentCache::from_config(&self.config)));

        tracing::debug!(
            prefetch_depth = self.config.prefetch_depth,
            memory_capacity = self.config.memory_capacity,
            persistent = cache.has_persistent_tier(),
            voice = %self.settings.voice,
            speed = %self.settings.speed,
            "scheduler: built"
        );

        Ok(SynthesisScheduler {
            inner: Arc::new(SchedulerInner {
                prefetch_depth: self.config.prefetch_depth,
                engine,
                aligner: Arc::new(aligner),
                cache,
                runtime,
                generation: AtomicU64::new(0),
                state: Mutex::new(SchedulerState::new(self.settings)),
                cache_gate: RwLock::new(()),
            }),
        })
    }
}

impl SynthesisScheduler {
    /// Returns the unit's audio and alignment, synthesizing it if needed.
    ///
    /// Concurrent requests for one unit share a single synthesis. Work that is
    /// superseded by a settings or document change resolves to
    /// [`SchedulerError::Cancelled`].
    pub async fn request_unit(&self, index: usize) -> Result<UnitOutput, SchedulerError> {
        let rx = {
            let mut state = self.inner.state.lock();
            let document = checked_document(&state, index)?;
            let joined = match state.slots.get(&index) {
                Some(Slot::InFlight { rx, .. }) => Some(rx.clone()),
                Some(Slot::Ready { .. } | Slot::Failed) | None => None,
            };
            match joined {
                Some(rx) => {
                    tracing::debug!(unit_index = index, "scheduler: joining in-flight unit");
                    rx
                }
                None => {
                    // A memory hit settles the unit but is not a completion, so
                    // it never triggers look-ahead.
                    if let Some(output) = self.inner.settle_from_memory(&mut state, &document, index) {
                        return Ok(output);
                    }
                    if state.unit_state(index) == UnitState::Ready {
                        tracing::debug!(
                            unit_index = index,
                            "scheduler: ready unit evicted from memory; reloading"
                        );
                    }
                    self.inner
                        .start_unit(&mut state, &document, index, Origin::Request)
                }
            }
        };
        wait_for_result(rx, index).await
    }

    /// Marks `index` as playing and schedules look-ahead synthesis.
    ///
    /// The look-ahead for an anchor is scheduled once while it stays the
    /// playing unit. When the anchor is not Ready yet, scheduling waits for its
    /// completion.
    pub fn advance(&self, index: usize) -> Result<(), SchedulerError> {
        let mut state = self.inner.state.lock();
        checked_document(&state, index)?;
        state.set_playing(index);
        tracing::debug!(unit_index = index, "scheduler: playing unit advanced");
        self.inner.schedule_prefetch(&mut state);
        Ok(())
    }

    pub fn on_voice_changed(&self, voice: VoiceId) {
        let mut state = self.inner.state.lock();
        if state.settings.voice == voice {
            return;
        }
        tracing::info!(from = %state.settings.voice, to = %voice, "scheduler: voice changed");
        state.settings.voice = voice;
        self.inner.invalidate(&mut state, "voice changed");
        drop(state);
        self.inner.clear_cache_with(AlignmentCache::invalidate_all);
    }

    pub fn on_speed_changed(&self, speed: Speed) {
        let mut state = self.inner.state.lock();
        if state.settings.speed == speed {
            return;
        }
        tracing::info!(from = %state.settings.speed, to = %speed, "scheduler: speed changed");
        state.settings.speed = speed;
        self.inner.invalidate(&mut state, "speed changed");
        drop(state);
        self.inner.clear_cache_with(AlignmentCache::invalidate_all);
    }

    /// Replaces the document. All unit state is reset and the previous
    /// document's in-memory cache entries are dropped; its persistent records
    /// stay for a later reopen.
    pub fn on_document_changed(&self, document: Document) {
        let mut state = self.inner.state.lock();
        self.inner.invalidate(&mut state, "document changed");
        state.playing = None;
        let previous = state.document.replace(Arc::new(document));
        tracing::info!(
            document = %state.document.as_ref().map(|d| d.id.as_str()).unwrap_or_default(),
            units = state.document.as_ref().map_or(0, |d| d.units.len()),
            "scheduler: document loaded"
        );
        drop(state);
        if let Some(previous) = previous {
            let id = previous.id.clone();
            self.inner
                .clear_cache_with(move |cache| cache.release_document(&id));
        }
    }

    pub fn unit(&self, index: usize) -> Option<SynthesisUnit> {
        self.inner.state.lock().unit(index)
    }

    pub fn unit_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .document
            .as_ref()
            .map_or(0, |d| d.units.len())
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        self.inner
            .state
            .lock()
            .document
            .as_ref()
            .map(|d| d.id.clone())
    }

    pub fn settings(&self) -> SynthesisSettings {
        self.inner.state.lock().settings.clone()
    }

    pub fn playing(&self) -> Option<usize> {
        self.inner.state.lock().playing
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Char range of the word spoken at `time_secs` into the playing unit.
    pub fn current_highlighted_range(&self, time_secs: f64) -> Option<Range<usize>> {
        self.highlight_cursor().highlighted_range(time_secs)
    }

    /// Snapshot cursor over the playing unit's alignment; querying it takes no
    /// scheduler lock.
    pub fn highlight_cursor(&self) -> HighlightCursor {
        let state = self.inner.state.lock();
        let alignment = state
            .playing
            .and_then(|index| state.ready_alignment(index));
        HighlightCursor::new(alignment)
    }
}

impl Drop for SynthesisScheduler {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        for (_, handle) in state.tasks.drain() {
            handle.abort();
        }
    }
}

impl SchedulerInner {
    fn cache_key(&self, state: &SchedulerState, document: &Document, index: usize) -> CacheKey {
        CacheKey::new(
            document.id.clone(),
            index,
            state.settings.voice.clone(),
            state.settings.speed,
        )
    }

    /// Puts `index` in flight and spawns its worker. Caller holds the lock, so
    /// the worker cannot commit before its slot and task handle are recorded.
    fn start_unit(
        self: &Arc<Self>,
        state: &mut SchedulerState,
        document: &Document,
        index: usize,
        origin: Origin,
    ) -> watch::Receiver<Option<UnitResult>> {
        let task_id = state.next_task_id();
        let (tx, rx) = watch::channel(None);
        let job = UnitJob {
            generation: self.generation.load(Ordering::SeqCst),
            task_id,
            origin,
            key: self.cache_key(state, document, index),
            text: document.units[index].text.clone(),
            word_positions: document.units[index].word_positions.clone(),
        };
        state.slots.insert(
            index,
            Slot::InFlight {
                task_id,
                rx: rx.clone(),
            },
        );
        tracing::debug!(
            unit_index = index,
            task_id,
            origin = origin.as_str(),
            "scheduler: unit in flight"
        );

        let inner = Arc::clone(self);
        let handle = self.runtime.spawn(async move {
            let result = inner.run_job(&job).await;
            inner.commit(&job, result, tx);
        });
        state.tasks.insert(task_id, handle);
        rx
    }

    async fn run_job(self: &Arc<Self>, job: &UnitJob) -> UnitResult {
        let inner = Arc::clone(self);
        let blocking_job = job.clone();
        let joined = self
            .runtime
            .spawn_blocking(move || -> UnitResult {
                if let Some(entry) = inner.lookup(&blocking_job)? {
                    tracing::debug!(unit_index = blocking_job.unit_index(), "worker: served from cache");
                    return Ok(worker::unit_output(entry));
                }
                let output =
                    worker::produce_unit(inner.engine.as_ref(), &inner.aligner, &blocking_job)?;
                inner.write_back(&blocking_job, &output);
                Ok(output)
            })
            .await;
        match joined {
            Ok(result) => result,
            Err(err) => Err(SchedulerError::worker(job.unit_index(), err)),
        }
    }

    /// True while `job` belongs to the current generation and still owns its slot.
    fn is_current(&self, state: &SchedulerState, job: &UnitJob) -> bool {
        self.generation.load(Ordering::SeqCst) == job.generation
            && state.owns_slot(job.unit_index(), job.task_id)
    }

    /// Cache read for a worker. A superseded job reads nothing, so a stale
    /// persistent record is never promoted into memory.
    fn lookup(&self, job: &UnitJob) -> Result<Option<CacheEntry>, SchedulerError> {
        let _gate = self.cache_gate.read();
        if !self.is_current(&self.state.lock(), job) {
            return Err(SchedulerError::cancelled(job.unit_index()));
        }
        Ok(self.cache.get(&job.key))
    }

    /// Writes a fresh result through both cache tiers. The currency check and
    /// the write happen under one read gate, so an invalidation either sees the
    /// entry and clears it or the job sees the new generation and skips it.
    fn write_back(&self, job: &UnitJob, output: &UnitOutput) {
        let _gate = self.cache_gate.read();
        if !self.is_current(&self.state.lock(), job) {
            tracing::debug!(
                unit_index = job.unit_index(),
                task_id = job.task_id,
                "scheduler: superseded result not cached"
            );
            return;
        }
        self.cache.insert(job.key.clone(), worker::cache_entry(output));
    }

    /// Single write-back point for worker results.
    fn commit(self: &Arc<Self>, job: &UnitJob, result: UnitResult, tx: watch::Sender<Option<UnitResult>>) {
        let index = job.unit_index();
        let mut state = self.state.lock();
        if !self.is_current(&state, job) {
            drop(state);
            tracing::debug!(
                unit_index = index,
                task_id = job.task_id,
                "scheduler: discarding superseded result"
            );
            tx.send_replace(Some(Err(SchedulerError::cancelled(index))));
            return;
        }

        state.tasks.remove(&job.task_id);
        match &result {
            Ok(output) => {
                state.mark_ready(index, output);
                tracing::debug!(
                    unit_index = index,
                    origin = job.origin.as_str(),
                    aligned = output.alignment.is_some(),
                    "scheduler: unit ready"
                );
                self.schedule_prefetch(&mut state);
            }
            Err(err) => {
                state.slots.insert(index, Slot::Failed);
                tracing::warn!(
                    unit_index = index,
                    origin = job.origin.as_str(),
                    error = %err,
                    "scheduler: unit failed"
                );
            }
        }
        drop(state);
        tx.send_replace(Some(result));
    }

    /// Marks `index` Ready from the memory tier, if its audio is resident.
    fn settle_from_memory(
        &self,
        state: &mut SchedulerState,
        document: &Document,
        index: usize,
    ) -> Option<UnitOutput> {
        let key = self.cache_key(state, document, index);
        let output = worker::unit_output(self.cache.get_memory(&key)?);
        state.mark_ready(index, &output);
        Some(output)
    }

    /// The only place look-ahead work is started. Runs once per anchor, and
    /// only after the anchor is Ready.
    fn schedule_prefetch(self: &Arc<Self>, state: &mut SchedulerState) {
        let Some(anchor) = state.playing else {
            return;
        };
        let Some(document) = state.document.clone() else {
            return;
        };
        if state.unit_state(anchor) != UnitState::Ready {
            return;
        }
        if state.prefetched_anchor == Some(anchor) {
            return;
        }
        state.prefetched_anchor = Some(anchor);

        let last = anchor
            .saturating_add(self.prefetch_depth)
            .min(document.units.len().saturating_sub(1));
        let mut scheduled = 0usize;
        for index in anchor.saturating_add(1)..=last {
            match state.unit_state(index) {
                UnitState::InFlight => continue,
                UnitState::Ready
                    if self
                        .cache
                        .contains_memory(&self.cache_key(state, &document, index)) =>
                {
                    continue
                }
                UnitState::Ready | UnitState::Pending | UnitState::Failed => {}
            }
            if self.settle_from_memory(state, &document, index).is_some() {
                continue;
            }
            self.start_unit(state, &document, index, Origin::Prefetch);
            scheduled += 1;
        }
        tracing::debug!(anchor, scheduled, "scheduler: look-ahead scheduled");
    }

    /// Bumps the generation and drops all outstanding work. Caller holds the lock.
    fn invalidate(&self, state: &mut SchedulerState, reason: &'static str) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let aborted = state.reset_work();
        tracing::info!(generation, aborted, reason, "scheduler: outstanding work cancelled");
    }

    /// Runs a cache invalidation on the blocking pool under the write gate.
    fn clear_cache_with<F>(self: &Arc<Self>, clear: F)
    where
        F: FnOnce(&AlignmentCache) + Send + 'static,
    {
        let inner = Arc::clone(self);
        self.runtime.spawn_blocking(move || {
            let _gate = inner.cache_gate.write();
            clear(&inner.cache);
        });
    }
}

fn checked_document(state: &SchedulerState, index: usize) -> Result<Arc<Document>, SchedulerError> {
    let document = state.document.clone().ok_or(SchedulerError::NoDocument)?;
    if index >= document.units.len() {
        return Err(SchedulerError::UnitOutOfRange {
            unit_index: index,
            unit_count: document.units.len(),
        });
    }
    Ok(document)
}

async fn wait_for_result(
    mut rx: watch::Receiver<Option<UnitResult>>,
    index: usize,
) -> Result<UnitOutput, SchedulerError> {
    match rx.wait_for(Option::is_some).await {
        Ok(value) => match &*value {
            Some(result) => result.clone(),
            None => Err(SchedulerError::cancelled(index)),
        },
        // Sender dropped without a result: the worker was aborted.
        Err(_) => Err(SchedulerError::cancelled(index)),
    }
}
