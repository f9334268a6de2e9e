use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::SchedulerError;
use crate::types::{AlignmentResult, Document, SynthesisSettings, SynthesisUnit, UnitOutput, UnitState};

pub(crate) type UnitResult = Result<UnitOutput, SchedulerError>;

/// What a unit index currently holds. An index with no slot is Pending.
///
/// Ready keeps only the alignment; audio lives in the cache and is subject to
/// its eviction.
pub(crate) enum Slot {
    InFlight {
        task_id: u64,
        rx: watch::Receiver<Option<UnitResult>>,
    },
    Ready {
        alignment: Option<Arc<AlignmentResult>>,
    },
    Failed,
}

impl Slot {
    pub fn unit_state(&self) -> UnitState {
        match self {
            Slot::InFlight { .. } => UnitState::InFlight,
            Slot::Ready { .. } => UnitState::Ready,
            Slot::Failed => UnitState::Failed,
        }
    }
}

/// Everything the scheduler mutates, owned by one mutex.
pub(crate) struct SchedulerState {
    pub document: Option<Arc<Document>>,
    pub settings: SynthesisSettings,
    pub slots: HashMap<usize, Slot>,
    pub tasks: HashMap<u64, JoinHandle<()>>,
    pub playing: Option<usize>,
    /// Anchor whose look-ahead has already been scheduled. Cleared whenever
    /// the playing unit changes.
    pub prefetched_anchor: Option<usize>,
    next_task_id: u64,
}

impl SchedulerState {
    pub fn new(settings: SynthesisSettings) -> Self {
        Self {
            document: None,
            settings,
            slots: HashMap::new(),
            tasks: HashMap::new(),
            playing: None,
            prefetched_anchor: None,
            next_task_id: 0,
        }
    }

    pub fn next_task_id(&mut self) -> u64 {
        self.next_task_id += 1;
        self.next_task_id
    }

    pub fn unit_state(&self, index: usize) -> UnitState {
        self.slots
            .get(&index)
            .map_or(UnitState::Pending, Slot::unit_state)
    }

    pub fn unit(&self, index: usize) -> Option<SynthesisUnit> {
        let document = self.document.as_deref()?;
        let source = document.units.get(index)?;
        Some(SynthesisUnit {
            index,
            text: source.text.clone(),
            state: self.unit_state(index),
        })
    }

    pub fn mark_ready(&mut self, index: usize, output: &UnitOutput) {
        self.slots.insert(
            index,
            Slot::Ready {
                alignment: output.alignment.clone(),
            },
        );
    }

    pub fn ready_alignment(&self, index: usize) -> Option<Arc<AlignmentResult>> {
        match self.slots.get(&index) {
            Some(Slot::Ready { alignment }) => alignment.clone(),
            _ => None,
        }
    }

    /// Moves playback to `index`; a new anchor gets a fresh look-ahead.
    pub fn set_playing(&mut self, index: usize) {
        if self.playing != Some(index) {
            self.prefetched_anchor = None;
        }
        self.playing = Some(index);
    }

    /// True while `task_id` still owns the in-flight slot of `index`.
    pub fn owns_slot(&self, index: usize, task_id: u64) -> bool {
        matches!(
            self.slots.get(&index),
            Some(Slot::InFlight { task_id: owner, .. }) if *owner == task_id
        )
    }

    /// Aborts all outstanding work and forgets every unit result. Returns the
    /// number of tasks aborted.
    pub fn reset_work(&mut self) -> usize {
        let aborted = self.tasks.len();
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
        self.slots.clear();
        self.prefetched_anchor = None;
        aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlignmentPrecision, AudioBuffer, DocumentId, Speed, VoiceId};

    fn state_with_document() -> SchedulerState {
        let mut state = SchedulerState::new(SynthesisSettings::new(VoiceId::new("v"), Speed::NORMAL));
        state.document = Some(Arc::new(Document::from_texts(
            DocumentId::new("doc"),
            ["one", "two"],
        )));
        state
    }

    fn output(aligned: bool) -> UnitOutput {
        let alignment = AlignmentResult {
            unit_index: 0,
            total_duration_secs: 1.0,
            words: Vec::new(),
            precision: AlignmentPrecision::Estimated,
        };
        UnitOutput {
            audio: Arc::new(AudioBuffer {
                samples: vec![0.0; 8_000],
                sample_rate_hz: 8_000,
            }),
            alignment: aligned.then(|| Arc::new(alignment)),
        }
    }

    #[test]
    fn missing_slot_is_pending() {
        let state = state_with_document();
        assert_eq!(state.unit_state(0), UnitState::Pending);
        let unit = state.unit(1).unwrap();
        assert_eq!(unit.text, "two");
        assert_eq!(unit.state, UnitState::Pending);
        assert!(state.unit(2).is_none());
    }

    #[test]
    fn slot_ownership_follows_task_id() {
        let mut state = state_with_document();
        let (_tx, rx) = watch::channel(None);
        let id = state.next_task_id();
        state.slots.insert(0, Slot::InFlight { task_id: id, rx });
        assert!(state.owns_slot(0, id));
        assert!(!state.owns_slot(0, id + 1));
        assert!(!state.owns_slot(1, id));
        assert_eq!(state.unit_state(0), UnitState::InFlight);
    }

    #[test]
    fn ready_slot_does_not_hold_audio() {
        let mut state = state_with_document();
        let ready = output(true);
        state.mark_ready(0, &ready);
        assert_eq!(state.unit_state(0), UnitState::Ready);
        assert_eq!(Arc::strong_count(&ready.audio), 1);
        let alignment = state.ready_alignment(0).expect("alignment kept");
        assert!(Arc::ptr_eq(&alignment, ready.alignment.as_ref().unwrap()));

        state.mark_ready(1, &output(false));
        assert_eq!(state.unit_state(1), UnitState::Ready);
        assert!(state.ready_alignment(1).is_none());
    }

    #[test]
    fn changing_playing_unit_clears_prefetched_anchor() {
        let mut state = state_with_document();
        state.set_playing(0);
        state.prefetched_anchor = Some(0);
        state.set_playing(0);
        assert_eq!(state.prefetched_anchor, Some(0));
        state.set_playing(1);
        assert_eq!(state.playing, Some(1));
        assert_eq!(state.prefetched_anchor, None);
    }

    #[test]
    fn reset_forgets_results_and_anchor() {
        let mut state = state_with_document();
        state.mark_ready(0, &output(true));
        state.slots.insert(1, Slot::Failed);
        state.prefetched_anchor = Some(0);
        assert!(state.ready_alignment(0).is_some());
        assert_eq!(state.reset_work(), 0);
        assert!(state.slots.is_empty());
        assert!(state.prefetched_anchor.is_none());
        assert!(state.ready_alignment(0).is_none());
    }
}
