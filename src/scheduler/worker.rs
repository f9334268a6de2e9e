use std::ops::Range;
use std::sync::Arc;

use crate::alignment::report::cross_check;
use crate::cache::{CacheEntry, CacheKey};
use crate::error::SynthesisError;
use crate::pipeline::runtime::PhonemeAligner;
use crate::pipeline::traits::SynthesisEngine;
use crate::types::{AlignmentInput, AlignmentResult, SynthesisRequest, UnitOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Request,
    Prefetch,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Request => "request",
            Origin::Prefetch => "prefetch",
        }
    }
}

/// Private inputs of one unit's synthesis. Built under the state lock, then
/// handed to the worker by value.
#[derive(Debug, Clone)]
pub(crate) struct UnitJob {
    pub generation: u64,
    pub task_id: u64,
    pub origin: Origin,
    pub key: CacheKey,
    pub text: String,
    pub word_positions: Option<Vec<Range<usize>>>,
}

impl UnitJob {
    pub fn unit_index(&self) -> usize {
        self.key.unit_index
    }
}

/// Blocking part of a unit: synthesis, then alignment.
///
/// Only a synthesis failure is an error; an alignment failure yields audio
/// without alignment. Cache reads and writes are left to the scheduler.
pub(crate) fn produce_unit(
    engine: &dyn SynthesisEngine,
    aligner: &PhonemeAligner,
    job: &UnitJob,
) -> Result<UnitOutput, SynthesisError> {
    let unit_index = job.unit_index();
    let request = SynthesisRequest {
        unit_index,
        text: job.text.clone(),
        voice: job.key.voice.clone(),
        speed: job.key.speed,
    };
    let started = std::time::Instant::now();
    let output = engine.synthesize(&request)?;
    let audio = Arc::new(output.audio);
    tracing::debug!(
        unit_index,
        origin = job.origin.as_str(),
        samples = audio.samples.len(),
        phonemes = output.phonemes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "worker: synthesis done"
    );

    let input = AlignmentInput {
        unit_index,
        original_text: job.text.clone(),
        normalized_text: output.normalized_text,
        phonemes: output.phonemes,
        breakpoints: output.breakpoints,
        audio_duration_secs: audio.duration_secs(),
    };
    let alignment = match aligner.align(&input) {
        Ok(alignment) => {
            if let Some(positions) = &job.word_positions {
                log_cross_check(&alignment, positions);
            }
            Some(Arc::new(alignment))
        }
        Err(err) => {
            tracing::warn!(
                unit_index,
                error = %err,
                "worker: alignment failed; unit has audio only"
            );
            None
        }
    };

    Ok(UnitOutput { audio, alignment })
}

pub(crate) fn cache_entry(output: &UnitOutput) -> CacheEntry {
    CacheEntry {
        audio: Arc::clone(&output.audio),
        alignment: output.alignment.clone(),
    }
}

pub(crate) fn unit_output(entry: CacheEntry) -> UnitOutput {
    UnitOutput {
        audio: entry.audio,
        alignment: entry.alignment,
    }
}

fn log_cross_check(alignment: &AlignmentResult, positions: &[Range<usize>]) {
    let report = cross_check(&alignment.words, positions);
    if report.agrees() {
        tracing::debug!(
            unit_index = alignment.unit_index,
            matched = report.matched,
            "worker: alignment agrees with document word positions"
        );
    } else {
        tracing::warn!(
            unit_index = alignment.unit_index,
            matched = report.matched,
            mismatched = report.mismatched,
            missing = report.missing_in_alignment,
            extra = report.extra_in_alignment,
            "worker: alignment disagrees with document word positions"
        );
    }
}
