use std::ops::Range;

use crate::alignment::mapping::TextNormalizationMapper;
use crate::alignment::tokenization::TextToken;
use crate::types::{RawPhoneme, WordTiming};

mod display_projection;
mod lockstep;
mod phoneme_groups;
#[cfg(test)]
mod tests;

/// Contiguous run of phonemes attributed to one normalized word.
#[derive(Debug, Clone, PartialEq)]
pub struct PhonemeGroup {
    pub normalized_range: Range<usize>,
    pub duration_secs: f64,
    pub phoneme_count: usize,
}

/// True when the phoneme stream can drive word durations: non-empty, every
/// duration finite and non-negative, and some time in total.
pub fn phoneme_durations_usable(phonemes: &[RawPhoneme]) -> bool {
    !phonemes.is_empty()
        && phonemes
            .iter()
            .all(|p| p.duration_secs.is_finite() && p.duration_secs >= 0.0)
        && phonemes.iter().map(|p| p.duration_secs).sum::<f64>() > 0.0
}

pub fn group_phonemes(phonemes: &[RawPhoneme], normalized_words: &[TextToken]) -> Vec<PhonemeGroup> {
    let raw = phoneme_groups::split_on_range_change(phonemes);
    let raw_count = raw.len();
    let groups = phoneme_groups::coalesce_by_word(raw, normalized_words);
    tracing::debug!(
        phonemes = phonemes.len(),
        raw_groups = raw_count,
        groups = groups.len(),
        normalized_words = normalized_words.len(),
        "grouping: phoneme groups built"
    );
    groups
}

/// Walks groups and normalized words in lock-step and moves the resulting
/// durations onto display words. `None` means nothing could be covered.
pub fn distribute_to_display(
    groups: &[PhonemeGroup],
    normalized_words: &[TextToken],
    display_words: &[TextToken],
    mapper: &TextNormalizationMapper,
) -> Option<Vec<f64>> {
    let per_normalized = lockstep::match_groups_to_words(groups, normalized_words.len());
    display_projection::project_to_display(normalized_words, &per_normalized, display_words, mapper)
}

/// Degraded mode: every display word gets `total / word_count`.
pub fn uniform_durations(word_count: usize, total_secs: f64) -> Vec<f64> {
    if word_count == 0 {
        return Vec::new();
    }
    vec![total_secs / word_count as f64; word_count]
}

/// Builds the final timings and reconciles them with the unit's total duration.
///
/// A shortfall is absorbed by the last word (no unaccounted trailing audio); an
/// overshoot scales every word down. The last word is finally pinned to end at
/// `total_secs` so the sum is exact up to float precision.
pub fn build_word_timings(
    display_words: &[TextToken],
    mut durations: Vec<f64>,
    total_secs: f64,
    epsilon_secs: f64,
) -> Vec<WordTiming> {
    debug_assert_eq!(display_words.len(), durations.len());
    let sum: f64 = durations.iter().sum();

    if sum > total_secs + epsilon_secs && sum > 0.0 {
        let scale = total_secs / sum;
        tracing::debug!(
            sum_secs = format!("{sum:.3}"),
            total_secs = format!("{total_secs:.3}"),
            scale = format!("{scale:.4}"),
            "grouping: phoneme time exceeds audio, scaling word durations"
        );
        for d in &mut durations {
            *d *= scale;
        }
    } else if sum + epsilon_secs < total_secs {
        tracing::debug!(
            sum_secs = format!("{sum:.3}"),
            total_secs = format!("{total_secs:.3}"),
            "grouping: extending last word to cover trailing audio"
        );
    }

    let mut words = Vec::with_capacity(display_words.len());
    let mut start = 0.0f64;
    for (token, duration) in display_words.iter().zip(durations.iter()) {
        words.push(WordTiming {
            word: token.text.clone(),
            start_secs: start,
            duration_secs: *duration,
            range: token.range.clone(),
        });
        start += duration;
    }
    if let Some(last) = words.last_mut() {
        last.duration_secs = (total_secs - last.start_secs).max(0.0);
    }
    words
}
