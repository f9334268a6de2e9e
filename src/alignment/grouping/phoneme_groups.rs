use std::ops::Range;

use super::PhonemeGroup;
use crate::alignment::tokenization::TextToken;
use crate::types::RawPhoneme;

/// Phase 1: cut the phoneme stream wherever the normalized range changes.
pub(super) fn split_on_range_change(phonemes: &[RawPhoneme]) -> Vec<PhonemeGroup> {
    let mut groups: Vec<PhonemeGroup> = Vec::new();
    for phoneme in phonemes {
        match groups.last_mut() {
            Some(group) if group.normalized_range == phoneme.normalized_range => {
                group.duration_secs += phoneme.duration_secs;
                group.phoneme_count += 1;
            }
            _ => groups.push(PhonemeGroup {
                normalized_range: phoneme.normalized_range.clone(),
                duration_secs: phoneme.duration_secs,
                phoneme_count: 1,
            }),
        }
    }
    groups
}

/// Phase 2: coalesce consecutive groups that start inside the same normalized
/// word. Groups pointing between words (pauses, punctuation) join the group
/// before them, or the next one when they lead the stream.
pub(super) fn coalesce_by_word(
    groups: Vec<PhonemeGroup>,
    normalized_words: &[TextToken],
) -> Vec<PhonemeGroup> {
    let mut out: Vec<(Option<usize>, PhonemeGroup)> = Vec::with_capacity(groups.len());
    let mut orphan_prefix: Option<PhonemeGroup> = None;

    for group in groups {
        let word = word_containing(normalized_words, group.normalized_range.start);
        match (word, out.last_mut()) {
            (Some(w), Some((Some(prev_w), prev))) if *prev_w == w => merge_into(prev, &group),
            (None, Some((_, prev))) => merge_into(prev, &group),
            (None, None) => match orphan_prefix.as_mut() {
                Some(prefix) => merge_into(prefix, &group),
                None => orphan_prefix = Some(group),
            },
            (word, _) => {
                let mut group = group;
                if let Some(prefix) = orphan_prefix.take() {
                    group.duration_secs += prefix.duration_secs;
                    group.phoneme_count += prefix.phoneme_count;
                }
                out.push((word, group));
            }
        }
    }

    let mut merged: Vec<PhonemeGroup> = out.into_iter().map(|(_, g)| g).collect();
    if let Some(prefix) = orphan_prefix {
        // Nothing pointed inside a word at all; keep the time as one group.
        merged.push(prefix);
    }
    merged
}

fn merge_into(target: &mut PhonemeGroup, group: &PhonemeGroup) {
    target.duration_secs += group.duration_secs;
    target.phoneme_count += group.phoneme_count;
    target.normalized_range = span(&target.normalized_range, &group.normalized_range);
}

fn span(a: &Range<usize>, b: &Range<usize>) -> Range<usize> {
    a.start.min(b.start)..a.end.max(b.end)
}

fn word_containing(words: &[TextToken], pos: usize) -> Option<usize> {
    let idx = words.partition_point(|w| w.range.end <= pos);
    words
        .get(idx)
        .filter(|w| w.range.start <= pos)
        .map(|_| idx)
}
