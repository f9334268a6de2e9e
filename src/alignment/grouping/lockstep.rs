use super::PhonemeGroup;

/// Phase 3: pair normalized words with phoneme groups positionally.
///
/// Returns one entry per normalized word: `Some(duration)` for matched words,
/// `None` for words left without phoneme coverage. Excess trailing groups are
/// absorbed by the last matched word so no audio time goes unaccounted.
pub(super) fn match_groups_to_words(groups: &[PhonemeGroup], word_count: usize) -> Vec<Option<f64>> {
    let mut durations: Vec<Option<f64>> = vec![None; word_count];
    let matched = groups.len().min(word_count);
    for (slot, group) in durations.iter_mut().zip(groups.iter()) {
        *slot = Some(group.duration_secs);
    }

    if groups.len() > word_count && matched > 0 {
        let excess: f64 = groups[matched..].iter().map(|g| g.duration_secs).sum();
        tracing::debug!(
            groups = groups.len(),
            words = word_count,
            excess_secs = format!("{excess:.3}"),
            "grouping: absorbing trailing phoneme groups into last matched word"
        );
        if let Some(Some(last)) = durations.get_mut(matched - 1) {
            *last += excess;
        }
    } else if word_count > groups.len() {
        tracing::debug!(
            groups = groups.len(),
            words = word_count,
            "grouping: normalized words without phoneme coverage"
        );
    }

    durations
}
