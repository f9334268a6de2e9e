use std::ops::Range;

use crate::alignment::mapping::TextNormalizationMapper;
use crate::alignment::tokenization::TextToken;

/// Phase 4: move normalized-word durations onto display words.
///
/// Each normalized word is mapped to original coordinates and credited to the
/// display word it overlaps most; several normalized words may land on one
/// display word ("1990" -> "nineteen ninety"). Display words that end up
/// without coverage take a char-count share of the nearest covered word.
///
/// Returns `None` when no display word is covered at all.
pub(super) fn project_to_display(
    normalized_words: &[TextToken],
    durations: &[Option<f64>],
    display_words: &[TextToken],
    mapper: &TextNormalizationMapper,
) -> Option<Vec<f64>> {
    if display_words.is_empty() {
        return None;
    }

    let mut covered: Vec<Option<f64>> = vec![None; display_words.len()];
    let mut floor = 0usize;
    for (word, duration) in normalized_words.iter().zip(durations.iter()) {
        let mapped = mapper.map_normalized_to_original(word.range.clone());
        let idx = best_display_index(display_words, &mapped).max(floor);
        floor = idx;
        if let Some(d) = duration {
            *covered[idx].get_or_insert(0.0) += d;
        }
        tracing::debug!(
            normalized = word.text.as_str(),
            mapped_start = mapped.start,
            mapped_end = mapped.end,
            display = display_words[idx].text.as_str(),
            covered = duration.is_some(),
            "grouping: normalized word projected onto display word"
        );
    }

    share_with_uncovered(&covered, display_words)
}

fn best_display_index(display_words: &[TextToken], mapped: &Range<usize>) -> usize {
    let first = display_words.partition_point(|d| d.range.end <= mapped.start);
    let mut best: Option<(usize, usize)> = None;
    for (i, d) in display_words.iter().enumerate().skip(first) {
        if d.range.start >= mapped.end {
            break;
        }
        let overlap = d.range.end.min(mapped.end) - d.range.start.max(mapped.start);
        if best.map_or(true, |(_, o)| overlap > o) {
            best = Some((i, overlap));
        }
    }
    best.map(|(i, _)| i)
        .unwrap_or_else(|| first.min(display_words.len() - 1))
}

fn share_with_uncovered(covered: &[Option<f64>], display_words: &[TextToken]) -> Option<Vec<f64>> {
    let first_covered = covered.iter().position(Option::is_some)?;

    // owner[i] = covered display word whose span display word i shares.
    let mut owner = vec![first_covered; covered.len()];
    let mut current = first_covered;
    for (i, c) in covered.iter().enumerate() {
        if c.is_some() {
            current = i;
        }
        owner[i] = if i < first_covered { first_covered } else { current };
    }

    let uncovered = covered.iter().filter(|c| c.is_none()).count();
    if uncovered > 0 {
        tracing::debug!(
            uncovered,
            display_words = covered.len(),
            "grouping: splitting covered spans over uncovered display words by char count"
        );
    }

    let mut shares = vec![0.0f64; covered.len()];
    for (c, duration) in covered.iter().enumerate() {
        let Some(duration) = *duration else {
            continue;
        };
        let members: Vec<usize> = (0..covered.len()).filter(|&i| owner[i] == c).collect();
        let total_chars: usize = members
            .iter()
            .map(|&i| display_words[i].char_len().max(1))
            .sum();
        for i in members {
            let chars = display_words[i].char_len().max(1);
            shares[i] = duration * chars as f64 / total_chars as f64;
        }
    }
    Some(shares)
}
