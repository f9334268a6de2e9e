use std::ops::Range;
use std::sync::Arc;

use crate::types::{AlignmentResult, WordTiming};

/// Answers "which word is being spoken at time t" for one unit.
///
/// Lookups binary-search the word start times, so a render loop can query it
/// every frame. Without an alignment every query returns `None`.
#[derive(Debug, Clone, Default)]
pub struct HighlightCursor {
    alignment: Option<Arc<AlignmentResult>>,
}

impl HighlightCursor {
    pub fn new(alignment: Option<Arc<AlignmentResult>>) -> Self {
        Self { alignment }
    }

    pub fn alignment(&self) -> Option<&AlignmentResult> {
        self.alignment.as_deref()
    }

    pub fn word_index_at(&self, time_secs: f64) -> Option<usize> {
        let alignment = self.alignment.as_deref()?;
        if time_secs.is_nan() || time_secs < 0.0 || time_secs >= alignment.total_duration_secs {
            return None;
        }
        let words = &alignment.words;
        // Index of the first word starting after t; the word before it is active.
        let after = words.partition_point(|w| w.start_secs <= time_secs);
        after.checked_sub(1)
    }

    pub fn word_at(&self, time_secs: f64) -> Option<&WordTiming> {
        let idx = self.word_index_at(time_secs)?;
        self.alignment.as_deref()?.words.get(idx)
    }

    /// Char range of the active word in the unit's original text.
    pub fn highlighted_range(&self, time_secs: f64) -> Option<Range<usize>> {
        self.word_at(time_secs).map(|w| w.range.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlignmentPrecision;

    fn word(text: &str, start: f64, duration: f64, range: Range<usize>) -> WordTiming {
        WordTiming {
            word: text.to_string(),
            start_secs: start,
            duration_secs: duration,
            range,
        }
    }

    fn hello_world() -> HighlightCursor {
        HighlightCursor::new(Some(Arc::new(AlignmentResult {
            unit_index: 0,
            total_duration_secs: 0.9,
            words: vec![
                word("Hello", 0.0, 0.525, 0..5),
                word("world.", 0.525, 0.375, 6..12),
            ],
            precision: AlignmentPrecision::Phoneme,
        })))
    }

    #[test]
    fn first_word_at_zero_and_last_before_end() {
        let cursor = hello_world();
        assert_eq!(cursor.word_index_at(0.0), Some(0));
        assert_eq!(cursor.highlighted_range(0.0), Some(0..5));
        assert_eq!(cursor.word_index_at(0.9 - 1e-6), Some(1));
        assert_eq!(cursor.word_at(0.9 - 1e-6).map(|w| w.word.as_str()), Some("world."));
    }

    #[test]
    fn word_boundary_belongs_to_next_word() {
        let cursor = hello_world();
        assert_eq!(cursor.word_index_at(0.524), Some(0));
        assert_eq!(cursor.word_index_at(0.525), Some(1));
    }

    #[test]
    fn outside_duration_is_none() {
        let cursor = hello_world();
        assert_eq!(cursor.word_index_at(-0.01), None);
        assert_eq!(cursor.word_index_at(0.9), None);
        assert_eq!(cursor.word_index_at(5.0), None);
        assert_eq!(cursor.word_index_at(f64::NAN), None);
        assert_eq!(cursor.highlighted_range(f64::INFINITY), None);
    }

    #[test]
    fn no_alignment_is_none() {
        let cursor = HighlightCursor::new(None);
        assert!(cursor.alignment().is_none());
        assert_eq!(cursor.word_at(0.0), None);
        assert_eq!(cursor.highlighted_range(0.1), None);
    }

    #[test]
    fn empty_word_list_is_none() {
        let cursor = HighlightCursor::new(Some(Arc::new(AlignmentResult {
            unit_index: 0,
            total_duration_secs: 1.0,
            words: Vec::new(),
            precision: AlignmentPrecision::Estimated,
        })));
        assert_eq!(cursor.word_index_at(0.5), None);
    }
}
