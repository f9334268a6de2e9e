use crate::alignment::grouping::{group_phonemes, PhonemeGroup};
use crate::alignment::tokenization::{tokenize_display, tokenize_normalized, TextToken};
use crate::pipeline::traits::{PhonemeGrouper, WordTokenizer};
use crate::types::RawPhoneme;

pub struct BoundaryWordTokenizer;

impl WordTokenizer for BoundaryWordTokenizer {
    fn normalized_words(&self, normalized_text: &str) -> Vec<TextToken> {
        tokenize_normalized(normalized_text)
    }

    fn display_words(&self, original_text: &str) -> Vec<TextToken> {
        tokenize_display(original_text)
    }
}

pub struct RangeChangeGrouper;

impl PhonemeGrouper for RangeChangeGrouper {
    fn group_phonemes(
        &self,
        phonemes: &[RawPhoneme],
        normalized_words: &[TextToken],
    ) -> Vec<PhonemeGroup> {
        group_phonemes(phonemes, normalized_words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_tokenizer_delegates() {
        let tokenizer = BoundaryWordTokenizer;
        assert_eq!(
            tokenizer.normalized_words("doctor smith"),
            tokenize_normalized("doctor smith")
        );
        let display = tokenizer.display_words("Dr. Smith");
        assert_eq!(display.len(), 2);
        assert_eq!(display[0].text, "Dr.");
    }

    #[test]
    fn range_change_grouper_delegates() {
        let words = tokenize_normalized("a b");
        let phonemes = vec![
            RawPhoneme {
                symbol: "a".to_string(),
                duration_secs: 0.1,
                normalized_range: 0..1,
            },
            RawPhoneme {
                symbol: "b".to_string(),
                duration_secs: 0.1,
                normalized_range: 2..3,
            },
        ];
        let groups = RangeChangeGrouper.group_phonemes(&phonemes, &words);
        assert_eq!(groups, group_phonemes(&phonemes, &words));
        assert_eq!(groups.len(), 2);
    }
}
