use crate::alignment::grouping::PhonemeGroup;
use crate::alignment::tokenization::TextToken;
use crate::error::SynthesisError;
use crate::types::{RawPhoneme, SynthesisOutput, SynthesisRequest};

/// The external speech engine, consumed as an opaque per-unit service.
///
/// Calls block for the whole synthesis (hundreds of milliseconds to seconds);
/// the scheduler runs them on the blocking pool.
pub trait SynthesisEngine: Send + Sync {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutput, SynthesisError>;
}

pub trait WordTokenizer: Send + Sync {
    /// Words of the engine-normalized text (whitespace/punctuation boundaries).
    fn normalized_words(&self, normalized_text: &str) -> Vec<TextToken>;

    /// Display words of the original text; one word timing is produced per entry.
    fn display_words(&self, original_text: &str) -> Vec<TextToken>;
}

pub trait PhonemeGrouper: Send + Sync {
    fn group_phonemes(
        &self,
        phonemes: &[RawPhoneme],
        normalized_words: &[TextToken],
    ) -> Vec<PhonemeGroup>;
}
