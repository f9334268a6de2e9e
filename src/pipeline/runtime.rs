use crate::alignment::grouping::{
    build_word_timings, distribute_to_display, phoneme_durations_usable, uniform_durations,
};
use crate::alignment::mapping::TextNormalizationMapper;
use crate::alignment::tokenization::TextToken;
use crate::config::MappingConfig;
use crate::error::AlignmentError;
use crate::pipeline::traits::{PhonemeGrouper, WordTokenizer};
use crate::types::{AlignmentInput, AlignmentPrecision, AlignmentResult};

/// Turns an engine phoneme stream into word timings over the original text.
pub struct PhonemeAligner {
    mapping: MappingConfig,
    duration_epsilon_secs: f64,
    tokenizer: Box<dyn WordTokenizer>,
    grouper: Box<dyn PhonemeGrouper>,
}

pub(crate) struct PhonemeAlignerParts {
    pub mapping: MappingConfig,
    pub duration_epsilon_secs: f64,
    pub tokenizer: Box<dyn WordTokenizer>,
    pub grouper: Box<dyn PhonemeGrouper>,
}

impl PhonemeAligner {
    pub(crate) fn from_parts(parts: PhonemeAlignerParts) -> Self {
        Self {
            mapping: parts.mapping,
            duration_epsilon_secs: parts.duration_epsilon_secs,
            tokenizer: parts.tokenizer,
            grouper: parts.grouper,
        }
    }

    pub fn duration_epsilon_secs(&self) -> f64 {
        self.duration_epsilon_secs
    }

    pub fn mapping_config(&self) -> &MappingConfig {
        &self.mapping
    }

    pub fn align(&self, input: &AlignmentInput) -> Result<AlignmentResult, AlignmentError> {
        let display = self.tokenizer.display_words(&input.original_text);
        if display.is_empty() {
            return Err(AlignmentError::invalid_input(format!(
                "unit {} has no words to align",
                input.unit_index
            )));
        }

        let usable = phoneme_durations_usable(&input.phonemes);
        let phoneme_secs: f64 = if usable {
            input.phonemes.iter().map(|p| p.duration_secs).sum()
        } else {
            0.0
        };
        let total_secs = if input.audio_duration_secs.is_finite() && input.audio_duration_secs > 0.0
        {
            input.audio_duration_secs
        } else if usable {
            phoneme_secs
        } else {
            return Err(AlignmentError::NoDuration {
                unit_index: input.unit_index,
            });
        };

        if !usable {
            tracing::warn!(
                unit_index = input.unit_index,
                phonemes = input.phonemes.len(),
                "aligner: phoneme durations missing or unusable; using uniform word durations"
            );
            return Ok(self.estimated(input.unit_index, &display, total_secs));
        }

        let normalized = self.tokenizer.normalized_words(&input.normalized_text);
        if normalized.is_empty() {
            tracing::warn!(
                unit_index = input.unit_index,
                "aligner: normalized text has no words; using uniform word durations"
            );
            return Ok(self.estimated(input.unit_index, &display, total_secs));
        }

        let mapper = TextNormalizationMapper::new(
            &input.original_text,
            &input.normalized_text,
            &input.breakpoints,
            &self.mapping,
        );
        let groups = self.grouper.group_phonemes(&input.phonemes, &normalized);
        let Some(durations) = distribute_to_display(&groups, &normalized, &display, &mapper) else {
            tracing::warn!(
                unit_index = input.unit_index,
                groups = groups.len(),
                "aligner: no display word received phoneme coverage; using uniform word durations"
            );
            return Ok(self.estimated(input.unit_index, &display, total_secs));
        };

        let words = build_word_timings(&display, durations, total_secs, self.duration_epsilon_secs);
        tracing::debug!(
            unit_index = input.unit_index,
            words = words.len(),
            normalized_words = normalized.len(),
            phoneme_groups = groups.len(),
            phoneme_secs = format!("{phoneme_secs:.3}"),
            total_secs = format!("{total_secs:.3}"),
            "aligner: unit aligned"
        );

        Ok(AlignmentResult {
            unit_index: input.unit_index,
            total_duration_secs: total_secs,
            words,
            precision: AlignmentPrecision::Phoneme,
        })
    }

    fn estimated(&self, unit_index: usize, display: &[TextToken], total_secs: f64) -> AlignmentResult {
        let durations = uniform_durations(display.len(), total_secs);
        AlignmentResult {
            unit_index,
            total_duration_secs: total_secs,
            words: build_word_timings(display, durations, total_secs, self.duration_epsilon_secs),
            precision: AlignmentPrecision::Estimated,
        }
    }
}
