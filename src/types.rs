use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One phoneme as reported by the synthesis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPhoneme {
    pub symbol: String,
    pub duration_secs: f64,
    /// Char range in the engine's normalized text, `[start, end)`.
    pub normalized_range: Range<usize>,
}

/// Sparse correspondence point between original and normalized text (char offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub original: usize,
    pub normalized: usize,
}

impl Breakpoint {
    pub fn new(original: usize, normalized: usize) -> Self {
        Self {
            original,
            normalized,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    /// Display text of the word, punctuation included.
    pub word: String,
    pub start_secs: f64,
    pub duration_secs: f64,
    /// Char interval in the original text is [start, end), start inclusive/end exclusive.
    pub range: Range<usize>,
}

impl WordTiming {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// How the word durations of an alignment were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentPrecision {
    /// Durations come from the phoneme stream.
    Phoneme,
    /// Phoneme data was missing or unusable; durations are a uniform estimate.
    Estimated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub unit_index: usize,
    pub total_duration_secs: f64,
    pub words: Vec<WordTiming>,
    pub precision: AlignmentPrecision,
}

impl AlignmentResult {
    pub fn summed_duration_secs(&self) -> f64 {
        self.words.iter().map(|w| w.duration_secs).sum()
    }
}

/// Everything the aligner needs for one unit.
#[derive(Debug, Clone)]
pub struct AlignmentInput {
    pub unit_index: usize,
    pub original_text: String,
    pub normalized_text: String,
    pub phonemes: Vec<RawPhoneme>,
    pub breakpoints: Vec<Breakpoint>,
    /// Length of the synthesized audio; `0.0` when unknown.
    pub audio_duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
}

impl AudioBuffer {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate_hz as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(pub String);

impl VoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Playback speed multiplier. Equality and hashing use thousandths so the value
/// can take part in cache keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Speed(f32);

impl Speed {
    pub const NORMAL: Speed = Speed(1.0);

    pub fn new(multiplier: f32) -> Self {
        if multiplier.is_finite() && multiplier > 0.0 {
            Self(multiplier)
        } else {
            Self::NORMAL
        }
    }

    pub fn multiplier(self) -> f32 {
        self.0
    }

    pub fn thousandths(self) -> u32 {
        (self.0 as f64 * 1000.0).round() as u32
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl PartialEq for Speed {
    fn eq(&self, other: &Self) -> bool {
        self.thousandths() == other.thousandths()
    }
}

impl Eq for Speed {}

impl Hash for Speed {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.thousandths().hash(state);
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}x", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SynthesisSettings {
    pub voice: VoiceId,
    pub speed: Speed,
}

impl SynthesisSettings {
    pub fn new(voice: VoiceId, speed: Speed) -> Self {
        Self { voice, speed }
    }
}

/// What the engine is asked to synthesize for one unit.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub unit_index: usize,
    pub text: String,
    pub voice: VoiceId,
    pub speed: Speed,
}

/// Engine output for one unit.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub audio: AudioBuffer,
    pub phonemes: Vec<RawPhoneme>,
    pub breakpoints: Vec<Breakpoint>,
    pub normalized_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSource {
    pub text: String,
    /// Word positions extracted independently by the document model. Only used
    /// to cross-check alignments.
    pub word_positions: Option<Vec<Range<usize>>>,
}

impl UnitSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            word_positions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub units: Vec<UnitSource>,
}

impl Document {
    pub fn from_texts<I, S>(id: DocumentId, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            units: texts.into_iter().map(UnitSource::new).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitState {
    Pending,
    InFlight,
    Ready,
    Failed,
}

/// Read-only snapshot of one schedulable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisUnit {
    pub index: usize,
    pub text: String,
    pub state: UnitState,
}

/// Result of requesting a unit: audio always, alignment when it could be computed.
#[derive(Debug, Clone)]
pub struct UnitOutput {
    pub audio: Arc<AudioBuffer>,
    pub alignment: Option<Arc<AlignmentResult>>,
}
