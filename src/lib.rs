pub mod alignment;
pub mod cache;
pub mod config;
pub mod error;
pub mod highlight;
pub mod pipeline;
pub mod scheduler;
pub mod types;

pub use alignment::mapping::TextNormalizationMapper;
pub use alignment::report::{
    aggregate_reports, compute_structural_metrics, compute_unit_report, cross_check,
    AggregateReport, AlignmentCase, CrossCheckReport, Meta, ReferenceWord, Report,
    StructuralMetrics, UnitReport, REPORT_SCHEMA_VERSION,
};
pub use cache::persistent::{AlignmentRecord, FileStore, PersistentStore};
pub use cache::{AlignmentCache, CacheEntry, CacheKey, CacheStats};
pub use config::{MappingConfig, OffsetCorrection, SyncConfig};
pub use error::{AlignmentError, CacheError, ConfigError, SchedulerError, SynthesisError};
pub use highlight::HighlightCursor;
pub use pipeline::builder::PhonemeAlignerBuilder;
pub use pipeline::runtime::PhonemeAligner;
pub use pipeline::traits::{PhonemeGrouper, SynthesisEngine, WordTokenizer};
pub use scheduler::{SynthesisScheduler, SynthesisSchedulerBuilder};
pub use types::{
    AlignmentInput, AlignmentPrecision, AlignmentResult, AudioBuffer, Breakpoint, Document,
    DocumentId, RawPhoneme, Speed, SynthesisOutput, SynthesisRequest, SynthesisSettings,
    SynthesisUnit, UnitOutput, UnitSource, UnitState, VoiceId, WordTiming,
};
